use services::{AppServices, VideoPage};
use tracing::warn;

use crate::player::SimulatedPlayer;
use crate::{Cli, Command};

/// Run one subcommand. Failures are reported to the user, not propagated.
pub async fn run(app: &AppServices, cli: &Cli, command: &Command) {
    let session = app.session();
    match command {
        Command::Chapters => match app.content().list_chapters().await {
            Ok(chapters) if chapters.is_empty() => println!("No chapters yet."),
            Ok(chapters) => {
                for chapter in chapters {
                    println!("{:>4}  {}", chapter.id, chapter.title);
                }
            }
            Err(err) => eprintln!("{}", err.user_message()),
        },
        Command::Chapter { id } => match app.content().chapter_page(*id).await {
            Ok(page) => {
                println!("{}", page.chapter.title);
                if let Some(description) = &page.chapter.description {
                    println!("{description}");
                }
                for video in page.videos {
                    let lock = if video.access_level.requires_sign_in() {
                        " [members]"
                    } else {
                        ""
                    };
                    println!("{:>4}  {}{lock}", video.id, video.title);
                }
            }
            Err(err) => eprintln!("{}", err.user_message()),
        },
        Command::Video { chapter, video } => {
            match app.content().open_video(session, chapter, video).await {
                Ok(page) => print_page(&page),
                Err(err) => eprintln!("{}", err.user_message()),
            }
        }
        Command::Next { chapter, video } => {
            match app.content().open_video(session, chapter, video).await {
                Ok(VideoPage { next: Some(next), .. }) => {
                    println!("{}/{}  {}", next.chapter_id, next.id, next.title);
                }
                Ok(VideoPage { next: None, .. }) => println!("This is the last video in the chapter."),
                Err(err) => eprintln!("{}", err.user_message()),
            }
        }
        Command::History { limit } => match app.history().recent(session, *limit).await {
            Ok(entries) if entries.is_empty() => println!("Nothing watched yet."),
            Ok(entries) => {
                for entry in entries {
                    let done = if entry.completed { " (completed)" } else { "" };
                    println!(
                        "{:>3}%  {}  at {}s{done}",
                        entry.progress_percent, entry.title, entry.last_position
                    );
                }
            }
            Err(err) => eprintln!("{err}"),
        },
        Command::Profile { set_username } => {
            let profiles = app.profiles();
            if let Some(name) = set_username {
                match profiles.save_username(session, name).await {
                    Ok(profile) => println!(
                        "Username saved: {}",
                        profile.username.as_deref().unwrap_or_default()
                    ),
                    Err(err) => eprintln!("{err}"),
                }
                return;
            }
            match profiles.profile(session).await {
                Ok(Some(profile)) => {
                    println!(
                        "username: {}",
                        profile.username.as_deref().unwrap_or("(not set)")
                    );
                    println!("role:     {}", profile.role);
                }
                Ok(None) => println!("No profile yet. Set a username with --set-username."),
                Err(err) => eprintln!("{err}"),
            }
        }
        Command::Watch {
            chapter,
            video,
            duration,
            ticks,
        } => watch(app, chapter, video, *duration, ticks).await,
        Command::Register => {
            let (Some(email), Some(password)) = (&cli.email, &cli.password) else {
                eprintln!("--email and --password are required to register.");
                return;
            };
            match app.accounts().sign_up(email, password).await {
                Ok(Some(_)) => println!("Account created. You are signed in."),
                Ok(None) => println!("Account created. Check your email to confirm it."),
                Err(err) => eprintln!("Registration failed: {err}"),
            }
        }
        Command::ResetRequest { email } => {
            match app.accounts().request_password_reset(email).await {
                Ok(()) => println!("A password reset link has been sent to {}.", email.trim()),
                Err(err) => eprintln!("{err}"),
            }
        }
        Command::ResetPassword {
            token,
            password,
            confirm,
        } => match app
            .accounts()
            .reset_password(token.as_deref(), password, confirm)
            .await
        {
            Ok(()) => println!("Password reset. Please sign in."),
            Err(err) => eprintln!("{err}"),
        },
    }
}

fn print_page(page: &VideoPage) {
    let video = &page.video;
    println!("{}", video.title);
    if let Some(description) = &video.description {
        println!("{description}");
    }
    println!("url: {}", video.video_url);
    match &page.next {
        Some(next) => println!("next: {}/{}  {}", next.chapter_id, next.id, next.title),
        None => println!("next: (last video in chapter)"),
    }
}

async fn watch(app: &AppServices, chapter: &str, video: &str, duration: f64, ticks: &[f64]) {
    let page = match app.content().open_video(app.session(), chapter, video).await {
        Ok(page) => page,
        Err(err) => {
            eprintln!("{}", err.user_message());
            return;
        }
    };

    let mut tracker = app.tracker(page.video.id);
    tracker.initialize().await;
    let mut player = SimulatedPlayer::new(duration);
    tracker.on_ready(&mut player);
    if tracker.has_seeked() {
        println!("Resumed at {}s", player.position());
    }

    for &tick in ticks {
        let snapshot = tracker.on_progress_tick(tick).await;
        println!(
            "{:>6}s  {:>3}%{}",
            snapshot.position,
            snapshot.percent(),
            if snapshot.completed { "  completed" } else { "" }
        );
    }

    if let Some(notice) = tracker.notice() {
        warn!(?notice, "tracker reported a problem");
        eprintln!("{}", notice.message());
    }
    println!(
        "watch count {}, {}",
        tracker.watch_count(),
        if tracker.completed() {
            "completed"
        } else {
            "in progress"
        }
    );
}
