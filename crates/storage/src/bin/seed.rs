//! Seed a local SQLite mirror with a small course catalogue and a dev profile.
//!
//! ```text
//! cargo run -p storage --bin seed -- --db sqlite:dev.sqlite3 --user-id <uuid>
//! ```

use clap::Parser;
use course_core::model::{AccessLevel, Chapter, ChapterId, Profile, Role, UserId, Video, VideoId};
use storage::sqlite::SqliteRepository;

#[derive(Debug, Parser)]
#[command(name = "seed", about = "Populate a local SQLite mirror with demo content")]
struct Args {
    /// SQLite URL to seed
    #[arg(long = "db", env = "COURSE_DB_URL", default_value = "sqlite:dev.sqlite3?mode=rwc")]
    db_url: String,

    /// Profile to create for offline runs
    #[arg(long, env = "COURSE_DEV_USER")]
    user_id: Option<UserId>,

    /// Username for the seeded profile
    #[arg(long, default_value = "dev")]
    username: String,

    /// Store the profile with the `authenticated` role so gated videos open
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    member: bool,

    /// Chapters to create
    #[arg(long, default_value_t = 2)]
    chapters: u32,

    /// Videos per chapter
    #[arg(long, default_value_t = 4)]
    videos: u32,
}

fn demo_chapter(n: u32) -> Chapter {
    Chapter {
        id: ChapterId::new(u64::from(n)),
        title: format!("Chapter {n}"),
        description: Some(format!("Lessons for chapter {n}")),
        thumbnail_url: Some(format!("https://cdn.example.com/chapters/{n}.jpg")),
    }
}

fn demo_video(chapter: u32, position: u32, per_chapter: u32) -> Video {
    let id = u64::from((chapter - 1) * per_chapter + position);
    // First lesson of each chapter is a free preview.
    let access_level = if position == 1 {
        AccessLevel::Public
    } else {
        AccessLevel::Authenticated
    };
    Video {
        id: VideoId::new(id),
        chapter_id: ChapterId::new(u64::from(chapter)),
        title: format!("Lesson {chapter}.{position}"),
        description: Some(format!("Lesson {position} of chapter {chapter}")),
        thumbnail_url: Some(format!("https://cdn.example.com/videos/{id}.jpg")),
        video_url: format!("https://cdn.example.com/videos/{id}.mp4"),
        access_level,
        sort_order: i32::try_from(position * 10).unwrap_or(i32::MAX),
        is_deleted: false,
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let repo = SqliteRepository::connect(&args.db_url).await?;
    repo.migrate().await?;

    for chapter in 1..=args.chapters {
        repo.upsert_chapter(&demo_chapter(chapter)).await?;
        for position in 1..=args.videos {
            repo.upsert_video(&demo_video(chapter, position, args.videos))
                .await?;
        }
    }

    if let Some(user_id) = args.user_id {
        let role = if args.member {
            Role::Authenticated
        } else {
            Role::Anonymous
        };
        let mut profile = Profile::new(user_id).with_role(role);
        profile.username = Some(args.username.clone());
        repo.upsert_profile(&profile).await?;
        println!("profile {user_id} ({})", profile.role);
    }

    println!(
        "seeded {} chapters x {} videos into {}",
        args.chapters, args.videos, args.db_url
    );
    Ok(())
}
