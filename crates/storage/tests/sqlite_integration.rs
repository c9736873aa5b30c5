use chrono::Duration;
use course_core::model::{
    AccessLevel, Chapter, ChapterId, Profile, Role, UserId, Video, VideoId, WatchStatus,
};
use course_core::progress::ProgressSnapshot;
use course_core::time::fixed_now;
use storage::repository::{
    ChapterRepository, ProfileRepository, StorageError, VideoRepository, WatchStatusRepository,
};
use storage::sqlite::SqliteRepository;

async fn connect(name: &str) -> SqliteRepository {
    let url = format!("sqlite:file:{name}?mode=memory&cache=shared");
    let repo = SqliteRepository::connect(&url).await.expect("connect");
    repo.migrate().await.expect("migrate");
    repo
}

fn chapter(id: u64) -> Chapter {
    Chapter {
        id: ChapterId::new(id),
        title: format!("Chapter {id}"),
        description: None,
        thumbnail_url: None,
    }
}

fn video(id: u64, chapter: u64, sort_order: i32) -> Video {
    Video {
        id: VideoId::new(id),
        chapter_id: ChapterId::new(chapter),
        title: format!("Video {id}"),
        description: Some("desc".into()),
        thumbnail_url: None,
        video_url: format!("https://cdn.example.com/{id}.mp4"),
        access_level: AccessLevel::Authenticated,
        sort_order,
        is_deleted: false,
    }
}

async fn seed_chapter(repo: &SqliteRepository) {
    repo.upsert_chapter(&chapter(1)).await.unwrap();
    repo.upsert_chapter(&chapter(2)).await.unwrap();
    repo.upsert_video(&video(10, 1, 1)).await.unwrap();
    repo.upsert_video(&video(11, 1, 2)).await.unwrap();
    let mut deleted = video(12, 1, 3);
    deleted.is_deleted = true;
    repo.upsert_video(&deleted).await.unwrap();
    repo.upsert_video(&video(13, 1, 7)).await.unwrap();
    repo.upsert_video(&video(20, 2, 1)).await.unwrap();
}

#[tokio::test]
async fn sqlite_catalogue_orders_and_hides_deleted() {
    let repo = connect("memdb_catalogue").await;
    seed_chapter(&repo).await;

    let chapters = repo.list_chapters().await.unwrap();
    assert_eq!(chapters.len(), 2);

    let listed = repo.list_chapter_videos(ChapterId::new(1)).await.unwrap();
    let ids: Vec<u64> = listed.iter().map(|v| v.id.value()).collect();
    assert_eq!(ids, vec![10, 11, 13]);

    let next = repo.next_video(ChapterId::new(1), 2).await.unwrap();
    assert_eq!(next.id, VideoId::new(13));
    assert!(matches!(
        repo.next_video(ChapterId::new(1), 7).await,
        Err(StorageError::NotFound)
    ));

    assert!(matches!(
        repo.get_video(ChapterId::new(2), VideoId::new(10)).await,
        Err(StorageError::NotFound)
    ));
    assert!(matches!(
        repo.get_video(ChapterId::new(1), VideoId::new(12)).await,
        Err(StorageError::NotFound)
    ));
}

#[tokio::test]
async fn sqlite_blank_video_rows_fail_to_load() {
    let repo = connect("memdb_blank_video").await;
    seed_chapter(&repo).await;
    sqlx::query("UPDATE videos SET title = '   ' WHERE id = 11")
        .execute(repo.pool())
        .await
        .unwrap();

    assert!(matches!(
        repo.get_video(ChapterId::new(1), VideoId::new(11)).await,
        Err(StorageError::Serialization(_))
    ));
    assert!(matches!(
        repo.list_chapter_videos(ChapterId::new(1)).await,
        Err(StorageError::Serialization(_))
    ));
    assert_eq!(
        repo.get_video(ChapterId::new(1), VideoId::new(10))
            .await
            .unwrap()
            .title,
        "Video 10"
    );
}

#[tokio::test]
async fn sqlite_watch_status_insert_update_and_history() {
    let repo = connect("memdb_watch").await;
    seed_chapter(&repo).await;
    let user = UserId::random();
    let now = fixed_now();

    let first = WatchStatus::first_view(user, VideoId::new(10), now);
    repo.insert_watch_status(&first).await.unwrap();
    assert!(matches!(
        repo.insert_watch_status(&first).await,
        Err(StorageError::Conflict)
    ));

    let second = WatchStatus::first_view(user, VideoId::new(11), now + Duration::minutes(1));
    repo.insert_watch_status(&second).await.unwrap();

    let updated = repo
        .update_progress(
            user,
            VideoId::new(10),
            &ProgressSnapshot::from_tick(190.0, 200.0),
            now + Duration::minutes(5),
        )
        .await
        .unwrap();
    assert_eq!(updated.last_position, 190);
    assert!(updated.completed);
    assert_eq!(updated.watch_count, 1);

    let recent = repo.recent_watch_statuses(user, 3).await.unwrap();
    let order: Vec<u64> = recent.iter().map(|r| r.video_id.value()).collect();
    assert_eq!(order, vec![10, 11]);

    assert!(matches!(
        repo.update_progress(
            UserId::random(),
            VideoId::new(10),
            &ProgressSnapshot::start(),
            now
        )
        .await,
        Err(StorageError::NotFound)
    ));
}

#[tokio::test]
async fn sqlite_profile_upsert_keeps_role() {
    let repo = connect("memdb_profiles").await;
    let user = UserId::random();

    assert!(matches!(
        repo.get_profile(user).await,
        Err(StorageError::NotFound)
    ));

    repo.upsert_profile(&Profile::new(user).with_role(Role::Authenticated))
        .await
        .unwrap();
    let profile = repo.upsert_username(user, "kei").await.unwrap();
    assert_eq!(profile.username.as_deref(), Some("kei"));
    assert_eq!(profile.role, Role::Authenticated);

    let fresh = UserId::random();
    let created = repo.upsert_username(fresh, "new").await.unwrap();
    assert_eq!(created.role, Role::Anonymous);
}
