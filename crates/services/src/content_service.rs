use std::sync::Arc;

use course_core::model::{Chapter, ChapterId, Video, VideoRoute};
use storage::repository::{ChapterRepository, StorageError, VideoRepository};
use tracing::{debug, warn};

use crate::access::{AccessDecision, AccessGate};
use crate::error::ContentError;
use crate::identity::SessionContext;
use crate::next_content::NextContentResolver;

/// A chapter with its playable videos in display order.
#[derive(Debug, Clone)]
pub struct ChapterPage {
    pub chapter: Chapter,
    pub videos: Vec<Video>,
}

/// A video the viewer may play, plus where "next" leads.
#[derive(Debug, Clone)]
pub struct VideoPage {
    pub video: Video,
    pub next: Option<Video>,
}

/// Catalogue reads and the video page flow.
#[derive(Clone)]
pub struct ContentService {
    chapters: Arc<dyn ChapterRepository>,
    videos: Arc<dyn VideoRepository>,
    gate: AccessGate,
    next: NextContentResolver,
}

impl ContentService {
    #[must_use]
    pub fn new(
        chapters: Arc<dyn ChapterRepository>,
        videos: Arc<dyn VideoRepository>,
        gate: AccessGate,
    ) -> Self {
        let next = NextContentResolver::new(Arc::clone(&videos));
        Self {
            chapters,
            videos,
            gate,
            next,
        }
    }

    /// # Errors
    ///
    /// Returns `ContentError::Storage` if the catalogue cannot be read.
    pub async fn list_chapters(&self) -> Result<Vec<Chapter>, ContentError> {
        self.chapters.list_chapters().await.map_err(|err| {
            warn!(error = %err, "could not list chapters");
            ContentError::from(err)
        })
    }

    /// # Errors
    ///
    /// Returns `ContentError::ChapterNotFound` for an unknown chapter, or
    /// `ContentError::Storage` if the catalogue cannot be read.
    pub async fn chapter_page(&self, chapter_id: ChapterId) -> Result<ChapterPage, ContentError> {
        let chapter = match self.chapters.get_chapter(chapter_id).await {
            Ok(chapter) => chapter,
            Err(StorageError::NotFound) => return Err(ContentError::ChapterNotFound),
            Err(err) => {
                warn!(%chapter_id, error = %err, "could not load chapter");
                return Err(err.into());
            }
        };
        let videos = self.videos.list_chapter_videos(chapter_id).await?;
        Ok(ChapterPage { chapter, videos })
    }

    /// Resolve a video page from raw path segments.
    ///
    /// The route is validated before any lookup. The video must belong to the
    /// chapter and not be deleted; the access gate runs before the page is
    /// returned.
    ///
    /// # Errors
    ///
    /// Returns `ContentError::InvalidRoute`, `VideoNotFound`, `AccessDenied`,
    /// or `Storage`.
    pub async fn open_video(
        &self,
        session: &SessionContext,
        raw_chapter_id: &str,
        raw_video_id: &str,
    ) -> Result<VideoPage, ContentError> {
        let route = VideoRoute::parse(raw_chapter_id, raw_video_id)?;
        self.open_route(session, route).await
    }

    /// # Errors
    ///
    /// Same as `open_video`, minus route validation.
    pub async fn open_route(
        &self,
        session: &SessionContext,
        route: VideoRoute,
    ) -> Result<VideoPage, ContentError> {
        let video = match self.videos.get_video(route.chapter_id, route.video_id).await {
            Ok(video) => video,
            Err(StorageError::NotFound) => return Err(ContentError::VideoNotFound),
            Err(err) => {
                warn!(chapter_id = %route.chapter_id, video_id = %route.video_id, error = %err, "could not load video");
                return Err(err.into());
            }
        };

        if let AccessDecision::Denied(reason) = self.gate.check(session, &video).await {
            debug!(video_id = %video.id, ?reason, "access denied");
            return Err(ContentError::AccessDenied(reason));
        }

        let next = self.next.after(&video).await?;
        Ok(VideoPage { video, next })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::DenialReason;
    use crate::identity::test_support::{expired_session_for, session_for};
    use async_trait::async_trait;
    use course_core::model::{AccessLevel, Profile, Role, UserId, VideoId};
    use course_core::time::fixed_clock;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use storage::repository::InMemoryRepository;

    struct CountingVideos {
        inner: InMemoryRepository,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl VideoRepository for CountingVideos {
        async fn get_video(&self, chapter_id: ChapterId, id: VideoId) -> Result<Video, StorageError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.get_video(chapter_id, id).await
        }

        async fn list_chapter_videos(
            &self,
            chapter_id: ChapterId,
        ) -> Result<Vec<Video>, StorageError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.list_chapter_videos(chapter_id).await
        }

        async fn next_video(&self, chapter_id: ChapterId, after: i32) -> Result<Video, StorageError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.next_video(chapter_id, after).await
        }

        async fn get_videos(&self, ids: &[VideoId]) -> Result<Vec<Video>, StorageError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.get_videos(ids).await
        }
    }

    fn video(id: u64, sort_order: i32, access_level: AccessLevel) -> Video {
        Video {
            id: VideoId::new(id),
            chapter_id: ChapterId::new(1),
            title: format!("Lesson {id}"),
            description: None,
            thumbnail_url: None,
            video_url: format!("https://cdn.example.com/{id}.mp4"),
            access_level,
            sort_order,
            is_deleted: false,
        }
    }

    fn fixture() -> (InMemoryRepository, Arc<CountingVideos>, ContentService) {
        let repo = InMemoryRepository::new();
        repo.put_chapter(Chapter {
            id: ChapterId::new(1),
            title: "Basics".into(),
            description: None,
            thumbnail_url: None,
        })
        .unwrap();
        repo.put_video(video(1, 10, AccessLevel::Public)).unwrap();
        repo.put_video(video(2, 20, AccessLevel::Authenticated)).unwrap();
        let mut gone = video(3, 15, AccessLevel::Public);
        gone.is_deleted = true;
        repo.put_video(gone).unwrap();

        let videos = Arc::new(CountingVideos {
            inner: repo.clone(),
            calls: AtomicUsize::new(0),
        });
        let service = ContentService::new(
            Arc::new(repo.clone()),
            Arc::clone(&videos) as Arc<dyn VideoRepository>,
            AccessGate::new(fixed_clock(), Arc::new(repo.clone())),
        );
        (repo, videos, service)
    }

    #[tokio::test]
    async fn malformed_route_never_reaches_storage() {
        let (_repo, videos, service) = fixture();
        let err = service
            .open_video(&SessionContext::new(), "abc", "1")
            .await
            .unwrap_err();
        assert!(matches!(err, ContentError::InvalidRoute(_)));
        assert_eq!(err.user_message(), "Invalid link.");

        let err = service
            .open_video(&SessionContext::new(), "1", "-4")
            .await
            .unwrap_err();
        assert!(matches!(err, ContentError::InvalidRoute(_)));
        assert_eq!(videos.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn public_video_opens_with_next() {
        let (_repo, _videos, service) = fixture();
        let page = service
            .open_video(&SessionContext::new(), "1", "1")
            .await
            .unwrap();
        assert_eq!(page.video.id, VideoId::new(1));
        assert_eq!(page.next.map(|v| v.id), Some(VideoId::new(2)));
    }

    #[tokio::test]
    async fn deleted_or_misplaced_videos_are_not_found() {
        let (_repo, _videos, service) = fixture();
        let session = SessionContext::new();
        assert!(matches!(
            service.open_video(&session, "1", "3").await,
            Err(ContentError::VideoNotFound)
        ));
        assert!(matches!(
            service.open_video(&session, "2", "1").await,
            Err(ContentError::VideoNotFound)
        ));
    }

    #[tokio::test]
    async fn gated_video_needs_member() {
        let (repo, _videos, service) = fixture();
        let err = service
            .open_video(&SessionContext::new(), "1", "2")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ContentError::AccessDenied(DenialReason::SignInRequired)
        ));

        let member = UserId::random();
        repo.put_profile(Profile::new(member).with_role(Role::Authenticated))
            .unwrap();
        let page = service
            .open_video(&SessionContext::signed_in(session_for(member)), "1", "2")
            .await
            .unwrap();
        assert!(page.next.is_none());

        let err = service
            .open_video(&SessionContext::signed_in(expired_session_for(member)), "1", "2")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ContentError::AccessDenied(DenialReason::SignInRequired)
        ));
        assert_eq!(err.user_message(), DenialReason::SignInRequired.message());
    }

    #[tokio::test]
    async fn chapter_page_lists_visible_videos_in_order() {
        let (_repo, _videos, service) = fixture();
        let page = service.chapter_page(ChapterId::new(1)).await.unwrap();
        let ids: Vec<u64> = page.videos.iter().map(|v| v.id.value()).collect();
        assert_eq!(ids, vec![1, 2]);

        assert!(matches!(
            service.chapter_page(ChapterId::new(9)).await,
            Err(ContentError::ChapterNotFound)
        ));
        assert_eq!(service.list_chapters().await.unwrap().len(), 1);
    }
}
