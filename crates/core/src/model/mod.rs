mod chapter;
mod ids;
mod profile;
mod route;
mod session;
mod video;
mod watch_status;

pub use ids::{ChapterId, ParseIdError, UserId, VideoId};

pub use chapter::Chapter;
pub use profile::{normalize_username, Profile, ProfileError, Role};
pub use route::{RouteError, VideoRoute};
pub use session::{AuthSession, AuthUser};
pub use video::{AccessLevel, Video, VideoError};
pub use watch_status::{WatchStatus, WatchStatusError};
