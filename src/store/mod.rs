//! Client-side list stores.
//!
//! Each paginated resource gets one `PaginatedStore`, which owns a `ListState`
//! and only changes it through fetch, reset and patch operations:
//! - page 1 replaces loaded items (refresh)
//! - later pages append, duplicates included (load more)
//! - one request in flight per store; late results after a reset are dropped
//! - confirmed follow changes are patched into every store holding that user

mod follow;
mod hub;
mod list_state;
mod paginated;
mod session;
mod traits;

pub use follow::{fan_out, FollowTarget};
pub use hub::{BackendFuture, Hub, Relations, SocialBackend};
pub use list_state::{ErrorPolicy, ListState};
pub use paginated::PaginatedStore;
pub use session::{Session, SESSION_KEY};
pub use traits::{Followable, ListItem};
