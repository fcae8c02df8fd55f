mod account_service;
mod change_feed;
mod messaging_service;
mod post_service;
mod profile_service;
mod relationship_service;
mod subscription;

pub use account_service::*;
pub use change_feed::*;
pub use messaging_service::*;
pub use post_service::*;
pub use profile_service::*;
pub use relationship_service::*;
pub use subscription::*;
