mod account_service_impl;
mod change_feed_impl;
mod listener_task;
mod messaging_service_impl;
mod post_service_impl;
mod profile_service_impl;
mod relationship_service_impl;
mod write_plan;

pub use account_service_impl::*;
pub use change_feed_impl::*;
pub use messaging_service_impl::*;
pub use post_service_impl::*;
pub use profile_service_impl::*;
pub use relationship_service_impl::*;
pub use write_plan::*;
