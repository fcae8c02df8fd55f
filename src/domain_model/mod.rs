mod message;
mod post;
mod profile;
mod relation;
mod unit;
mod user;

pub use message::*;
pub use post::*;
pub use profile::*;
pub use relation::*;
pub use unit::*;
pub use user::*;
