//! Data models

mod access;
mod access_review;
mod admin_action;
mod audit;
mod dashboard;
mod library;
mod retention;
mod site;
mod storage;
mod two_factor;
mod user;

pub use access::*;
pub use access_review::*;
pub use admin_action::*;
pub use audit::*;
pub use dashboard::*;
pub use library::*;
pub use retention::*;
pub use site::*;
pub use storage::*;
pub use two_factor::*;
pub use user::*;
