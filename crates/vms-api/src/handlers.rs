//! Request handlers: spec.md §4.4, §4.9, §6.

pub mod auth;
pub mod health;
pub mod stream;
pub mod videos;

pub use auth::*;
pub use health::*;
pub use stream::*;
pub use videos::*;
