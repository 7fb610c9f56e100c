//! HTTP request handlers.

pub mod auth;
pub mod files;
pub mod pages;
pub mod users;

pub use auth::*;
pub use files::*;
pub use users::*;
