//! Repository traits and their JSON-blob implementations.

pub mod csrf;
pub mod files;
pub mod sessions;
pub mod users;

pub use csrf::{CsrfRepo, JsonCsrfRepo};
pub use files::{FileRepo, JsonFileRepo};
pub use sessions::{JsonSessionRepo, SessionRepo};
pub use users::{JsonUserRepo, UserRepo};
