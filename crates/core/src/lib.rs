//! Core types and shared logic for the coffer file and user service.
//!
//! This crate holds what every other crate agrees on:
//! - Application configuration
//! - Capability labels and access checks
//! - Random token generation
//! - Password hashing and strength policy
//! - User and file name validation

pub mod access;
pub mod config;
pub mod error;
pub mod names;
pub mod password;
pub mod token;

pub use config::AppConfig;
pub use error::{Error, Result};
pub use password::{Argon2Hasher, PasswordChecker, PasswordHasher, PasswordPolicy};

/// Current wall-clock time as a unix timestamp in seconds.
pub fn unix_now() -> i64 {
    time::OffsetDateTime::now_utc().unix_timestamp()
}
