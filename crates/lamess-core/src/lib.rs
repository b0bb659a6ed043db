//! Shared foundations for the lamess crates.
//!
//! Provides:
//! - The unified [`error::AppError`] / [`result::AppResult`] types
//! - String validators used by the packet builder and configuration
//! - Configuration schemas for the `lamess.cfg` INI file

pub mod config;
pub mod error;
pub mod result;
pub mod validate;
