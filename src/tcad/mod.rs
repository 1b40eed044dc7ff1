//! TCAD API module for interacting with the upstream appraisal system.
//!
//! This module provides functionality to:
//! - Run full-text property searches with adaptive page-size fallback
//! - Detect truncated responses and step down through page sizes
//! - Fall back to the HTML search grid when the JSON API path fails
//! - Manage the process-wide bearer token, with optional periodic refresh

pub mod api;
pub mod errors;
pub mod fallback;
pub mod json;
pub mod models;
pub mod token;

pub use api::*;
pub use errors::*;
pub use models::*;
pub use token::*;
