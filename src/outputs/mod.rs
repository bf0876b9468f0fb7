//! Report rendering.
//!
//! The report goes to stdout in one of two forms:
//!
//! - [`markdown`]: summary line plus song and artist tables, for reading
//! - [`json`]: the whole [`crate::models::Report`], for piping elsewhere
//!
//! Both are pure functions from a report to a `String`.

pub mod json;
pub mod markdown;
