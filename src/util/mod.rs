//! Small shared utilities.

pub mod time;

pub use time::format_wait;
