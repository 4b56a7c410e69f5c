//! Foundational low-level utilities shared across hatch crates.
//!
//! Provides atomic file-write helpers for the run store plus Unix-time
//! utilities used by record timestamps and cache expiry.

pub mod atomic_io;
pub mod time_utils;

pub use atomic_io::{write_json_atomic, write_text_atomic};
pub use time_utils::{is_expired_unix_ms, now_unix, now_unix_ms};
