//! Deterministic, pure logic shared by the session core.
//!
//! Core modules must be free of I/O side effects. They define the record
//! format and the path rules, and return deterministic outputs suitable for
//! tests.

pub mod path;
pub mod types;
