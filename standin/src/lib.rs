//! Temporary file substitution with a compensating operation log.
//!
//! A session swaps configured files or directories in a workspace for
//! substitutes and later puts the originals back. Every mutating step first
//! appends a compensation record to a durable log; ending the session replays
//! that log in strict reverse order. A session whose end never ran is
//! restored automatically before the next one starts.
//!
//! - **[`core`]**: Record format and path rules. No I/O.
//! - **[`io`]**: Session store, operation log, filesystem mutator, restore
//!   engine, config, and child processes.
//!
//! [`session`] coordinates the two to implement the start and end triggers.

pub mod core;
pub mod error;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod session;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
