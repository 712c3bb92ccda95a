//! Stable exit codes for standin CLI commands.

/// Command succeeded.
pub const OK: i32 = 0;
/// Invalid usage, configuration, or a missing required source.
pub const INVALID: i32 = 1;
/// A filesystem mutation, restore step, or session store access failed.
pub const FAILED: i32 = 2;
/// The user chose to revert when a required source was missing.
pub const REVERTED: i32 = 3;
