//! Side-effecting helpers: persistence, filesystem mutation, replay.

pub mod config;
pub mod init;
pub mod mutator;
pub mod oplog;
pub mod process;
pub mod restore;
pub mod store;
