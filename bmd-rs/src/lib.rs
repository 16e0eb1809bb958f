//! bmd-rs library
//!
//! Command implementations behind the `bmd-rs` binary.

pub mod cli;
pub mod commands;
pub mod utils;
