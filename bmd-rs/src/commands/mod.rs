//! Command implementations for bmd-rs

pub mod rig;
