//! Command handlers behind the `msigflow` binary

pub mod commands;

pub use commands::*;
