//! opgate CLI library.
//!
//! This library exposes the CLI modules for integration testing.
//! In production, `opgate` is used as a binary (main.rs).

pub mod cli;
pub mod commands;
pub mod context;
pub mod error;
pub mod logging;
pub mod output;
pub mod passes;
