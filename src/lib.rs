#![forbid(unsafe_code)]

//! Local-first task and discovery board.
//!
//! The [`cache`] is the source of truth on the client, mirrored to a
//! companion [`server`] by the [`sync`] layer.

pub mod board;
pub mod cache;
pub mod config;
pub mod errors;
pub mod migration;
pub mod models;
pub mod server;
pub mod sync;

pub use config::GlobalConfig;
pub use errors::{AppError, Result};
