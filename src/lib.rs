//! pgscratch - An interactive scratchpad SQL session for PostgreSQL.
//!
//! This library exposes the core modules for use by the binary and in
//! integration tests.

pub mod config;
pub mod db;
pub mod display;
pub mod error;
pub mod input;
pub mod render;
pub mod repl;
pub mod safety;
pub mod script;
pub mod session;

pub use error::{Result, ScratchError};
