//! Swing bowling server library.
//!
//! This module exposes the server components for use in tests and binaries.

pub mod bowl_loop;
pub mod config;
pub mod session;
pub mod simulator;
pub mod ws;
