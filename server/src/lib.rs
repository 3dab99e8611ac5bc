//! Authoritative asteroids server library.
//!
//! This module exposes the server components for use in tests and binaries.

pub mod collision;
pub mod config;
pub mod entity;
pub mod error;
pub mod game_loop;
pub mod pacing;
pub mod physics;
pub mod session;
pub mod state;
pub mod ws;
