//! Types shared between the asteroids server and its clients.
//!
//! Wire messages derive `ts_rs::TS` so the browser client can import
//! generated TypeScript definitions (`cargo test` writes them to `bindings/`).

pub mod config;
pub mod protocol;
pub mod vec2;
