//! Cellbrawl Server Library
//!
//! Real-time server for two browser games over WebTransport: a mass-collection
//! arena where players split, eject and shoot, and a 1v1 fighter with
//! matchmaking, best-of-3 rounds and reconnection into a running match.
//!
//! # Features
//!
//! - `dos_ratelimit` - Per-message rate limiting on client streams and datagrams (enabled by default)

pub mod arena;
pub mod config;
pub mod fight;
pub mod metrics;
pub mod net;
pub mod util;
