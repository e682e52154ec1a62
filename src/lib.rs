//! Gratuity API: tip submission and verification for staff gratuities.
//!
//! The `wallet` module is the client half (provider session, transfer
//! submission, failure taxonomy); `tips` is the server half (rate limiting,
//! exactly-once recording, reporting); `http` exposes the service surface.

pub mod address;
pub mod config;
pub mod entities;
pub mod http;
pub mod state;
pub mod tips;
pub mod token;
pub mod wallet;
