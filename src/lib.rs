//! QuizHive · Quiz Session & Points Economy Engine
//!
//! - Axum HTTP + WebSocket API
//! - Quota-gated, fairness-weighted question selection
//! - Points scoring with a new-vs-repeated-question rule
//! - In-memory multiplayer lobby with invite coordination

pub mod config;
pub mod domain;
pub mod error;
pub mod lobby;
pub mod protocol;
pub mod quota;
pub mod routes;
pub mod scoring;
pub mod seeds;
pub mod selector;
pub mod state;
pub mod telemetry;
