#![deny(missing_docs)]
//! Chat relay bot: bridges a chat transport, a generative-AI backend, and an
//! external media-extraction service.
//!
//! Inbound messages are buffered in a FIFO queue and drained one at a time.
//! Each message is classified as a command, a media link, or an AI turn, and
//! every downstream dependency (command store, AI backend, extraction API,
//! transport) is treated as an unreliable network call with bounded retry,
//! timeout racing, and partial-failure tolerance.

/// Generative-AI backend client.
pub mod ai;
/// Command parsing, gating, and dispatch.
pub mod commands;
/// Configuration and tuning constants.
pub mod config;
/// Media URL detection, extraction, download, and delivery.
pub mod media;
/// Per-message classification and top-level error conversion.
pub mod pipeline;
/// Best-effort chat presence indicator transitions.
pub mod presence;
/// Message queue and fixed-interval drain loop.
pub mod queue;
/// Generic bounded retry with exponential backoff.
pub mod retry;
/// Active-user set and per-user conversation history.
pub mod session;
/// Persistent command/settings store capability.
pub mod store;
/// Transport capability traits and the Telegram adapter.
pub mod transport;
