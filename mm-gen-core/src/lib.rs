//! Next-token generation pipeline for Myanmar text.
//!
//! This crate provides:
//! - Separator-based tokenization and a frozen, insertion-ordered vocabulary
//! - Sliding-window training pair construction
//! - A small trainable feed-forward model behind a `LanguageModel` trait
//! - Temperature-controlled autoregressive generation with an explicit rng
//! - A read-only `ModelContext` for serving

/// Hyperparameters, training options and environment-based configuration.
pub mod config;

/// Startup loading policy and the shared inference context.
pub mod context;

/// File helpers (corpus loading, directory creation).
pub mod io;

/// Model boundary, built-in network, checkpoints, sampling and generation.
pub mod model;

/// Tokenizer, vocabulary and windower.
pub mod text;
