//! aihub is a small hub of local AI tools backed by an Ollama daemon.
//!
//! The crate is organized around a few collaborating layers:
//! - [`api`] defines the chat and model-listing payloads spoken to Ollama.
//! - [`core`] owns the streaming transport ([`core::chat_stream`]), the
//!   generation state machine ([`core::generation`]), configuration, and the
//!   tool and template registries.
//! - [`utils`] holds URL, image-encoding and transcript helpers.
//! - [`cli`] parses arguments and drives one-shot tool runs.
//!
//! The binary (`src/main.rs`) routes through [`crate::cli::main`].

pub mod api;
pub mod cli;
pub mod core;
pub mod utils;
