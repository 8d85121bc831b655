//! # Portal Core
//!
//! Runtime-independent logic for the content portal: data models, the
//! natural-language filter parser, terminology matching, result
//! re-ranking, conversation transcripts, CSV rendering, duplicate
//! detection, log metrics, and the store abstraction.
//!
//! This crate contains no tokio runtime, sqlx, HTTP, or filesystem I/O.
//! Anything that talks to the outside world lives in the application
//! crate and reaches this one through [`store::Store`] or plain data.

pub mod conversation;
pub mod dedup;
pub mod export;
pub mod llm_json;
pub mod metrics;
pub mod models;
pub mod parse;
pub mod rerank;
pub mod store;
pub mod terminology;
pub mod text;
pub mod vocab;
