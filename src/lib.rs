//! # Content Portal
//!
//! Natural-language search and chat over a marketing content library.
//!
//! Queries are interpreted locally (autocorrect, terminology mappings,
//! state and type detection) and optionally refined by an LLM, matched
//! against the content table, and reranked. A conversational assistant,
//! admin-curated terminology, weekly reports and a CMS webhook sit on
//! the same store.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────┐   ┌──────────┐
//! │  Query   │──▶│ Parse + LLM  │──▶│  Store   │
//! │ CLI/HTTP │   │ Terminology  │   │  SQLite  │
//! └──────────┘   └──────────────┘   └────┬─────┘
//!                                        │
//!                    ┌───────────────────┤
//!                    ▼                   ▼
//!               ┌──────────┐       ┌──────────┐
//!               │  Rerank  │       │ Webhook  │
//!               │   Chat   │       │ Reports  │
//!               └──────────┘       └──────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema creation |
//! | [`sqlite_store`] | SQLite implementation of the `Store` trait |
//! | [`llm`] | Chat-completion gateway |
//! | [`prompts`] | Prompt construction |
//! | [`portal`] | Shared application state |
//! | [`search`] | Search pipeline |
//! | [`chat`] | Conversational assistant |
//! | [`terminology`] | Mapping administration and cache |
//! | [`webhook`] | CMS event handling |
//! | [`report`] | Weekly report and log analysis |
//! | [`enrich`] | LLM summaries and tags for content rows |
//! | [`export`] | CSV export |
//! | [`maintenance`] | Duplicate scan and type standardization |
//! | [`stats`] | Library overview |
//! | [`ai_context`] | Chat knowledge entries |
//! | [`server`] | HTTP API |

pub mod ai_context;
pub mod chat;
pub mod config;
pub mod db;
pub mod enrich;
pub mod export;
pub mod llm;
pub mod maintenance;
pub mod migrate;
pub mod portal;
pub mod prompts;
pub mod report;
pub mod search;
pub mod server;
pub mod sqlite_store;
pub mod stats;
pub mod terminology;
pub mod webhook;
