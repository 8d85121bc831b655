//! # Content Portal CLI (`portal`)
//!
//! ## Usage
//!
//! ```bash
//! portal --config ./config/portal.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `portal init [--seed]` | Create the database, optionally with the default terminology |
//! | `portal search "<query>"` | Natural-language search |
//! | `portal chat` | Interactive assistant on stdin |
//! | `portal terminology <action>` | List, add, approve, reject, suggest or seed mappings |
//! | `portal report <kind>` | Weekly report or prompt-log analysis |
//! | `portal export` | CSV export |
//! | `portal stats` | Counts by type and state |
//! | `portal dedup` | Possible duplicate content |
//! | `portal standardize-types` | Rewrite variant type spellings |
//! | `portal enrich` | Generate enhanced summaries and tags with the LLM |
//! | `portal context <action>` | Manage chat knowledge entries |
//! | `portal serve` | Start the HTTP API |

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::str::FromStr;
use tracing_subscriber::EnvFilter;

use content_portal::{
    ai_context, chat, config, enrich, export, maintenance, migrate, portal::Portal, report, search,
    server, stats, terminology,
};
use portal_core::dedup::DEFAULT_SIMILARITY;
use portal_core::models::{MapType, NewContextEntry};

/// Content Portal: natural-language search over a marketing content library.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/portal.example.toml` for a full example.
#[derive(Parser)]
#[command(name = "portal", version, about)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/portal.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database schema. Safe to run repeatedly.
    Init {
        /// Also insert the default terminology mappings.
        #[arg(long)]
        seed: bool,
    },

    /// Search the content library.
    Search {
        query: String,

        /// Restrict to these content types (repeatable).
        #[arg(long = "type")]
        types: Vec<String>,

        /// Restrict to these state abbreviations (repeatable).
        #[arg(long = "state")]
        states: Vec<String>,

        #[arg(long)]
        limit: Option<usize>,

        /// Use manual scoring even when an LLM is configured.
        #[arg(long)]
        no_rerank: bool,

        /// Print the full outcome as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Chat with the assistant. Reads messages from stdin.
    Chat {
        #[arg(long, default_value = "cli")]
        session: String,
    },

    /// Manage terminology mappings.
    Terminology {
        #[command(subcommand)]
        action: TermAction,
    },

    /// Generate reports over content and prompt logs.
    Report {
        #[command(subcommand)]
        kind: ReportKind,
    },

    /// Export content as CSV.
    Export {
        /// Export the results of this search instead of the whole library.
        #[arg(long)]
        query: Option<String>,

        #[arg(long = "type")]
        types: Vec<String>,

        #[arg(long = "state")]
        states: Vec<String>,

        /// Output file. Defaults to stdout.
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Show counts by type and state.
    Stats {
        /// Window in days for the "new" count.
        #[arg(long, default_value_t = 7)]
        days: i64,

        #[arg(long)]
        json: bool,
    },

    /// List possible duplicate content.
    Dedup {
        /// Title similarity threshold in [0, 1].
        #[arg(long, default_value_t = DEFAULT_SIMILARITY)]
        threshold: f64,

        #[arg(long)]
        json: bool,
    },

    /// Rewrite variant spellings of content types.
    StandardizeTypes {
        /// Show what would change without writing.
        #[arg(long)]
        dry_run: bool,
    },

    /// Generate enhanced summaries and tags for content rows.
    Enrich {
        /// Enrich at most this many rows.
        #[arg(long)]
        limit: Option<usize>,

        /// Also redo rows that already have an enhanced summary.
        #[arg(long)]
        force: bool,

        /// List the rows that would be sent without calling the model.
        #[arg(long)]
        dry_run: bool,

        #[arg(long)]
        json: bool,
    },

    /// Manage knowledge entries used by the chat assistant.
    Context {
        #[command(subcommand)]
        action: ContextAction,
    },

    /// Start the HTTP API on `[server].bind`.
    Serve,
}

#[derive(Subcommand)]
enum TermAction {
    /// List mappings.
    List {
        /// Only show suggestions awaiting review.
        #[arg(long)]
        pending: bool,

        #[arg(long)]
        json: bool,
    },
    /// Add a manual mapping, applied immediately.
    Add {
        /// One of content_type, state, topic, competitor, persona, feature.
        map_type: String,
        user_term: String,
        canonical_term: String,
    },
    /// Verify and activate a pending mapping.
    Approve { id: String },
    /// Delete a pending mapping.
    Reject { id: String },
    /// Ask the LLM for new mappings from recent prompt logs.
    Suggest {
        #[arg(long, default_value_t = 7)]
        days: i64,
    },
    /// Insert the default vocabulary.
    Seed,
}

#[derive(Subcommand)]
enum ReportKind {
    /// Content and search summary for the last 7 days.
    Weekly {
        #[arg(long)]
        json: bool,
    },
    /// LLM review of recent prompt logs.
    Analyze {
        #[arg(long, default_value_t = 7)]
        days: i64,

        /// Store suggested mappings as pending rows.
        #[arg(long)]
        store_mappings: bool,

        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum ContextAction {
    List {
        #[arg(long)]
        category: Option<String>,

        #[arg(long)]
        json: bool,
    },
    Add {
        /// e.g. state_context or competitor_intel.
        #[arg(long)]
        category: String,

        /// State abbreviation or competitor name the entry applies to.
        #[arg(long)]
        subcategory: Option<String>,

        #[arg(long)]
        title: String,

        #[arg(long)]
        content: String,

        #[arg(long)]
        summary: Option<String>,

        #[arg(long = "tag")]
        tags: Vec<String>,
    },
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("content_portal=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    if let Commands::Init { seed } = cli.command {
        migrate::run_migrations(&cfg).await?;
        println!("Database initialized successfully.");
        if seed {
            let portal = Portal::open(&cfg).await?;
            let n = terminology::seed(portal.store.as_ref(), &portal.terminology).await?;
            println!("Seeded {} terminology mappings.", n);
        }
        return Ok(());
    }
    if let Commands::Serve = cli.command {
        return server::run_server(&cfg).await;
    }

    let portal = Portal::open(&cfg).await?;
    let store = portal.store.as_ref();

    match cli.command {
        Commands::Init { .. } | Commands::Serve => unreachable!(),
        Commands::Search {
            query,
            types,
            states,
            limit,
            no_rerank,
            json,
        } => {
            let req = search::SearchRequest {
                query,
                types,
                states,
                limit,
                no_rerank,
            };
            search::run_search(&portal, req, json).await?;
        }
        Commands::Chat { session } => {
            chat::run_chat(&portal, &session).await?;
        }
        Commands::Terminology { action } => match action {
            TermAction::List { pending, json } => {
                let rows = terminology::list(store, pending).await?;
                if json {
                    println!("{}", serde_json::to_string_pretty(&rows)?);
                } else {
                    terminology::print_mappings(&rows);
                }
            }
            TermAction::Add {
                map_type,
                user_term,
                canonical_term,
            } => {
                let map_type = MapType::from_str(&map_type)?;
                let row = terminology::add_manual(
                    store,
                    &portal.terminology,
                    map_type,
                    &user_term,
                    &canonical_term,
                )
                .await?;
                println!("Added {} mapping {} -> {} ({})", row.map_type, row.user_term, row.canonical_term, row.id);
            }
            TermAction::Approve { id } => {
                let row = terminology::approve(store, &portal.terminology, &id).await?;
                println!("Approved {} -> {}", row.user_term, row.canonical_term);
            }
            TermAction::Reject { id } => {
                terminology::reject(store, &id).await?;
                println!("Rejected {}", id);
            }
            TermAction::Suggest { days } => {
                let rows =
                    terminology::suggest(store, portal.llm.as_ref(), &portal.terminology, days).await?;
                println!("{} new suggestions stored for review.", rows.len());
                terminology::print_mappings(&rows);
            }
            TermAction::Seed => {
                let n = terminology::seed(store, &portal.terminology).await?;
                println!("Seeded {} terminology mappings.", n);
            }
        },
        Commands::Report { kind } => match kind {
            ReportKind::Weekly { json } => report::run_weekly(&portal, json).await?,
            ReportKind::Analyze {
                days,
                store_mappings,
                json,
            } => report::run_analyze(&portal, days, store_mappings, json).await?,
        },
        Commands::Export {
            query,
            types,
            states,
            output,
        } => {
            export::run_export(&portal, query.as_deref(), &types, &states, output.as_deref()).await?;
        }
        Commands::Stats { days, json } => {
            stats::run_stats(&portal, days, json).await?;
        }
        Commands::Dedup { threshold, json } => {
            maintenance::run_dedup(store, threshold, json).await?;
        }
        Commands::StandardizeTypes { dry_run } => {
            maintenance::run_standardize(store, dry_run).await?;
        }
        Commands::Enrich {
            limit,
            force,
            dry_run,
            json,
        } => {
            let opts = enrich::EnrichOptions {
                limit,
                force,
                dry_run,
            };
            enrich::run_enrich(&portal, &opts, json).await?;
        }
        Commands::Context { action } => match action {
            ContextAction::List { category, json } => {
                ai_context::run_list(store, category.as_deref(), json).await?;
            }
            ContextAction::Add {
                category,
                subcategory,
                title,
                content,
                summary,
                tags,
            } => {
                let id = ai_context::add(
                    store,
                    NewContextEntry {
                        category,
                        subcategory,
                        title,
                        content,
                        summary,
                        tags,
                    },
                )
                .await?;
                println!("Added context entry {}", id);
            }
        },
    }

    Ok(())
}
