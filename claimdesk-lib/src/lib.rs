//! Insurance claims review desk.
//!
//! Claims are loaded from CSV/JSON exports into SQLite, browsed and searched
//! through server-rendered pages with htmx fragments, flagged for review and
//! annotated with notes. Staff get a dashboard, a CSV merge upload and user
//! management.
//!
//! ```no_run
//! use claimdesk::{build_router, AppState, DatabaseConnection, LogMailer, Settings};
//! use std::sync::Arc;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let settings = Settings::for_tests();
//! let db = DatabaseConnection::open_and_migrate(&settings.database_url).await?;
//! let app = build_router(AppState::new(db.into_pool(), settings, Arc::new(LogMailer)));
//! # let _ = app;
//! # Ok(())
//! # }
//! ```

pub mod accounts;
pub mod auth;
pub mod config;
pub mod db_connection;
pub mod loader;
pub mod mail;
pub mod models;
pub mod pagination;
pub mod queries;
pub mod render;
pub mod report;
pub mod search;
pub mod stats;
pub mod utils;
pub mod web;
pub mod yaml_parser;

pub use config::Settings;
pub use db_connection::DatabaseConnection;
pub use loader::{load_file, DataFormat, LoadSummary};
pub use mail::{LogMailer, Mailer, MemoryMailer};
pub use models::{Claim, ClaimNote, ClaimStatus, NoteType, User, UserProfile};
pub use web::{build_router, serve, AppState};
pub use yaml_parser::{load_settings, load_settings_from};
