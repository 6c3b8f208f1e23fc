#![forbid(unsafe_code)]

//! Core domain model and logic for the Actlog activity table.
//!
//! This crate provides:
//! - Domain types (activities, facets, export formats and status)
//! - Facet taxonomy building and AND-of-ORs filtering
//! - A pure table state machine for views to drive
//! - Export serialization, local download and mail dispatch
//! - Configuration and logging

pub mod types;
pub mod error;
pub mod config;
pub mod logging;
pub mod source;
pub mod taxonomy;
pub mod filter;
pub mod table;
pub mod serialize;
pub mod download;
pub mod mailer;
pub mod export;
pub mod session;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use config::Config;
pub use source::load_activities;
pub use table::{Effect, Event, TableState, TableView};
pub use download::{DirectoryDownload, DownloadSink};
pub use mailer::{MailRequest, MailResponse, MailTransport, OutboxTransport};
pub use export::{is_plausible_email, ExportCoordinator, ExportOptions, ExportOutcome};
pub use session::TableSession;
