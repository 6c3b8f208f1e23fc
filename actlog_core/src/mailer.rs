//! Mail transport contract and a spool-file implementation.
//!
//! The coordinator only knows the request/response shapes defined here. The
//! bundled [`OutboxTransport`] appends each request to a JSONL (JSON Lines)
//! spool with file locking, leaving actual delivery to whatever drains it.

use crate::{Activity, Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Status string that marks a delivered mail
pub const STATUS_SUCCESS: &str = "success";

/// What the coordinator hands to the transport
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct MailRequest {
    pub destination: String,
    pub activities: Vec<Activity>,
}

/// Body of a transport reply
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MailResponseData {
    #[serde(default)]
    pub status: Option<String>,
}

/// Transport reply, shaped `{ data?: { status: string } }`
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MailResponse {
    #[serde(default)]
    pub data: Option<MailResponseData>,
}

impl MailResponse {
    pub fn with_status(status: impl Into<String>) -> Self {
        Self {
            data: Some(MailResponseData {
                status: Some(status.into()),
            }),
        }
    }

    pub fn success() -> Self {
        Self::with_status(STATUS_SUCCESS)
    }

    /// True only when the reply explicitly reports `data.status == "success"`
    pub fn is_success(&self) -> bool {
        self.data
            .as_ref()
            .and_then(|d| d.status.as_deref())
            .is_some_and(|s| s == STATUS_SUCCESS)
    }
}

/// Mail transport collaborator
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send(&self, request: &MailRequest) -> Result<MailResponse>;
}

/// A request as stored in the outbox spool
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OutboxEntry {
    pub id: Uuid,
    pub queued_at: DateTime<Utc>,
    #[serde(flatten)]
    pub request: MailRequest,
}

/// Spool-file transport with exclusive locking on append
pub struct OutboxTransport {
    path: PathBuf,
}

impl OutboxTransport {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl MailTransport for OutboxTransport {
    async fn send(&self, request: &MailRequest) -> Result<MailResponse> {
        let entry = OutboxEntry {
            id: Uuid::new_v4(),
            queued_at: Utc::now(),
            request: request.clone(),
        };
        let line = serde_json::to_string(&entry)?;
        let path = self.path.clone();

        tokio::task::spawn_blocking(move || append_line(&path, &line))
            .await
            .map_err(|e| Error::Transport(format!("outbox writer panicked: {}", e)))??;

        tracing::debug!(
            "Queued mail {} for {} ({} activities)",
            entry.id,
            entry.request.destination,
            entry.request.activities.len()
        );
        Ok(MailResponse::success())
    }
}

fn append_line(path: &Path, line: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let file = OpenOptions::new().create(true).append(true).open(path)?;
    file.lock_exclusive()?;

    let mut writer = std::io::BufWriter::new(&file);
    writer.write_all(line.as_bytes())?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    drop(writer);

    file.unlock()?;
    Ok(())
}

/// Read all queued requests from an outbox spool
///
/// A missing spool reads as empty. Unparseable lines are skipped.
pub fn read_outbox(path: &Path) -> Result<Vec<OutboxEntry>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let file = File::open(path)?;
    file.lock_shared()?;

    let reader = BufReader::new(&file);
    let mut entries = Vec::new();

    for (line_num, line_result) in reader.lines().enumerate() {
        let line = line_result?;
        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<OutboxEntry>(&line) {
            Ok(entry) => entries.push(entry),
            Err(e) => {
                tracing::warn!("Failed to parse outbox entry at line {}: {}", line_num + 1, e);
            }
        }
    }

    file.unlock()?;
    tracing::debug!("Read {} entries from outbox", entries.len());
    Ok(entries)
}
