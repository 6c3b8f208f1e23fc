//! Export coordinator.
//!
//! Download formats (csv, txt) are serialized and delivered synchronously.
//! Email exports go through the mail transport on a spawned task: the status
//! moves to `Pending` right away, to `Success` or `Failure` when the
//! transport answers, and back to `Idle` after the reset delay.
//!
//! ## Overlapping dispatches
//!
//! Dispatches are neither serialized nor cancellable. Every completion and
//! every deferred reset writes the shared status directly, so with two mails
//! in flight the last write wins. Each dispatch gets a ticket number, which is
//! only used for logging.

use crate::download::DownloadSink;
use crate::mailer::{MailRequest, MailTransport};
use crate::{serialize, Activity, Error, ExportFormat, ExportJob, ExportStatus, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;

/// How long a success/failure status stays visible before going idle
pub const DEFAULT_RESET_DELAY: Duration = Duration::from_secs(3);

/// Weak client-side address check: must contain both '@' and '.'
///
/// Authoritative validation is the transport's business.
pub fn is_plausible_email(address: &str) -> bool {
    address.contains('@') && address.contains('.')
}

/// Per-export options
#[derive(Clone, Debug, Default)]
pub struct ExportOptions {
    /// Mail destination, required for the email format
    pub destination: Option<String>,
}

/// Result of triggering an export
#[derive(Debug)]
pub enum ExportOutcome {
    /// A file was written locally
    Downloaded { path: PathBuf, count: usize },
    /// A mail is on its way; its status arrives later
    Dispatched(Dispatch),
}

/// Handle on an in-flight mail dispatch
#[derive(Debug)]
pub struct Dispatch {
    pub ticket: u64,
    result: oneshot::Receiver<ExportStatus>,
    verdict: Option<ExportStatus>,
    task: JoinHandle<()>,
}

impl Dispatch {
    /// Wait for the transport's verdict (`Success` or `Failure`)
    pub async fn outcome(&mut self) -> ExportStatus {
        if let Some(verdict) = self.verdict {
            return verdict;
        }
        let verdict = (&mut self.result).await.unwrap_or(ExportStatus::Failure);
        self.verdict = Some(verdict);
        verdict
    }

    /// Wait until the dispatch has finished, including the status reset
    pub async fn finished(self) {
        if let Err(e) = self.task.await {
            tracing::warn!("Dispatch task {} ended abnormally: {}", self.ticket, e);
        }
    }
}

/// Serializes and delivers exports, tracking the mail delivery status
pub struct ExportCoordinator {
    downloads: Box<dyn DownloadSink + Send>,
    transport: Arc<dyn MailTransport>,
    status: Arc<watch::Sender<ExportStatus>>,
    reset_delay: Duration,
    next_ticket: u64,
}

impl ExportCoordinator {
    pub fn new(
        downloads: impl DownloadSink + Send + 'static,
        transport: impl MailTransport + 'static,
    ) -> Self {
        let (status, _) = watch::channel(ExportStatus::Idle);
        Self {
            downloads: Box::new(downloads),
            transport: Arc::new(transport),
            status: Arc::new(status),
            reset_delay: DEFAULT_RESET_DELAY,
            next_ticket: 1,
        }
    }

    /// Override how long a final status stays visible
    pub fn with_reset_delay(mut self, delay: Duration) -> Self {
        self.reset_delay = delay;
        self
    }

    /// Current delivery status
    pub fn status(&self) -> ExportStatus {
        *self.status.borrow()
    }

    /// Observe every status change
    pub fn subscribe(&self) -> watch::Receiver<ExportStatus> {
        self.status.subscribe()
    }

    /// Run an export job built by the table state machine
    pub fn run(&mut self, job: ExportJob) -> Result<ExportOutcome> {
        let options = ExportOptions {
            destination: job.destination,
        };
        self.export(job.format, &job.payload, options)
    }

    /// Export `activities` in the given format
    ///
    /// Must be called from within a tokio runtime when `format` is email.
    /// Returns immediately in every case; email outcomes are reported through
    /// the status channel and the returned [`Dispatch`].
    pub fn export(
        &mut self,
        format: ExportFormat,
        activities: &[Activity],
        options: ExportOptions,
    ) -> Result<ExportOutcome> {
        if activities.is_empty() {
            return Err(Error::EmptySelection);
        }

        match format {
            ExportFormat::Csv | ExportFormat::Txt => {
                let payload = serialize::serialize(format, activities)?;
                let path = self.downloads.deliver(&payload)?;
                tracing::info!("Exported {} activities to {:?}", activities.len(), path);
                Ok(ExportOutcome::Downloaded {
                    path,
                    count: activities.len(),
                })
            }
            ExportFormat::Email => {
                let destination = options.destination.unwrap_or_default();
                if !is_plausible_email(&destination) {
                    return Err(Error::InvalidDestination(destination));
                }
                Ok(ExportOutcome::Dispatched(self.dispatch(destination, activities)))
            }
        }
    }

    fn dispatch(&mut self, destination: String, activities: &[Activity]) -> Dispatch {
        let ticket = self.next_ticket;
        self.next_ticket += 1;

        self.status.send_replace(ExportStatus::Pending);
        tracing::info!(
            "Dispatching {} activities to {} (ticket {})",
            activities.len(),
            destination,
            ticket
        );

        let request = MailRequest {
            destination,
            activities: activities.to_vec(),
        };
        let transport = Arc::clone(&self.transport);
        let status = Arc::clone(&self.status);
        let reset_delay = self.reset_delay;
        let (result_tx, result) = oneshot::channel();

        let task = tokio::spawn(async move {
            // Run the transport on its own task so a panic there still resolves
            let sent = tokio::spawn(async move { transport.send(&request).await }).await;

            let outcome = match sent {
                Ok(Ok(response)) if response.is_success() => ExportStatus::Success,
                Ok(Ok(response)) => {
                    tracing::warn!("Mail dispatch {} rejected: {:?}", ticket, response);
                    ExportStatus::Failure
                }
                Ok(Err(e)) => {
                    tracing::warn!("Mail dispatch {} failed: {}", ticket, e);
                    ExportStatus::Failure
                }
                Err(e) => {
                    tracing::warn!("Mail dispatch {} aborted: {}", ticket, e);
                    ExportStatus::Failure
                }
            };

            status.send_replace(outcome);
            let _ = result_tx.send(outcome);
            tracing::info!("Mail dispatch {} finished: {:?}", ticket, outcome);

            tokio::time::sleep(reset_delay).await;
            status.send_replace(ExportStatus::Idle);
            tracing::debug!("Export status reset after dispatch {}", ticket);
        });

        Dispatch {
            ticket,
            result,
            verdict: None,
            task,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::download::DirectoryDownload;
    use crate::mailer::MailResponse;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tokio::time::advance;

    /// Replies with a fixed response or error
    struct FixedTransport(std::result::Result<MailResponse, String>);

    #[async_trait]
    impl MailTransport for FixedTransport {
        async fn send(&self, _request: &MailRequest) -> Result<MailResponse> {
            self.0.clone().map_err(Error::Transport)
        }
    }

    /// Records requests and replies only when released
    struct GatedTransport {
        gates: Mutex<Vec<oneshot::Receiver<MailResponse>>>,
        seen: Arc<Mutex<Vec<MailRequest>>>,
    }

    #[async_trait]
    impl MailTransport for GatedTransport {
        async fn send(&self, request: &MailRequest) -> Result<MailResponse> {
            self.seen.lock().unwrap().push(request.clone());
            let gate = self.gates.lock().unwrap().remove(0);
            gate.await.map_err(|e| Error::Transport(e.to_string()))
        }
    }

    struct PanickingTransport;

    #[async_trait]
    impl MailTransport for PanickingTransport {
        async fn send(&self, _request: &MailRequest) -> Result<MailResponse> {
            panic!("transport blew up");
        }
    }

    fn activities() -> Vec<Activity> {
        vec![Activity {
            id: 1,
            date: None,
            description: "Stand-up".into(),
            duration: "15m".into(),
            resource_detail: "Team".into(),
            category: "meeting".into(),
            difficulty: "Easy".into(),
            status: "done".into(),
        }]
    }

    fn coordinator(transport: impl MailTransport + 'static) -> (ExportCoordinator, tempfile::TempDir) {
        let temp_dir = tempfile::tempdir().unwrap();
        let coordinator = ExportCoordinator::new(DirectoryDownload::new(temp_dir.path()), transport);
        (coordinator, temp_dir)
    }

    fn email_to(address: &str) -> ExportOptions {
        ExportOptions {
            destination: Some(address.into()),
        }
    }

    fn dispatched(outcome: ExportOutcome) -> Dispatch {
        match outcome {
            ExportOutcome::Dispatched(dispatch) => dispatch,
            other => panic!("expected a dispatch, got {:?}", other),
        }
    }

    #[test]
    fn test_plausible_email() {
        assert!(!is_plausible_email("foo"));
        assert!(!is_plausible_email("foo@bar"));
        assert!(!is_plausible_email("foo.bar"));
        assert!(!is_plausible_email(""));
        assert!(is_plausible_email("a@b.c"));
    }

    #[test]
    fn test_download_formats_are_synchronous() {
        let (mut coordinator, temp_dir) = coordinator(FixedTransport(Ok(MailResponse::success())));

        for format in [ExportFormat::Csv, ExportFormat::Txt] {
            let outcome = coordinator
                .export(format, &activities(), ExportOptions::default())
                .unwrap();
            match outcome {
                ExportOutcome::Downloaded { path, count } => {
                    assert_eq!(count, 1);
                    assert_eq!(path, temp_dir.path().join(format!("activities.{}", format)));
                    assert!(std::fs::read_to_string(path).unwrap().contains("Stand-up"));
                }
                other => panic!("expected a download, got {:?}", other),
            }
        }
        assert_eq!(coordinator.status(), ExportStatus::Idle);
    }

    #[test]
    fn test_empty_selection_is_rejected() {
        let (mut coordinator, _dir) = coordinator(FixedTransport(Ok(MailResponse::success())));
        let err = coordinator
            .export(ExportFormat::Csv, &[], ExportOptions::default())
            .unwrap_err();
        assert!(matches!(err, Error::EmptySelection));
    }

    #[test]
    fn test_invalid_destination_is_not_attempted() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let transport = GatedTransport {
            gates: Mutex::new(Vec::new()),
            seen: Arc::clone(&seen),
        };
        let (mut coordinator, _dir) = coordinator(transport);

        for bad in [None, Some("foo"), Some("foo@bar"), Some("foo.bar")] {
            let options = ExportOptions {
                destination: bad.map(String::from),
            };
            let err = coordinator
                .export(ExportFormat::Email, &activities(), options)
                .unwrap_err();
            assert!(matches!(err, Error::InvalidDestination(_)));
        }

        assert_eq!(coordinator.status(), ExportStatus::Idle);
        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_successful_dispatch_resets_after_delay() {
        let (mut coordinator, _dir) = coordinator(FixedTransport(Ok(MailResponse::success())));
        let mut status = coordinator.subscribe();

        let outcome = coordinator
            .export(ExportFormat::Email, &activities(), email_to("a@b.c"))
            .unwrap();
        assert_eq!(coordinator.status(), ExportStatus::Pending);

        let mut dispatch = dispatched(outcome);
        assert_eq!(dispatch.outcome().await, ExportStatus::Success);
        status.changed().await.unwrap();
        assert_eq!(*status.borrow_and_update(), ExportStatus::Success);

        advance(Duration::from_millis(2900)).await;
        assert_eq!(coordinator.status(), ExportStatus::Success);

        advance(Duration::from_millis(200)).await;
        dispatch.finished().await;
        assert_eq!(coordinator.status(), ExportStatus::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_status_maps_to_failure() {
        let (mut coordinator, _dir) =
            coordinator(FixedTransport(Ok(MailResponse::with_status("error"))));

        let mut dispatch = dispatched(
            coordinator
                .export(ExportFormat::Email, &activities(), email_to("a@b.c"))
                .unwrap(),
        );
        assert_eq!(dispatch.outcome().await, ExportStatus::Failure);
        assert_eq!(coordinator.status(), ExportStatus::Failure);

        dispatch.finished().await;
        assert_eq!(coordinator.status(), ExportStatus::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_status_maps_to_failure() {
        let (mut coordinator, _dir) = coordinator(FixedTransport(Ok(MailResponse::default())));
        let mut dispatch = dispatched(
            coordinator
                .export(ExportFormat::Email, &activities(), email_to("a@b.c"))
                .unwrap(),
        );
        assert_eq!(dispatch.outcome().await, ExportStatus::Failure);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_error_maps_to_failure() {
        let (mut coordinator, _dir) = coordinator(FixedTransport(Err("connection refused".into())));
        let started = tokio::time::Instant::now();

        let mut dispatch = dispatched(
            coordinator
                .export(ExportFormat::Email, &activities(), email_to("a@b.c"))
                .unwrap(),
        );
        assert_eq!(dispatch.outcome().await, ExportStatus::Failure);
        assert_eq!(coordinator.status(), ExportStatus::Failure);

        dispatch.finished().await;
        assert_eq!(coordinator.status(), ExportStatus::Idle);
        assert!(started.elapsed() >= DEFAULT_RESET_DELAY);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_panic_maps_to_failure() {
        let (mut coordinator, _dir) = coordinator(PanickingTransport);
        let mut dispatch = dispatched(
            coordinator
                .export(ExportFormat::Email, &activities(), email_to("a@b.c"))
                .unwrap(),
        );
        assert_eq!(dispatch.outcome().await, ExportStatus::Failure);

        dispatch.finished().await;
        assert_eq!(coordinator.status(), ExportStatus::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_overlapping_dispatches_last_write_wins() {
        let (first_tx, first_rx) = oneshot::channel();
        let (second_tx, second_rx) = oneshot::channel();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let transport = GatedTransport {
            gates: Mutex::new(vec![first_rx, second_rx]),
            seen: Arc::clone(&seen),
        };
        let (mut coordinator, _dir) = coordinator(transport);

        let mut first = dispatched(
            coordinator
                .export(ExportFormat::Email, &activities(), email_to("a@b.c"))
                .unwrap(),
        );
        // Let the first request reach its gate before the second is sent
        tokio::task::yield_now().await;
        while seen.lock().unwrap().len() < 1 {
            tokio::task::yield_now().await;
        }

        let mut second = dispatched(
            coordinator
                .export(ExportFormat::Email, &activities(), email_to("x@y.z"))
                .unwrap(),
        );
        assert_eq!((first.ticket, second.ticket), (1, 2));
        while seen.lock().unwrap().len() < 2 {
            tokio::task::yield_now().await;
        }

        // Second answers first, then the first one overwrites it
        second_tx.send(MailResponse::success()).unwrap();
        assert_eq!(second.outcome().await, ExportStatus::Success);
        assert_eq!(coordinator.status(), ExportStatus::Success);

        advance(Duration::from_secs(1)).await;
        first_tx.send(MailResponse::with_status("error")).unwrap();
        assert_eq!(first.outcome().await, ExportStatus::Failure);
        assert_eq!(coordinator.status(), ExportStatus::Failure);

        // The second dispatch's reset fires first and clears the first's failure
        advance(Duration::from_millis(2100)).await;
        second.finished().await;
        assert_eq!(coordinator.status(), ExportStatus::Idle);

        first.finished().await;
        assert_eq!(coordinator.status(), ExportStatus::Idle);

        let destinations: Vec<String> = seen
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.destination.clone())
            .collect();
        assert_eq!(destinations, vec!["a@b.c", "x@y.z"]);
    }

    #[tokio::test]
    async fn test_run_uses_job_destination() {
        let (mut coordinator, _dir) = coordinator(FixedTransport(Ok(MailResponse::success())));
        let job = ExportJob::new(ExportFormat::Email, activities(), Some("a@b.c".into()));

        let mut dispatch = dispatched(coordinator.run(job).unwrap());
        assert_eq!(dispatch.outcome().await, ExportStatus::Success);
    }
}
