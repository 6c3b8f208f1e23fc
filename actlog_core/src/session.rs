//! Runs the table state machine against a live export coordinator.
//!
//! [`TableSession`] is the glue between the pure [`TableState`] and the
//! side-effecting [`ExportCoordinator`]: events go into the state, resulting
//! effects are executed, and status reports from the coordinator are folded
//! back in as [`Event::StatusChanged`].

use crate::export::{ExportCoordinator, ExportOutcome};
use crate::table::{Effect, Event, TableState, TableView};
use crate::{ExportStatus, Result};
use tokio::sync::watch;

pub struct TableSession {
    state: TableState,
    coordinator: ExportCoordinator,
    status: watch::Receiver<ExportStatus>,
}

impl TableSession {
    pub fn new(state: TableState, coordinator: ExportCoordinator) -> Self {
        let status = coordinator.subscribe();
        Self {
            state,
            coordinator,
            status,
        }
    }

    pub fn state(&self) -> &TableState {
        &self.state
    }

    pub fn view(&self) -> TableView {
        self.state.view()
    }

    /// Apply an event and carry out whatever it asks for
    ///
    /// Returns the outcome of every export the event triggered.
    pub fn handle(&mut self, event: Event) -> Result<Vec<ExportOutcome>> {
        let (next, effects) = self.state.update(event);
        self.state = next;

        let mut outcomes = Vec::with_capacity(effects.len());
        for effect in effects {
            match effect {
                Effect::Export(job) => outcomes.push(self.coordinator.run(job)?),
            }
        }

        self.sync_status();
        Ok(outcomes)
    }

    /// Fold the coordinator's latest status into the state, if it changed
    pub fn sync_status(&mut self) -> bool {
        if !self.status.has_changed().unwrap_or(false) {
            return false;
        }
        let status = *self.status.borrow_and_update();
        self.apply_status(status);
        true
    }

    /// Wait for the next status report and fold it into the state
    pub async fn next_status(&mut self) -> Result<ExportStatus> {
        self.status
            .changed()
            .await
            .map_err(|e| crate::Error::Other(format!("export status channel closed: {}", e)))?;
        let status = *self.status.borrow_and_update();
        self.apply_status(status);
        Ok(status)
    }

    fn apply_status(&mut self, status: ExportStatus) {
        let (next, _) = self.state.update(Event::StatusChanged(status));
        self.state = next;
    }
}
