//! Activity table state machine.
//!
//! [`TableState`] holds everything the table view needs: the activity
//! collection, its facet taxonomy with the live selection, the chosen export
//! format, the mail destination and the last reported export status. It is
//! advanced only through [`TableState::update`], which takes an [`Event`] and
//! returns the next state together with the [`Effect`]s the host must carry
//! out. No I/O happens here.

use crate::export::is_plausible_email;
use crate::{
    filter, taxonomy, Activity, ExportFormat, ExportJob, ExportStatus, Facet,
    FilterSelectionState,
};
use std::sync::Arc;

/// Something that happened in the view, or a status report from the exporter
#[derive(Clone, Debug)]
pub enum Event {
    /// A new activity collection replaces the current one
    ActivitiesLoaded(Vec<Activity>),
    /// A rule button was clicked
    ToggleRule { facet: Facet, value: String },
    /// Every selection was reset
    ClearFilters,
    /// Another export format was picked
    SelectExport(ExportFormat),
    /// The destination field was edited
    EditDestination(String),
    /// The export button was pressed
    ExportRequested,
    /// The exporter reported a new delivery status
    StatusChanged(ExportStatus),
}

/// Work the host must perform after a transition
#[derive(Clone, Debug)]
pub enum Effect {
    /// Hand the job to the export coordinator
    Export(ExportJob),
}

/// Complete state of the activity table
#[derive(Clone, Debug)]
pub struct TableState {
    activities: Arc<[Activity]>,
    filters: FilterSelectionState,
    selected_export: ExportFormat,
    destination: String,
    export_status: ExportStatus,
}

/// Everything a presentation layer needs to render the table
#[derive(Clone, Debug, PartialEq)]
pub struct TableView {
    pub filters: FilterSelectionState,
    pub activities: Vec<Activity>,
    pub total: usize,
    pub selected_export: ExportFormat,
    pub destination: String,
    pub export_status: ExportStatus,
    pub export_enabled: bool,
}

impl TableState {
    pub fn new(activities: Vec<Activity>) -> Self {
        let filters = taxonomy::build(&activities);
        Self {
            activities: activities.into(),
            filters,
            selected_export: ExportFormat::default(),
            destination: String::new(),
            export_status: ExportStatus::Idle,
        }
    }

    /// Start with a different export format selected
    pub fn with_export(mut self, format: ExportFormat) -> Self {
        self.selected_export = format;
        self
    }

    pub fn activities(&self) -> &[Activity] {
        &self.activities
    }

    pub fn filters(&self) -> &FilterSelectionState {
        &self.filters
    }

    pub fn selected_export(&self) -> ExportFormat {
        self.selected_export
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    pub fn export_status(&self) -> ExportStatus {
        self.export_status
    }

    /// Activities passing the current selection, in their original order
    pub fn visible(&self) -> Vec<Activity> {
        filter::apply(&self.activities, &self.filters)
    }

    /// Whether pressing the export button would do anything
    ///
    /// Disabled when nothing is visible, or when mailing to an address that
    /// fails the pre-check.
    pub fn export_enabled(&self) -> bool {
        let any_visible = self
            .activities
            .iter()
            .any(|activity| filter::matches(activity, &self.filters));

        any_visible
            && (self.selected_export != ExportFormat::Email
                || is_plausible_email(&self.destination))
    }

    /// Snapshot for rendering
    pub fn view(&self) -> TableView {
        TableView {
            filters: self.filters.clone(),
            activities: self.visible(),
            total: self.activities.len(),
            selected_export: self.selected_export,
            destination: self.destination.clone(),
            export_status: self.export_status,
            export_enabled: self.export_enabled(),
        }
    }

    /// Advance the state by one event
    pub fn update(&self, event: Event) -> (TableState, Vec<Effect>) {
        let mut next = self.clone();
        let mut effects = Vec::new();

        match event {
            Event::ActivitiesLoaded(activities) => {
                tracing::debug!("Loaded {} activities into table", activities.len());
                next.filters = taxonomy::build(&activities);
                next.activities = activities.into();
            }

            Event::ToggleRule { facet, value } => {
                next.filters = filter::toggle(&self.filters, facet, &value);
            }

            Event::ClearFilters => {
                next.filters = filter::clear(&self.filters);
            }

            Event::SelectExport(format) => {
                next.selected_export = format;
            }

            Event::EditDestination(destination) => {
                next.destination = destination;
            }

            Event::ExportRequested => {
                if !self.export_enabled() {
                    tracing::debug!(
                        "Ignoring export request: trigger disabled for {}",
                        self.selected_export
                    );
                    return (next, effects);
                }

                let payload = self.visible();
                let destination = match self.selected_export {
                    ExportFormat::Email => {
                        // The field empties as soon as the mail is dispatched
                        next.export_status = ExportStatus::Pending;
                        Some(std::mem::take(&mut next.destination))
                    }
                    _ => None,
                };

                effects.push(Effect::Export(ExportJob::new(
                    self.selected_export,
                    payload,
                    destination,
                )));
            }

            Event::StatusChanged(status) => {
                next.export_status = status;
            }
        }

        (next, effects)
    }
}
