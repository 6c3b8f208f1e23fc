//! Loading the activity collection handed over by the host application.

use crate::{Activity, Result};
use std::collections::HashSet;
use std::path::Path;

/// Load activities from a JSON array file
///
/// The file must exist and parse as a whole; entries keep their file order.
/// Duplicate ids are reported but kept, since the host owns identity.
pub fn load_activities(path: &Path) -> Result<Vec<Activity>> {
    let contents = std::fs::read_to_string(path)?;
    let activities = parse_activities(&contents)?;
    tracing::info!("Loaded {} activities from {:?}", activities.len(), path);
    Ok(activities)
}

/// Parse activities from a JSON array
pub fn parse_activities(json: &str) -> Result<Vec<Activity>> {
    let activities: Vec<Activity> = serde_json::from_str(json)?;

    let mut seen = HashSet::new();
    for activity in &activities {
        if !seen.insert(activity.id) {
            tracing::warn!("Duplicate activity id {} in input", activity.id);
        }
    }

    Ok(activities)
}
