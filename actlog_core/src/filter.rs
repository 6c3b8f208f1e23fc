//! Facet filter engine.
//!
//! Filtering is an AND across facets and an OR within a facet: an activity
//! is kept when, for every facet, nothing is selected or its value is one of
//! the selected rules.

use crate::{Activity, Facet, FilterSelectionState};

/// Flip a rule on or off, returning the new state
///
/// The input state is left untouched. Values that are not part of the
/// taxonomy are accepted as-is so that stale view state never panics.
pub fn toggle(state: &FilterSelectionState, facet: Facet, value: &str) -> FilterSelectionState {
    let mut next = state.clone();
    let selected = &mut next.facet_mut(facet).selected_rules;

    if !selected.remove(value) {
        selected.insert(value.to_owned());
        tracing::debug!("Enabled rule {}={}", facet, value);
    } else {
        tracing::debug!("Disabled rule {}={}", facet, value);
    }

    next
}

/// Whether a single activity passes every facet test
pub fn matches(activity: &Activity, state: &FilterSelectionState) -> bool {
    Facet::ALL.iter().all(|&facet| {
        let selected = state.selected(facet);
        selected.is_empty() || selected.contains(activity.facet_value(facet))
    })
}

/// Project the activities that pass the current selection, keeping their order
pub fn apply(activities: &[Activity], state: &FilterSelectionState) -> Vec<Activity> {
    activities
        .iter()
        .filter(|activity| matches(activity, state))
        .cloned()
        .collect()
}

/// Whether any facet currently constrains the result
pub fn is_active(state: &FilterSelectionState) -> bool {
    Facet::ALL.iter().any(|&facet| !state.selected(facet).is_empty())
}

/// Drop every selection while keeping the observed rules
pub fn clear(state: &FilterSelectionState) -> FilterSelectionState {
    let mut next = state.clone();
    for facet in Facet::ALL {
        next.facet_mut(facet).selected_rules.clear();
    }
    next
}
