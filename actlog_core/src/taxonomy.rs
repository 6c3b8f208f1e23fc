//! Facet taxonomy derived from the activity data itself.

use crate::{Activity, Facet, FacetTaxonomy};
use std::collections::BTreeSet;

/// Build the facet taxonomy for an activity collection
///
/// Every facet gets the distinct values observed across `activities`,
/// sorted ascending. Selections start empty. The result does not depend on
/// the order of the input; an empty collection yields four empty facets.
pub fn build(activities: &[Activity]) -> FacetTaxonomy {
    let mut taxonomy = FacetTaxonomy::default();

    for facet in Facet::ALL {
        let distinct: BTreeSet<&str> = activities
            .iter()
            .map(|activity| activity.facet_value(facet))
            .collect();

        let entry = taxonomy.facet_mut(facet);
        entry.rules = distinct.into_iter().map(str::to_owned).collect();
        entry.selected_rules.clear();
    }

    tracing::debug!(
        "Built taxonomy from {} activities ({} durations, {} resources, {} categories, {} difficulties)",
        activities.len(),
        taxonomy.rules(Facet::Duration).len(),
        taxonomy.rules(Facet::ResourceDetail).len(),
        taxonomy.rules(Facet::Category).len(),
        taxonomy.rules(Facet::Difficulty).len(),
    );

    taxonomy
}

#[cfg(test)]
mod tests {
    use super::*;

    fn activity(id: u64, duration: &str, resource: &str, category: &str, difficulty: &str) -> Activity {
        Activity {
            id,
            date: None,
            description: format!("activity {}", id),
            duration: duration.into(),
            resource_detail: resource.into(),
            category: category.into(),
            difficulty: difficulty.into(),
            status: "open".into(),
        }
    }

    #[test]
    fn test_empty_collection() {
        let taxonomy = build(&[]);
        for facet in Facet::ALL {
            assert!(taxonomy.rules(facet).is_empty());
            assert!(taxonomy.selected(facet).is_empty());
        }
    }

    #[test]
    fn test_rules_are_deduplicated_and_sorted() {
        let activities = vec![
            activity(1, "30m", "Teacher", "write", "Hard"),
            activity(2, "15m", "Alone", "read", "Easy"),
            activity(3, "30m", "Alone", "write", "Average"),
            activity(4, "1h", "Colleague", "read", "Easy"),
        ];

        let taxonomy = build(&activities);
        assert_eq!(taxonomy.rules(Facet::Duration), ["15m", "1h", "30m"]);
        assert_eq!(
            taxonomy.rules(Facet::ResourceDetail),
            ["Alone", "Colleague", "Teacher"]
        );
        assert_eq!(taxonomy.rules(Facet::Category), ["read", "write"]);
        assert_eq!(taxonomy.rules(Facet::Difficulty), ["Average", "Easy", "Hard"]);
    }

    #[test]
    fn test_input_order_does_not_matter() {
        let mut activities = vec![
            activity(1, "30m", "Teacher", "write", "Hard"),
            activity(2, "15m", "Alone", "read", "Easy"),
            activity(3, "45m", "Book", "plan", "Average"),
        ];
        let forward = build(&activities);
        activities.reverse();
        let backward = build(&activities);
        assert_eq!(forward, backward);
    }

    #[test]
    fn test_selections_start_empty() {
        let taxonomy = build(&[activity(1, "15m", "Alone", "read", "Easy")]);
        for facet in Facet::ALL {
            assert_eq!(taxonomy.rules(facet).len(), 1);
            assert!(taxonomy.selected(facet).is_empty());
        }
    }
}
