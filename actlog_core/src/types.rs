//! Core domain types for the activity table.
//!
//! This module defines the fundamental types used throughout the system:
//! - Activities and the facets they are filtered on
//! - Facet rules and the filter selection state
//! - Export formats, delivery status and export jobs

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Activity
// ============================================================================

/// A logged activity as supplied by the host application.
///
/// Only the four facet fields carry meaning for filtering; date, description
/// and status are carried through to exports untouched.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub id: u64,
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub description: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub duration: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub resource_detail: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub category: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub difficulty: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub status: String,
}

/// Host data sends `null` for unset labels; treat it like a missing key
fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

impl Activity {
    /// Value of this activity for the given facet
    pub fn facet_value(&self, facet: Facet) -> &str {
        match facet {
            Facet::Duration => &self.duration,
            Facet::ResourceDetail => &self.resource_detail,
            Facet::Category => &self.category,
            Facet::Difficulty => &self.difficulty,
        }
    }
}

// ============================================================================
// Facets and Filter State
// ============================================================================

/// One independent filterable dimension of an activity
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "camelCase")]
pub enum Facet {
    Duration,
    ResourceDetail,
    Category,
    Difficulty,
}

impl Facet {
    /// All facets in display order
    pub const ALL: [Facet; 4] = [
        Facet::Duration,
        Facet::ResourceDetail,
        Facet::Category,
        Facet::Difficulty,
    ];

    /// Wire key, as used in activity JSON
    pub fn key(self) -> &'static str {
        match self {
            Facet::Duration => "duration",
            Facet::ResourceDetail => "resourceDetail",
            Facet::Category => "category",
            Facet::Difficulty => "difficulty",
        }
    }

    /// Column header shown above the facet's rule buttons
    pub fn header(self) -> &'static str {
        match self {
            Facet::Duration => "Tijd",
            Facet::ResourceDetail => "Hulpbron",
            Facet::Category => "Categorie",
            Facet::Difficulty => "Complexiteit",
        }
    }
}

impl fmt::Display for Facet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Facet {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.to_lowercase().as_str() {
            "duration" => Ok(Facet::Duration),
            "resourcedetail" | "resource_detail" | "resource-detail" => {
                Ok(Facet::ResourceDetail)
            }
            "category" => Ok(Facet::Category),
            "difficulty" => Ok(Facet::Difficulty),
            _ => Err(crate::Error::Other(format!("Unknown facet: {}", s))),
        }
    }
}

/// Observed rules and active selection for a single facet
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FacetRules {
    /// Distinct observed values, sorted ascending
    pub rules: Vec<String>,
    /// Values currently used as an inclusion filter
    pub selected_rules: BTreeSet<String>,
}

impl FacetRules {
    /// Whether the given rule is currently switched on
    pub fn is_selected(&self, rule: &str) -> bool {
        self.selected_rules.contains(rule)
    }
}

/// Rules and selections for every facet.
///
/// Used both as the taxonomy produced from an activity collection and as the
/// live filter selection; a fresh taxonomy is simply a state with nothing
/// selected.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct FilterSelectionState {
    facets: BTreeMap<Facet, FacetRules>,
}

/// A taxonomy is a selection state with every selection empty
pub type FacetTaxonomy = FilterSelectionState;

impl FilterSelectionState {
    /// Rules for a facet (empty if the facet has never been populated)
    pub fn facet(&self, facet: Facet) -> &FacetRules {
        static EMPTY: FacetRules = FacetRules {
            rules: Vec::new(),
            selected_rules: BTreeSet::new(),
        };
        self.facets.get(&facet).unwrap_or(&EMPTY)
    }

    /// Mutable access, creating the facet entry on demand
    pub(crate) fn facet_mut(&mut self, facet: Facet) -> &mut FacetRules {
        self.facets.entry(facet).or_default()
    }

    /// Currently selected values for a facet
    pub fn selected(&self, facet: Facet) -> &BTreeSet<String> {
        &self.facet(facet).selected_rules
    }

    /// Observed values for a facet
    pub fn rules(&self, facet: Facet) -> &[String] {
        &self.facet(facet).rules
    }
}

// ============================================================================
// Export Types
// ============================================================================

/// Supported output channels
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ExportFormat {
    Csv,
    #[default]
    Txt,
    Email,
}

impl ExportFormat {
    /// Formats in the order they are offered to the user
    pub const ALL: [ExportFormat; 3] = [ExportFormat::Csv, ExportFormat::Txt, ExportFormat::Email];

    pub fn as_str(self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Txt => "txt",
            ExportFormat::Email => "email",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExportFormat {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.to_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "txt" => Ok(ExportFormat::Txt),
            "email" | "mail" => Ok(ExportFormat::Email),
            _ => {
                let known: Vec<&str> = ExportFormat::ALL.iter().map(|f| f.as_str()).collect();
                Err(crate::Error::Other(format!(
                    "Unknown export format: {} (expected one of {})",
                    s,
                    known.join(", ")
                )))
            }
        }
    }
}

/// Delivery status observed by the view layer
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExportStatus {
    #[default]
    Idle,
    Pending,
    Success,
    Failure,
}

/// A single export request, created when the user triggers an export
///
/// Delivery status is not tracked per job: the export coordinator owns the
/// one shared status value that the view observes.
#[derive(Clone, Debug)]
pub struct ExportJob {
    pub format: ExportFormat,
    pub payload: Vec<Activity>,
    pub destination: Option<String>,
}

impl ExportJob {
    pub fn new(format: ExportFormat, payload: Vec<Activity>, destination: Option<String>) -> Self {
        Self {
            format,
            payload,
            destination,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_facet_keys_parse_back() {
        for facet in Facet::ALL {
            assert_eq!(facet.key().parse::<Facet>().unwrap(), facet);
        }
        assert_eq!("resource-detail".parse::<Facet>().unwrap(), Facet::ResourceDetail);
        assert!("colour".parse::<Facet>().is_err());
    }

    #[test]
    fn test_export_format_parsing() {
        assert_eq!("CSV".parse::<ExportFormat>().unwrap(), ExportFormat::Csv);
        assert_eq!("email".parse::<ExportFormat>().unwrap(), ExportFormat::Email);
        let err = "pdf".parse::<ExportFormat>().unwrap_err();
        assert!(err.to_string().contains("csv, txt, email"));
    }

    #[test]
    fn test_missing_facet_reads_as_empty() {
        let state = FilterSelectionState::default();
        assert!(state.rules(Facet::Category).is_empty());
        assert!(!state.facet(Facet::Category).is_selected("read"));
    }
}
