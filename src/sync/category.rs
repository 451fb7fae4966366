//! Resource categories

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SyncError;

const URL_DELIMITER: char = '/';

/// Logical resource kind governing request shape and normalization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Patient,
    Visit,
    Encounter,
    Observation,
    Location,
    Person,
    Form,
    Provider,
    Privilege,
    Allergy,
    PatientProgram,
}

impl Category {
    pub const ALL: [Category; 11] = [
        Category::Patient,
        Category::Visit,
        Category::Encounter,
        Category::Observation,
        Category::Location,
        Category::Person,
        Category::Form,
        Category::Provider,
        Category::Privilege,
        Category::Allergy,
        Category::PatientProgram,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Patient => "patient",
            Category::Visit => "visit",
            Category::Encounter => "encounter",
            Category::Observation => "observation",
            Category::Location => "location",
            Category::Person => "person",
            Category::Form => "form",
            Category::Provider => "provider",
            Category::Privilege => "privilege",
            Category::Allergy => "allergy",
            Category::PatientProgram => "patient_program",
        }
    }

    /// Category named by the last path segment of a REST resource URL
    ///
    /// The REST collection for observations is `obs`.
    pub fn from_resource_url(url: &str) -> Option<Category> {
        if !url.contains(URL_DELIMITER) {
            return None;
        }
        let segment = url
            .trim_end_matches(URL_DELIMITER)
            .rsplit(URL_DELIMITER)
            .next()
            .unwrap_or_default();
        match segment {
            "obs" => Some(Category::Observation),
            other => other.parse().ok(),
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == lowered)
            .ok_or_else(|| SyncError::UnknownCategory(s.to_string()))
    }
}
