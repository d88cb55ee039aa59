use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Core types shared across the parser, lineage model and renderers

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sex {
    Male,
    Female,
    #[default]
    Unknown,
}

impl Sex {
    /// Map a `SEX` tag value; anything other than `M`/`F` is unknown.
    pub fn from_tag(value: &str) -> Self {
        match value.trim().to_ascii_uppercase().as_str() {
            "M" => Sex::Male,
            "F" => Sex::Female,
            _ => Sex::Unknown,
        }
    }
}

/// A geocoded place as returned by a [`crate::geocoding::Geocoder`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub display_name: String,
    /// (latitude, longitude)
    pub coordinates: (f64, f64),
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({:.4}, {:.4})",
            self.display_name, self.coordinates.0, self.coordinates.1
        )
    }
}

/// Per-person, per-field geocoding state. A field moves out of `NotRequested`
/// at most once for the lifetime of the person.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "state", content = "location", rename_all = "snake_case")]
pub enum PlaceLookup {
    #[default]
    NotRequested,
    Empty,
    Located(Location),
}

impl PlaceLookup {
    pub fn is_requested(&self) -> bool {
        !matches!(self, PlaceLookup::NotRequested)
    }

    pub fn location(&self) -> Option<&Location> {
        match self {
            PlaceLookup::Located(location) => Some(location),
            _ => None,
        }
    }
}

impl From<Option<Location>> for PlaceLookup {
    fn from(result: Option<Location>) -> Self {
        match result {
            Some(location) => PlaceLookup::Located(location),
            None => PlaceLookup::Empty,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Indented ancestry outline
    #[default]
    Text,
    /// Graphviz digraph
    Dot,
    /// JSON summary of people and families
    Json,
}

/// Which people a graph rendering covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum RenderScope {
    /// Only the ancestry of the root person
    #[default]
    Lineage,
    /// Every person in the document
    Document,
}
