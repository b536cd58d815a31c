/// Core data types for the radon / cancer-incidence pipeline.
///
/// This module defines the shared domain model imported by all other modules:
/// the raw fetch archive, the flat joined table row, the per-group aggregate
/// row, and the error types that cross stage boundaries. It contains no I/O.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Attribute names
// ---------------------------------------------------------------------------

/// Feature attribute carrying the settlement (part-of-municipality) code.
pub const ATTR_SETTLEMENT: &str = "kod_cast";

/// Feature attribute carrying the municipality code.
pub const ATTR_MUNICIPALITY: &str = "kod_obec";

/// Feature attribute carrying the radon index.
pub const ATTR_RADON: &str = "radon";

// ---------------------------------------------------------------------------
// Raw fetch archive
// ---------------------------------------------------------------------------

/// Raw results of the feature fetch, one entry per feature in each sequence.
///
/// The three sequences are parallel: index `i` in each describes the same
/// feature. Every mutation goes through [`RadonArchive::push`], which keeps
/// the lengths equal.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RadonArchive {
    pub settlement_codes: Vec<Option<String>>,
    pub municipality_codes: Vec<Option<String>>,
    pub radon_indices: Vec<Option<f64>>,
}

impl RadonArchive {
    pub fn push(&mut self, settlement: Option<String>, municipality: Option<String>, radon: Option<f64>) {
        self.settlement_codes.push(settlement);
        self.municipality_codes.push(municipality);
        self.radon_indices.push(radon);
    }

    pub fn len(&self) -> usize {
        self.settlement_codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.settlement_codes.is_empty()
    }

    /// Checks that the three parallel sequences have the same length.
    ///
    /// Only an archive deserialized from disk can fail this.
    pub fn check_lengths(&self) -> Result<(), PipelineError> {
        let lengths = [
            self.settlement_codes.len(),
            self.municipality_codes.len(),
            self.radon_indices.len(),
        ];
        if lengths.iter().all(|&n| n == lengths[0]) {
            Ok(())
        } else {
            Err(PipelineError::LengthMismatch(format!(
                "archive sequences have lengths {:?}",
                lengths
            )))
        }
    }
}

/// Normalizes a code key so that `"12345"`, `" 12345 "` and `"12345.0"`
/// compare equal. Returns `None` for blank input.
pub fn normalize_code(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let stripped = trimmed
        .strip_suffix(".0")
        .filter(|head| !head.is_empty() && head.chars().all(|c| c.is_ascii_digit()))
        .unwrap_or(trimmed);
    Some(stripped.to_string())
}

// ---------------------------------------------------------------------------
// Joined table
// ---------------------------------------------------------------------------

/// One row of the flat joined table, one per fetched feature.
///
/// Column names follow the source datasets so the CSV stays readable next
/// to the census and NOR extracts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JoinedRow {
    pub kod_cast: Option<String>,
    pub kod_obec: Option<String>,
    pub radon: Option<f64>,
    pub populace: Option<f64>,
    pub okres: Option<String>,
    pub kraj: Option<String>,
}

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

/// Administrative level an aggregate table is grouped by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Level {
    /// Okres, second-tier unit.
    District,
    /// Kraj, top-tier unit.
    Region,
}

impl Level {
    pub const ALL: [Level; 2] = [Level::District, Level::Region];

    /// Column name of the grouping key in joined and result tables.
    pub fn key_column(self) -> &'static str {
        match self {
            Level::District => "okres",
            Level::Region => "kraj",
        }
    }

    /// Picks the grouping key of a joined row.
    pub fn key_of(self, row: &JoinedRow) -> Option<&str> {
        match self {
            Level::District => row.okres.as_deref(),
            Level::Region => row.kraj.as_deref(),
        }
    }

    /// Whether this level also carries the particulate-matter column.
    pub fn has_particulates(self) -> bool {
        matches!(self, Level::Region)
    }
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Level::District => write!(f, "district"),
            Level::Region => write!(f, "region"),
        }
    }
}

/// Per-group aggregate: weighted radon mean plus externally attached figures.
///
/// Every numeric field may be absent; absence is written as an empty cell.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateRow {
    pub group: String,
    pub radon_average: Option<f64>,
    /// Incidence per 100,000 population.
    pub incidence: Option<f64>,
    /// Particulate-matter reading; region level only.
    pub pm: Option<f64>,
}

impl AggregateRow {
    pub fn new(group: impl Into<String>, radon_average: Option<f64>) -> Self {
        AggregateRow {
            group: group.into(),
            radon_average,
            incidence: None,
            pm: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors raised while fetching one window of the feature service.
#[derive(Debug, PartialEq)]
pub enum FetchError {
    /// Non-2xx HTTP response.
    Http(u16),
    /// The request never produced a response (DNS, TLS, timeout, ...).
    Transport(String),
    /// The response body was not a feature collection.
    Parse(String),
}

impl std::fmt::Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchError::Http(code) => write!(f, "HTTP error: {}", code),
            FetchError::Transport(msg) => write!(f, "Transport error: {}", msg),
            FetchError::Parse(msg) => write!(f, "Parse error: {}", msg),
        }
    }
}

impl std::error::Error for FetchError {}

/// Errors that stop a pipeline stage.
#[derive(Debug)]
pub enum PipelineError {
    Io(std::io::Error),
    Csv(String),
    Archive(String),
    Spreadsheet(String),
    Config(String),
    Plot(String),
    /// Parallel sequences that must be zipped have different lengths.
    LengthMismatch(String),
    /// An input table lacks a required column.
    MissingColumn { file: String, column: String },
}

impl std::fmt::Display for PipelineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineError::Io(e) => write!(f, "I/O error: {}", e),
            PipelineError::Csv(msg) => write!(f, "CSV error: {}", msg),
            PipelineError::Archive(msg) => write!(f, "Archive error: {}", msg),
            PipelineError::Spreadsheet(msg) => write!(f, "Spreadsheet error: {}", msg),
            PipelineError::Config(msg) => write!(f, "Config error: {}", msg),
            PipelineError::Plot(msg) => write!(f, "Plot error: {}", msg),
            PipelineError::LengthMismatch(msg) => write!(f, "Length mismatch: {}", msg),
            PipelineError::MissingColumn { file, column } => {
                write!(f, "Column '{}' not found in {}", column, file)
            }
        }
    }
}

impl std::error::Error for PipelineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PipelineError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for PipelineError {
    fn from(e: std::io::Error) -> Self {
        PipelineError::Io(e)
    }
}

impl From<csv::Error> for PipelineError {
    fn from(e: csv::Error) -> Self {
        PipelineError::Csv(e.to_string())
    }
}

impl From<rmp_serde::encode::Error> for PipelineError {
    fn from(e: rmp_serde::encode::Error) -> Self {
        PipelineError::Archive(e.to_string())
    }
}

impl From<rmp_serde::decode::Error> for PipelineError {
    fn from(e: rmp_serde::decode::Error) -> Self {
        PipelineError::Archive(e.to_string())
    }
}

impl From<calamine::Error> for PipelineError {
    fn from(e: calamine::Error) -> Self {
        PipelineError::Spreadsheet(e.to_string())
    }
}

impl From<toml::de::Error> for PipelineError {
    fn from(e: toml::de::Error) -> Self {
        PipelineError::Config(e.to_string())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
