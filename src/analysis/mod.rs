/// Table assembly and statistics for the radon pipeline.
///
/// Submodules:
/// - `table`: zips the enriched parallel sequences into flat rows.
/// - `aggregate`: population-weighted radon per district and region.
/// - `stats`: numeric coercion, summaries and the correlation matrix.
/// - `regression`: least-squares fit of incidence on an exposure.

pub mod aggregate;
pub mod regression;
pub mod stats;
pub mod table;

use crate::model::Level;
use aggregate::{COL_INCIDENCE, COL_PM, COL_RADON_AVERAGE};

/// Columns of the result table that enter the summary statistics.
pub fn analysis_columns(level: Level) -> Vec<&'static str> {
    let mut columns = vec![COL_RADON_AVERAGE, COL_INCIDENCE];
    if level.has_particulates() {
        columns.push(COL_PM);
    }
    columns
}

/// Regressors plotted against incidence at each level.
pub fn exposure_columns(level: Level) -> &'static [&'static str] {
    if level.has_particulates() {
        &[COL_RADON_AVERAGE, COL_PM]
    } else {
        &[COL_RADON_AVERAGE]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pm_only_analysed_for_regions() {
        assert_eq!(analysis_columns(Level::District), vec!["radon_average", "vyskyt"]);
        assert_eq!(analysis_columns(Level::Region), vec!["radon_average", "vyskyt", "pm"]);
        assert_eq!(exposure_columns(Level::District), &["radon_average"]);
        assert_eq!(exposure_columns(Level::Region), &["radon_average", "pm"]);
    }
}
