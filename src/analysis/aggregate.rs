//! Population-weighted radon averages per district or region.

use std::collections::BTreeMap;
use std::path::Path;

use crate::model::{AggregateRow, JoinedRow, Level, PipelineError};

/// Column holding the weighted radon mean in result tables.
pub const COL_RADON_AVERAGE: &str = "radon_average";
/// Column holding the attached incidence.
pub const COL_INCIDENCE: &str = "vyskyt";
/// Column holding the attached particulate-matter reading.
pub const COL_PM: &str = "pm";

/// `Σ(v·w) / Σw` over pairs where both value and weight are present.
///
/// Returns `None` when no pair qualifies or the weights sum to zero.
pub fn weighted_mean<I>(pairs: I) -> Option<f64>
where
    I: IntoIterator<Item = (Option<f64>, Option<f64>)>,
{
    let (weighted_sum, weight_sum, used) = pairs
        .into_iter()
        .filter_map(|(v, w)| Some((v?, w?)))
        .fold((0.0, 0.0, 0usize), |(sv, sw, n), (v, w)| (sv + v * w, sw + w, n + 1));

    if used == 0 || weight_sum == 0.0 {
        None
    } else {
        Some(weighted_sum / weight_sum)
    }
}

/// Groups rows by the level's key and computes the weighted radon mean of
/// each group, weighting by population.
///
/// Rows without a group key are dropped. Output is sorted by group name.
pub fn aggregate(rows: &[JoinedRow], level: Level) -> Vec<AggregateRow> {
    let mut groups: BTreeMap<&str, Vec<&JoinedRow>> = BTreeMap::new();
    for row in rows {
        if let Some(key) = level.key_of(row) {
            groups.entry(key).or_default().push(row);
        }
    }

    groups
        .into_iter()
        .map(|(group, members)| {
            let mean = weighted_mean(members.iter().map(|r| (r.radon, r.populace)));
            AggregateRow::new(group, mean)
        })
        .collect()
}

fn cell(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// Writes the weighted averages only (no external statistics).
pub fn write_weighted(path: &Path, rows: &[AggregateRow], level: Level) -> Result<(), PipelineError> {
    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record([level.key_column(), COL_RADON_AVERAGE])?;
    for row in rows {
        wtr.write_record([row.group.clone(), cell(row.radon_average)])?;
    }
    wtr.flush()?;
    Ok(())
}

/// Writes the full result table; the PM column only at region level.
pub fn write_results(path: &Path, rows: &[AggregateRow], level: Level) -> Result<(), PipelineError> {
    let mut wtr = csv::Writer::from_path(path)?;
    let mut header = vec![level.key_column(), COL_RADON_AVERAGE, COL_INCIDENCE];
    if level.has_particulates() {
        header.push(COL_PM);
    }
    wtr.write_record(&header)?;

    for row in rows {
        let mut record = vec![row.group.clone(), cell(row.radon_average), cell(row.incidence)];
        if level.has_particulates() {
            record.push(cell(row.pm));
        }
        wtr.write_record(&record)?;
    }
    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(okres: &str, kraj: &str, radon: Option<f64>, pop: Option<f64>) -> JoinedRow {
        JoinedRow {
            radon,
            populace: pop,
            okres: Some(okres.to_string()),
            kraj: Some(kraj.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_single_row_group_equals_raw_value() {
        assert_eq!(weighted_mean([(Some(3.0), Some(250.0))]), Some(3.0));
    }

    #[test]
    fn test_all_missing_weights_yield_none() {
        assert_eq!(weighted_mean([(Some(3.0), None), (Some(1.0), None)]), None);
        assert_eq!(weighted_mean(std::iter::empty::<(Option<f64>, Option<f64>)>()), None);
    }

    #[test]
    fn test_zero_weight_sum_yields_none() {
        assert_eq!(weighted_mean([(Some(3.0), Some(0.0)), (Some(1.0), Some(0.0))]), None);
    }

    #[test]
    fn test_rows_with_missing_value_or_weight_are_skipped() {
        let mean = weighted_mean([
            (Some(2.0), Some(100.0)),
            (None, Some(1_000_000.0)),
            (Some(50.0), None),
            (Some(4.0), Some(300.0)),
        ]);
        assert_eq!(mean, Some(3.5));
    }

    #[test]
    fn test_two_group_aggregation_matches_hand_computation() {
        let rows = vec![
            row("Benešov", "Středočeský kraj", Some(1.0), Some(100.0)),
            row("Benešov", "Středočeský kraj", Some(3.0), Some(300.0)),
            row("Zlín", "Zlínský kraj", Some(2.0), Some(50.0)),
            row("Zlín", "Zlínský kraj", Some(4.0), Some(150.0)),
            row("Zlín", "Zlínský kraj", Some(9.0), None),
        ];
        let out = aggregate(&rows, Level::District);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].group, "Benešov");
        // (1·100 + 3·300) / 400
        assert!((out[0].radon_average.unwrap() - 2.5).abs() < 1e-12);
        assert_eq!(out[1].group, "Zlín");
        // (2·50 + 4·150) / 200
        assert!((out[1].radon_average.unwrap() - 3.5).abs() < 1e-12);
        assert!(out.iter().all(|r| r.incidence.is_none() && r.pm.is_none()));
    }

    #[test]
    fn test_region_level_groups_across_districts() {
        let rows = vec![
            row("Benešov", "Středočeský kraj", Some(1.0), Some(100.0)),
            row("Kladno", "Středočeský kraj", Some(3.0), Some(100.0)),
        ];
        let out = aggregate(&rows, Level::Region);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].radon_average, Some(2.0));
    }

    #[test]
    fn test_rows_without_group_key_are_dropped_and_empty_groups_stay_missing() {
        let mut orphan = row("x", "y", Some(1.0), Some(1.0));
        orphan.okres = None;
        let rows = vec![orphan, row("Tachov", "Plzeňský kraj", Some(2.0), None)];
        let out = aggregate(&rows, Level::District);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].group, "Tachov");
        assert_eq!(out[0].radon_average, None);
    }

    #[test]
    fn test_results_file_layout_per_level() {
        let dir = tempfile::tempdir().unwrap();
        let mut region = AggregateRow::new("Zlínský kraj", Some(2.0));
        region.incidence = Some(61.5);
        let district = AggregateRow::new("Zlín", None);

        let kraj_path = dir.path().join("results_kraj.csv");
        write_results(&kraj_path, &[region], Level::Region).unwrap();
        assert_eq!(
            std::fs::read_to_string(&kraj_path).unwrap(),
            "kraj,radon_average,vyskyt,pm\nZlínský kraj,2,61.5,\n"
        );

        let okres_path = dir.path().join("weighted_okres.csv");
        write_weighted(&okres_path, &[district], Level::District).unwrap();
        assert_eq!(
            std::fs::read_to_string(&okres_path).unwrap(),
            "okres,radon_average\nZlín,\n"
        );
    }
}
