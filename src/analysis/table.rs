//! Flat joined table: one row per fetched feature.
//!
//! This table is the hand-off point between the fetch/enrich stages and the
//! aggregation stage, persisted as `table.csv`.

use std::path::Path;

use crate::model::{JoinedRow, PipelineError};

/// Zips the parallel sequences into rows.
///
/// All six sequences must have the same length; a mismatch means an earlier
/// stage dropped or duplicated entries and is fatal.
pub fn assemble_table(
    settlement_codes: &[Option<String>],
    municipality_codes: &[Option<String>],
    radon: &[Option<f64>],
    population: &[Option<f64>],
    districts: &[Option<String>],
    regions: &[Option<String>],
) -> Result<Vec<JoinedRow>, PipelineError> {
    let n = settlement_codes.len();
    let lengths = [
        ("settlement codes", settlement_codes.len()),
        ("municipality codes", municipality_codes.len()),
        ("radon", radon.len()),
        ("population", population.len()),
        ("districts", districts.len()),
        ("regions", regions.len()),
    ];
    if let Some((name, len)) = lengths.iter().find(|(_, len)| *len != n) {
        return Err(PipelineError::LengthMismatch(format!(
            "{} has {} entries, expected {}",
            name, len, n
        )));
    }

    Ok((0..n)
        .map(|i| JoinedRow {
            kod_cast: settlement_codes[i].clone(),
            kod_obec: municipality_codes[i].clone(),
            radon: radon[i],
            populace: population[i],
            okres: districts[i].clone(),
            kraj: regions[i].clone(),
        })
        .collect())
}

pub fn write_table(path: &Path, rows: &[JoinedRow]) -> Result<(), PipelineError> {
    let mut wtr = csv::Writer::from_path(path)?;
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn read_table(path: &Path) -> Result<Vec<JoinedRow>, PipelineError> {
    let mut rdr = csv::Reader::from_path(path)?;
    let mut rows = Vec::new();
    for result in rdr.deserialize::<JoinedRow>() {
        rows.push(result?);
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn s(v: &str) -> Option<String> {
        Some(v.to_string())
    }

    #[test]
    fn test_assemble_zips_in_order() {
        let rows = assemble_table(
            &[s("1"), s("2")],
            &[s("10"), None],
            &[Some(1.0), None],
            &[Some(100.0), Some(5.0)],
            &[s("Benešov"), None],
            &[s("Středočeský kraj"), None],
        )
        .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].kod_cast.as_deref(), Some("1"));
        assert_eq!(rows[0].okres.as_deref(), Some("Benešov"));
        assert_eq!(rows[1].radon, None);
        assert_eq!(rows[1].populace, Some(5.0));
    }

    #[test]
    fn test_length_mismatch_is_fatal() {
        let err = assemble_table(
            &[s("1"), s("2")],
            &[s("10"), s("20")],
            &[Some(1.0), Some(2.0)],
            &[Some(100.0)],
            &[None, None],
            &[None, None],
        )
        .unwrap_err();
        assert!(matches!(err, PipelineError::LengthMismatch(ref m) if m.contains("population")));
    }

    #[test]
    fn test_missing_values_survive_the_csv_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("table.csv");
        let rows = vec![
            JoinedRow {
                kod_cast: s("400190"),
                kod_obec: s("529303"),
                radon: Some(2.0),
                populace: Some(812.0),
                okres: s("Benešov"),
                kraj: s("Středočeský kraj"),
            },
            JoinedRow::default(),
        ];
        write_table(&path, &rows).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("kod_cast,kod_obec,radon,populace,okres,kraj"));

        assert_eq!(read_table(&path).unwrap(), rows);
    }
}
