/// Population lookup from the 2021 census (SLDB) extract.
///
/// The extract is a long table: one row per (territory, indicator) pair.
/// Only rows describing parts of municipalities (`část obce`) and the
/// usual-residence headcount indicator are kept; `uzemi_kod` of those rows
/// is the settlement code carried by the radon features.

use serde::Deserialize;
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use crate::logging::{self, Stage};
use crate::model::{PipelineError, normalize_code};

/// Territory type of a part of a municipality.
pub const TERRITORY_SETTLEMENT: &str = "část obce";

/// Indicator label of the usual-residence population count.
pub const INDICATOR_RESIDENTS: &str = "Počet obyvatel s obvyklým pobytem";

#[derive(Debug, Deserialize)]
struct CensusRow {
    uzemi_typ: String,
    ukaz_txt: String,
    uzemi_kod: String,
    hodnota: Option<String>,
}

/// Settlement code → resident count.
#[derive(Debug, Default)]
pub struct PopulationTable {
    residents: HashMap<String, f64>,
}

impl PopulationTable {
    pub fn from_path(path: &Path) -> Result<Self, PipelineError> {
        let file = std::fs::File::open(path)?;
        let table = Self::from_reader(file)?;
        logging::info(
            Stage::Census,
            Some(&path.display().to_string()),
            &format!("{} settlement populations loaded", table.len()),
        );
        Ok(table)
    }

    /// Reads a comma-delimited census extract with a header row.
    ///
    /// When a code appears more than once the first row wins.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, PipelineError> {
        let mut rdr = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
        let mut residents: HashMap<String, Option<f64>> = HashMap::new();

        for result in rdr.deserialize::<CensusRow>() {
            let row = result?;
            if row.uzemi_typ != TERRITORY_SETTLEMENT || row.ukaz_txt != INDICATOR_RESIDENTS {
                continue;
            }
            let Some(code) = normalize_code(&row.uzemi_kod) else {
                continue;
            };
            // A blank or non-numeric count stays missing but still claims the code.
            let value = row
                .hodnota
                .as_deref()
                .and_then(|v| v.trim().parse::<f64>().ok());
            residents.entry(code).or_insert(value);
        }

        Ok(PopulationTable {
            residents: residents
                .into_iter()
                .filter_map(|(k, v)| v.map(|v| (k, v)))
                .collect(),
        })
    }

    pub fn len(&self) -> usize {
        self.residents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.residents.is_empty()
    }

    pub fn get(&self, settlement_code: &str) -> Option<f64> {
        normalize_code(settlement_code).and_then(|code| self.residents.get(&code).copied())
    }

    /// Looks up every code in order; unknown or absent codes map to `None`.
    pub fn population_for(&self, settlement_codes: &[Option<String>]) -> Vec<Option<f64>> {
        let out: Vec<Option<f64>> = settlement_codes
            .iter()
            .map(|code| code.as_deref().and_then(|c| self.get(c)))
            .collect();

        let missing = out.iter().filter(|p| p.is_none()).count();
        if missing > 0 {
            logging::warn(
                Stage::Census,
                None,
                &format!("{} of {} settlements without population", missing, out.len()),
            );
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXTRACT: &str = "\
idhod,hodnota,ukaz_kod,ukaz_txt,uzemi_kod,uzemi_txt,uzemi_typ
1,812,3162,Počet obyvatel s obvyklým pobytem,400190,Benešov,část obce
2,97,3162,Počet obyvatel s obvyklým pobytem,400203,Bedrč,část obce
3,5000,3162,Počet obyvatel s obvyklým pobytem,529303,Benešov,obec
4,340,3170,Počet bytů,400190,Benešov,část obce
5,999,3162,Počet obyvatel s obvyklým pobytem,400190,Benešov duplicate,část obce
6,,3162,Počet obyvatel s obvyklým pobytem,400211,Boušice,část obce
";

    fn table() -> PopulationTable {
        PopulationTable::from_reader(EXTRACT.as_bytes()).unwrap()
    }

    #[test]
    fn test_only_settlement_resident_rows_are_kept() {
        let t = table();
        assert_eq!(t.get("400203"), Some(97.0));
        // Municipality-level row with the same indicator is ignored.
        assert_eq!(t.get("529303"), None);
    }

    #[test]
    fn test_first_match_wins_on_duplicate_codes() {
        assert_eq!(table().get("400190"), Some(812.0));
    }

    #[test]
    fn test_blank_count_is_missing() {
        assert_eq!(table().get("400211"), None);
    }

    #[test]
    fn test_blank_first_count_claims_the_code() {
        let csv = "\
uzemi_typ,ukaz_txt,uzemi_kod,hodnota
část obce,Počet obyvatel s obvyklým pobytem,400211,
část obce,Počet obyvatel s obvyklým pobytem,400211,55
";
        let t = PopulationTable::from_reader(csv.as_bytes()).unwrap();
        assert_eq!(t.get("400211"), None);
    }

    #[test]
    fn test_population_for_preserves_order_and_missing() {
        let codes = vec![
            Some("400203".to_string()),
            None,
            Some("123".to_string()),
            Some("400190.0".to_string()),
        ];
        assert_eq!(
            table().population_for(&codes),
            vec![Some(97.0), None, None, Some(812.0)]
        );
    }

    #[test]
    fn test_missing_column_is_an_error() {
        let bad = "uzemi_kod,hodnota\n1,2\n";
        assert!(PopulationTable::from_reader(bad.as_bytes()).is_err());
    }
}
