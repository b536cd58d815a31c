//! Administrative lookups: municipality → district → region.
//!
//! Both reference tables are small CSV code lists published by the Czech
//! Statistical Office. Matching is exact and the first row wins when a key
//! repeats; a key with no row yields `None` rather than an error.

use std::borrow::Cow;
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use crate::logging::{self, Stage};
use crate::model::{PipelineError, normalize_code};

/// District names in the municipality relation that are spelled differently
/// in the district list and the incidence extracts.
pub const DISTRICT_NAME_REWRITES: [(&str, &str); 2] = [
    ("Praha", "Hlavní město Praha"),
    ("Rychnov nad Kněžnou", "Rychnov n.Kněžnou"),
];

/// Apply the literal district-name rewrites. Only exact spellings change.
pub fn rewrite_district_name(name: &str) -> Cow<'_, str> {
    DISTRICT_NAME_REWRITES
        .iter()
        .find(|(from, _)| *from == name)
        .map_or(Cow::Borrowed(name), |(_, to)| Cow::Owned((*to).to_string()))
}

/// Reads `key_column → value_column` from a delimited file, first row wins.
///
/// A blank value still claims its key, so a later row cannot fill it in.
fn read_pairs<R: Read>(
    reader: R,
    delimiter: u8,
    file: &str,
    key_column: &str,
    value_column: &str,
    normalize_key: bool,
) -> Result<HashMap<String, String>, PipelineError> {
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(reader);

    let headers = rdr.headers()?.clone();
    let column = |name: &str| {
        headers
            .iter()
            .position(|h| h.trim() == name)
            .ok_or_else(|| PipelineError::MissingColumn {
                file: file.to_string(),
                column: name.to_string(),
            })
    };
    let key_idx = column(key_column)?;
    let value_idx = column(value_column)?;

    let mut pairs: HashMap<String, Option<String>> = HashMap::new();
    for record in rdr.records() {
        let record = record?;
        let (Some(raw_key), Some(value)) = (record.get(key_idx), record.get(value_idx)) else {
            continue;
        };
        let key = if normalize_key {
            normalize_code(raw_key)
        } else {
            Some(raw_key.to_string())
        };
        if let Some(key) = key {
            let value = value.trim();
            pairs
                .entry(key)
                .or_insert_with(|| (!value.is_empty()).then(|| value.to_string()));
        }
    }
    Ok(pairs
        .into_iter()
        .filter_map(|(k, v)| v.map(|v| (k, v)))
        .collect())
}

fn open(path: &Path) -> Result<std::fs::File, PipelineError> {
    Ok(std::fs::File::open(path)?)
}

fn log_misses(what: &str, out: &[Option<String>]) {
    let missing = out.iter().filter(|v| v.is_none()).count();
    if missing > 0 {
        logging::warn(
            Stage::Lookup,
            None,
            &format!("{} of {} {} lookups unmatched", missing, out.len(), what),
        );
    }
}

// ---------------------------------------------------------------------------
// Municipality → district
// ---------------------------------------------------------------------------

/// Municipality code (`chodnota1`) → district name (`text2`), from the
/// VAZ0043 relation.
#[derive(Debug, Default)]
pub struct DistrictTable {
    names: HashMap<String, String>,
}

impl DistrictTable {
    pub const KEY_COLUMN: &'static str = "chodnota1";
    pub const VALUE_COLUMN: &'static str = "text2";

    pub fn from_path(path: &Path) -> Result<Self, PipelineError> {
        let label = path.display().to_string();
        let table = Self::from_reader(open(path)?, &label)?;
        logging::info(
            Stage::Lookup,
            Some(&label),
            &format!("{} municipality → district pairs loaded", table.names.len()),
        );
        Ok(table)
    }

    pub fn from_reader<R: Read>(reader: R, file: &str) -> Result<Self, PipelineError> {
        let names = read_pairs(reader, b',', file, Self::KEY_COLUMN, Self::VALUE_COLUMN, true)?;
        Ok(DistrictTable { names })
    }

    /// Raw district name as spelled in the relation, no rewrites applied.
    pub fn raw_name(&self, municipality_code: &str) -> Option<&str> {
        normalize_code(municipality_code)
            .and_then(|code| self.names.get(&code))
            .map(String::as_str)
    }

    /// District name for a municipality, with the name rewrites applied.
    pub fn district_of(&self, municipality_code: &str) -> Option<String> {
        self.raw_name(municipality_code)
            .map(|name| rewrite_district_name(name).into_owned())
    }

    pub fn districts_for(&self, municipality_codes: &[Option<String>]) -> Vec<Option<String>> {
        let out: Vec<Option<String>> = municipality_codes
            .iter()
            .map(|code| code.as_deref().and_then(|c| self.district_of(c)))
            .collect();
        log_misses("district", &out);
        out
    }
}

// ---------------------------------------------------------------------------
// District → region
// ---------------------------------------------------------------------------

/// District name (`Nazev_okresu`) → region name (`Nazev_kraje`), from the
/// semicolon-delimited district list.
#[derive(Debug, Default)]
pub struct RegionTable {
    names: HashMap<String, String>,
}

impl RegionTable {
    pub const KEY_COLUMN: &'static str = "Nazev_okresu";
    pub const VALUE_COLUMN: &'static str = "Nazev_kraje";

    pub fn from_path(path: &Path) -> Result<Self, PipelineError> {
        let label = path.display().to_string();
        let table = Self::from_reader(open(path)?, &label)?;
        logging::info(
            Stage::Lookup,
            Some(&label),
            &format!("{} district → region pairs loaded", table.names.len()),
        );
        Ok(table)
    }

    pub fn from_reader<R: Read>(reader: R, file: &str) -> Result<Self, PipelineError> {
        let names = read_pairs(reader, b';', file, Self::KEY_COLUMN, Self::VALUE_COLUMN, false)?;
        Ok(RegionTable { names })
    }

    pub fn region_of(&self, district: &str) -> Option<String> {
        self.names.get(district).cloned()
    }

    pub fn regions_for(&self, districts: &[Option<String>]) -> Vec<Option<String>> {
        let out: Vec<Option<String>> = districts
            .iter()
            .map(|d| d.as_deref().and_then(|d| self.region_of(d)))
            .collect();
        log_misses("region", &out);
        out
    }
}
