//! Pipeline configuration.
//!
//! Loaded from a TOML file (`radon.toml` by default, or the path in the
//! `RADON_CONFIG` environment variable / `.env`). Every field has a default
//! matching the published datasets, so a missing file runs the stock
//! pipeline.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::model::{Level, PipelineError};

pub const DEFAULT_CONFIG_FILE: &str = "radon.toml";
pub const CONFIG_ENV_VAR: &str = "RADON_CONFIG";

/// ArcGIS query endpoint of the radon layer in the geohazard map service.
pub const GEOLOGY_QUERY_URL: &str =
    "https://mapy.geology.cz/arcgis/rest/services/Geohazardy/radon_komplexni_informace/MapServer/0/query";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub source: SourceConfig,
    pub inputs: InputPaths,
    pub outputs: OutputPaths,
    pub incidence: IncidenceConfig,
    pub logging: LoggingConfig,
    pub stages: StageConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub endpoint: String,
    /// Number of object-id windows requested.
    pub window_count: u32,
    /// Width of each object-id window.
    pub window_size: u32,
    pub timeout_secs: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        SourceConfig {
            endpoint: GEOLOGY_QUERY_URL.to_string(),
            window_count: 16,
            window_size: 1000,
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InputPaths {
    /// SLDB 2021 census extract (population per settlement part).
    pub census_csv: PathBuf,
    /// VAZ0043 municipality → district relation.
    pub district_csv: PathBuf,
    /// District → region list, semicolon-delimited.
    pub region_csv: PathBuf,
    pub district_incidence_xlsx: PathBuf,
    pub region_incidence_xlsx: PathBuf,
    pub air_quality_xlsx: PathBuf,
    /// Worksheet holding the PM cells; first sheet when unset.
    pub air_quality_sheet: Option<String>,
}

impl Default for InputPaths {
    fn default() -> Self {
        InputPaths {
            census_csv: "sldb2021_obyv_byt_cob_zsj.csv".into(),
            district_csv: "VAZ0043_0101_CS.csv".into(),
            region_csv: "CiselnikOkresu_mod.csv".into(),
            district_incidence_xlsx: "nor-ds-okresy-incidence-10lete.xlsx".into(),
            region_incidence_xlsx: "nor-ds-kraje-incidence-10lete.xlsx".into(),
            air_quality_xlsx: "ovzdusi-kraje.xlsx".into(),
            air_quality_sheet: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputPaths {
    pub dir: PathBuf,
    pub archive: String,
    pub table: String,
}

impl Default for OutputPaths {
    fn default() -> Self {
        OutputPaths {
            dir: ".".into(),
            archive: "radondata.msgpack".to_string(),
            table: "table.csv".to_string(),
        }
    }
}

impl OutputPaths {
    pub fn archive_path(&self) -> PathBuf {
        self.dir.join(&self.archive)
    }

    pub fn table_path(&self) -> PathBuf {
        self.dir.join(&self.table)
    }

    /// Weighted-average table before external statistics are attached.
    pub fn weighted_path(&self, level: Level) -> PathBuf {
        self.dir.join(format!("weighted_{}.csv", level.key_column()))
    }

    pub fn results_path(&self, level: Level) -> PathBuf {
        self.dir.join(format!("results_{}.csv", level.key_column()))
    }

    /// Stem (no extension) of the plot of `y_column` against `x_column`.
    pub fn plot_stem(&self, level: Level, x_column: &str) -> PathBuf {
        self.dir
            .join(format!("regression_{}_{}", level.key_column(), x_column))
    }
}

/// Half-open range of spreadsheet data rows (header excluded).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct RowRange {
    pub start: usize,
    /// Exclusive end; `None` runs to the last row of the sheet.
    pub end: Option<usize>,
}

impl RowRange {
    pub const WHOLE_SHEET: RowRange = RowRange { start: 0, end: None };

    /// Clamps the range to a sheet with `height` data rows.
    pub fn clamp(self, height: usize) -> std::ops::Range<usize> {
        let end = self.end.map_or(height, |e| e.min(height));
        let start = self.start.min(end);
        start..end
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IncidenceConfig {
    /// Ten-year period label as printed in the NOR extract (en dash).
    pub period: String,
    /// Diagnosis group label.
    pub diagnosis: String,
    pub district_rows: RowRange,
    pub region_rows: RowRange,
}

impl Default for IncidenceConfig {
    fn default() -> Self {
        IncidenceConfig {
            period: "2017–2021".to_string(),
            diagnosis: "ZN průdušnice, průdušky a plíce (C33, C34)".to_string(),
            district_rows: RowRange {
                start: 37275,
                end: Some(46590),
            },
            region_rows: RowRange::WHOLE_SHEET,
        }
    }
}

impl IncidenceConfig {
    pub fn rows_for(&self, level: Level) -> RowRange {
        match level {
            Level::District => self.district_rows,
            Level::Region => self.region_rows,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: crate::logging::LogLevel,
    pub file: Option<String>,
    pub timestamps: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: crate::logging::LogLevel::Info,
            file: None,
            timestamps: false,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StageConfig {
    /// Reuse an existing archive instead of querying the service.
    pub skip_fetch: bool,
}

impl InputPaths {
    pub fn incidence_for(&self, level: Level) -> &Path {
        match level {
            Level::District => &self.district_incidence_xlsx,
            Level::Region => &self.region_incidence_xlsx,
        }
    }
}

/// Parses a configuration document.
pub fn parse_config(text: &str) -> Result<PipelineConfig, PipelineError> {
    Ok(toml::from_str(text)?)
}

/// Loads the configuration at `path`, falling back to defaults when the
/// file does not exist.
pub fn load_config(path: &Path) -> Result<PipelineConfig, PipelineError> {
    if !path.exists() {
        return Ok(PipelineConfig::default());
    }
    let text = std::fs::read_to_string(path)?;
    parse_config(&text)
}

/// Resolves the configuration file path from `.env` / the environment.
pub fn config_path_from_env() -> PathBuf {
    dotenv::dotenv().ok();
    std::env::var(CONFIG_ENV_VAR)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_FILE))
}
