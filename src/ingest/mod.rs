/// Data ingestion for the radon pipeline.
///
/// Submodules:
/// - `geology`: windowed ArcGIS queries for the radon index layer.
/// - `archive`: MessagePack persistence of the raw fetch result.
/// - `census`: SLDB 2021 population per settlement part.
/// - `lookups`: municipality → district → region relations.
/// - `spreadsheet`: NOR incidence and air-quality workbooks.

pub mod archive;
pub mod census;
pub mod geology;
pub mod lookups;
pub mod spreadsheet;
