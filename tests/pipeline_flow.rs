/// Offline end-to-end run of the file-based stages.
///
/// The geology service is replaced by an in-memory feature source; the
/// census and lookup tables are small CSV fixtures written to a temp dir.
/// Incidence and air-quality workbooks are deliberately absent, which the
/// aggregate stage must survive by leaving those columns empty.
///
/// Run with: cargo test --test pipeline_flow

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use radon_incidence::analysis::stats::NumericFrame;
use radon_incidence::analysis::table::read_table;
use radon_incidence::config::PipelineConfig;
use radon_incidence::ingest::archive::load_archive;
use radon_incidence::ingest::geology::{
    FeatureCollection, FeatureSource, QueryWindow, parse_feature_collection,
};
use radon_incidence::model::{FetchError, Level};
use radon_incidence::pipeline;

// ---------------------------------------------------------------------------
// Test Helpers
// ---------------------------------------------------------------------------

/// Canned responses keyed by the window's lower bound; unknown windows 500.
struct StubSource {
    bodies: HashMap<u32, &'static str>,
}

impl FeatureSource for StubSource {
    fn fetch_window(&self, window: QueryWindow) -> Result<FeatureCollection, FetchError> {
        match self.bodies.get(&window.lower) {
            Some(body) => parse_feature_collection(body),
            None => Err(FetchError::Http(500)),
        }
    }
}

fn stub_source() -> StubSource {
    let mut bodies = HashMap::new();
    bodies.insert(
        0,
        r#"{"features": [
            {"attributes": {"objectid": 1, "kod_cast": 10001, "kod_obec": 529303, "radon": 2}},
            {"attributes": {"objectid": 2, "kod_cast": "10002", "kod_obec": "529303", "radon": "4"}}
        ]}"#,
    );
    // Window 1000..2000 is left out and fails.
    bodies.insert(
        2000,
        r#"{"features": [
            {"attributes": {"objectid": 2001, "kod_cast": 10003, "kod_obec": 554782, "radon": 1.0}},
            {"attributes": {"objectid": 2002, "kod_cast": null, "kod_obec": 554782, "radon": 3.0}}
        ]}"#,
    );
    StubSource { bodies }
}

const CENSUS: &str = "\
uzemi_typ,ukaz_txt,uzemi_kod,hodnota
část obce,Počet obyvatel s obvyklým pobytem,10001,100
část obce,Počet obyvatel s obvyklým pobytem,10002,300
část obce,Počet obyvatel s obvyklým pobytem,10003,50
obec,Počet obyvatel s obvyklým pobytem,529303,400
";

const DISTRICTS: &str = "\
kodjaz,akcjaz,typvaz,akcvaz,chodnota1,text1,chodnota2,text2
CS,43,VAZ,101,529303,Benešov,3201,Benešov
CS,43,VAZ,101,554782,Praha,3100,Praha
";

const REGIONS: &str = "\
Kod_okresu;Nazev_okresu;Kod_kraje;Nazev_kraje
CZ0201;Benešov;CZ020;Středočeský kraj
CZ0100;Hlavní město Praha;CZ010;Hlavní město Praha
";

fn test_config(dir: &Path) -> PipelineConfig {
    let inputs = dir.join("inputs");
    fs::create_dir_all(&inputs).unwrap();
    fs::write(inputs.join("census.csv"), CENSUS).unwrap();
    fs::write(inputs.join("districts.csv"), DISTRICTS).unwrap();
    fs::write(inputs.join("regions.csv"), REGIONS).unwrap();

    let mut cfg = PipelineConfig::default();
    cfg.source.window_count = 3;
    cfg.inputs.census_csv = inputs.join("census.csv");
    cfg.inputs.district_csv = inputs.join("districts.csv");
    cfg.inputs.region_csv = inputs.join("regions.csv");
    cfg.inputs.district_incidence_xlsx = inputs.join("missing-okresy.xlsx");
    cfg.inputs.region_incidence_xlsx = inputs.join("missing-kraje.xlsx");
    cfg.inputs.air_quality_xlsx = inputs.join("missing-ovzdusi.xlsx");
    cfg.outputs.dir = dir.join("out");
    cfg
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[test]
fn test_failed_window_is_skipped_and_archive_stays_parallel() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = test_config(dir.path());

    let summary = pipeline::run_fetch_with(&stub_source(), &cfg).unwrap();
    assert_eq!(summary.windows, 3);
    assert_eq!(summary.succeeded, 2);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.features, 4);

    let archive = load_archive(&cfg.outputs.archive_path()).unwrap();
    assert_eq!(archive.len(), 4);
    assert_eq!(archive.municipality_codes.len(), 4);
    assert_eq!(archive.radon_indices.len(), 4);
    assert_eq!(archive.settlement_codes[3], None);
    assert_eq!(archive.radon_indices[1], Some(4.0));
}

#[test]
fn test_enrich_joins_population_district_and_region() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = test_config(dir.path());
    pipeline::run_fetch_with(&stub_source(), &cfg).unwrap();

    assert_eq!(pipeline::run_enrich(&cfg).unwrap(), 4);
    let rows = read_table(&cfg.outputs.table_path()).unwrap();

    assert_eq!(rows[0].kod_cast.as_deref(), Some("10001"));
    assert_eq!(rows[0].populace, Some(100.0));
    assert_eq!(rows[0].okres.as_deref(), Some("Benešov"));
    assert_eq!(rows[0].kraj.as_deref(), Some("Středočeský kraj"));

    // "Praha" is rewritten before the region lookup.
    assert_eq!(rows[2].okres.as_deref(), Some("Hlavní město Praha"));
    assert_eq!(rows[2].kraj.as_deref(), Some("Hlavní město Praha"));

    // No settlement code, so no population; the district still resolves.
    assert_eq!(rows[3].populace, None);
    assert_eq!(rows[3].okres.as_deref(), Some("Hlavní město Praha"));
}

#[test]
fn test_aggregate_weights_by_population_without_workbooks() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = test_config(dir.path());
    pipeline::run_fetch_with(&stub_source(), &cfg).unwrap();
    pipeline::run_enrich(&cfg).unwrap();

    pipeline::run_aggregate(&cfg).unwrap();

    let districts = NumericFrame::from_csv(
        &cfg.outputs.results_path(Level::District),
        &["radon_average", "vyskyt"],
    )
    .unwrap();
    // Benešov: (2·100 + 4·300) / 400; Praha: only the populated row counts.
    assert_eq!(districts.column("radon_average").unwrap(), &[Some(3.5), Some(1.0)]);
    assert_eq!(districts.column("vyskyt").unwrap(), &[None, None]);

    let regions = NumericFrame::from_csv(
        &cfg.outputs.results_path(Level::Region),
        &["radon_average", "vyskyt", "pm"],
    )
    .unwrap();
    assert_eq!(regions.column("radon_average").unwrap(), &[Some(1.0), Some(3.5)]);
    assert_eq!(regions.column("pm").unwrap(), &[None, None]);

    assert!(cfg.outputs.weighted_path(Level::District).exists());
    assert!(cfg.outputs.weighted_path(Level::Region).exists());
}

#[test]
fn test_analysis_stages_tolerate_missing_incidence() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = test_config(dir.path());
    pipeline::run_fetch_with(&stub_source(), &cfg).unwrap();
    pipeline::run_enrich(&cfg).unwrap();
    pipeline::run_aggregate(&cfg).unwrap();

    // Missing values suppress the summary and regressions but are not errors.
    pipeline::run_analyze(&cfg).unwrap();
    pipeline::run_visualize(&cfg).unwrap();
    assert!(!cfg.outputs.plot_stem(Level::District, "radon_average").with_extension("png").exists());
}

#[test]
fn test_enrich_without_archive_fails() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = test_config(dir.path());
    assert!(pipeline::run_enrich(&cfg).is_err());
}

#[test]
fn test_complete_results_are_summarised_and_fitted() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = test_config(dir.path());
    fs::create_dir_all(&cfg.outputs.dir).unwrap();
    fs::write(
        cfg.outputs.results_path(Level::District),
        "okres,radon_average,vyskyt\nBenešov,2.1,71.0\nKladno,1.4,64.5\nTachov,2.9,80.2\nZlín,1.8,66.0\n",
    )
    .unwrap();
    fs::write(
        cfg.outputs.results_path(Level::Region),
        "kraj,radon_average,vyskyt,pm\nA,2.0,70.0,20.1\nB,1.5,60.0,18.4\nC,2.5,75.0,24.9\n",
    )
    .unwrap();

    pipeline::run_analyze(&cfg).unwrap();
    pipeline::run_visualize(&cfg).unwrap();

    for (level, x) in [
        (Level::District, "radon_average"),
        (Level::Region, "radon_average"),
        (Level::Region, "pm"),
    ] {
        let stem = cfg.outputs.plot_stem(level, x);
        assert!(stem.with_extension("png").exists(), "missing {}.png", stem.display());
        assert!(stem.with_extension("svg").exists(), "missing {}.svg", stem.display());
    }
    assert!(!cfg.outputs.plot_stem(Level::District, "pm").with_extension("png").exists());
}
