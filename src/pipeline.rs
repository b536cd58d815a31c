//! Stage orchestration.
//!
//! Each `run_*` function reads the previous stage's output file, does its
//! work, and writes its own output, so any stage can be re-run on its own.
//! `run_all` executes the fixed sequence and keeps going after a failed
//! stage; later stages then work from whatever files already exist.

use std::fs;
use std::time::Duration;

use crate::analysis::aggregate::{self, COL_INCIDENCE, COL_PM, COL_RADON_AVERAGE};
use crate::analysis::regression::{linear_regression, paired_observations};
use crate::analysis::stats::{NumericFrame, format_summary, missing_report, summarize};
use crate::analysis::{analysis_columns, exposure_columns, table};
use crate::config::PipelineConfig;
use crate::ingest::archive::{load_archive, save_archive};
use crate::ingest::census::PopulationTable;
use crate::ingest::geology::{FeatureSource, FetchSummary, GeologyClient, fetch_radon_archive, query_windows};
use crate::ingest::lookups::{DistrictTable, RegionTable};
use crate::ingest::spreadsheet::{self, IncidenceQuery, NOR_LAYOUT};
use crate::logging::{self, Stage};
use crate::model::{JoinedRow, Level, PipelineError, RadonArchive};
use crate::plot::{PlotLabels, render_regression};

fn ensure_output_dir(cfg: &PipelineConfig) -> Result<(), PipelineError> {
    fs::create_dir_all(&cfg.outputs.dir)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Stage 1: fetch
// ---------------------------------------------------------------------------

/// Fetch from the live geology service and persist the archive.
pub fn run_fetch(cfg: &PipelineConfig) -> Result<FetchSummary, PipelineError> {
    let client = GeologyClient::new(
        &cfg.source.endpoint,
        Duration::from_secs(cfg.source.timeout_secs),
    )
    .map_err(|e| PipelineError::Config(format!("cannot build HTTP client: {}", e)))?;
    run_fetch_with(&client, cfg)
}

/// Fetch through any feature source and persist the archive.
pub fn run_fetch_with(
    source: &dyn FeatureSource,
    cfg: &PipelineConfig,
) -> Result<FetchSummary, PipelineError> {
    let windows = query_windows(cfg.source.window_count, cfg.source.window_size);
    let (archive, summary) = fetch_radon_archive(source, &windows);

    ensure_output_dir(cfg)?;
    let path = cfg.outputs.archive_path();
    save_archive(&path, &archive)?;
    logging::info(
        Stage::Fetch,
        Some(&path.display().to_string()),
        &format!("{} features archived", archive.len()),
    );
    Ok(summary)
}

// ---------------------------------------------------------------------------
// Stage 2 + 3: enrich and assemble
// ---------------------------------------------------------------------------

/// Joins the archive with the three lookups into flat rows.
pub fn enrich_archive(
    archive: &RadonArchive,
    population: &PopulationTable,
    districts: &DistrictTable,
    regions: &RegionTable,
) -> Result<Vec<JoinedRow>, PipelineError> {
    let populace = population.population_for(&archive.settlement_codes);
    let okresy = districts.districts_for(&archive.municipality_codes);
    let kraje = regions.regions_for(&okresy);

    table::assemble_table(
        &archive.settlement_codes,
        &archive.municipality_codes,
        &archive.radon_indices,
        &populace,
        &okresy,
        &kraje,
    )
}

/// Load the archive and reference tables, join, and write `table.csv`.
pub fn run_enrich(cfg: &PipelineConfig) -> Result<usize, PipelineError> {
    let archive = load_archive(&cfg.outputs.archive_path())?;
    let population = PopulationTable::from_path(&cfg.inputs.census_csv)?;
    let districts = DistrictTable::from_path(&cfg.inputs.district_csv)?;
    let regions = RegionTable::from_path(&cfg.inputs.region_csv)?;

    let rows = enrich_archive(&archive, &population, &districts, &regions)?;

    ensure_output_dir(cfg)?;
    let path = cfg.outputs.table_path();
    table::write_table(&path, &rows)?;
    logging::info(
        Stage::Lookup,
        Some(&path.display().to_string()),
        &format!("{} joined rows written", rows.len()),
    );
    Ok(rows.len())
}

// ---------------------------------------------------------------------------
// Stage 4: aggregate and attach external statistics
// ---------------------------------------------------------------------------

/// Group the joined table per level, attach incidence (and PM for regions),
/// and write both the weighted and the result tables.
///
/// An unreadable workbook only leaves its column missing.
pub fn run_aggregate(cfg: &PipelineConfig) -> Result<(), PipelineError> {
    let rows = table::read_table(&cfg.outputs.table_path())?;
    ensure_output_dir(cfg)?;

    for level in Level::ALL {
        let mut groups = aggregate::aggregate(&rows, level);
        aggregate::write_weighted(&cfg.outputs.weighted_path(level), &groups, level)?;
        logging::info(
            Stage::Aggregate,
            Some(&level.to_string()),
            &format!("{} groups aggregated", groups.len()),
        );

        let workbook = cfg.inputs.incidence_for(level);
        match spreadsheet::load_sheet(workbook, None) {
            Ok(sheet) => {
                let query = IncidenceQuery {
                    period: &cfg.incidence.period,
                    diagnosis: &cfg.incidence.diagnosis,
                    rows: cfg.incidence.rows_for(level),
                    layout: NOR_LAYOUT,
                };
                let attached = spreadsheet::attach_incidence(&sheet, &query, &mut groups);
                logging::info(
                    Stage::Spreadsheet,
                    Some(&level.to_string()),
                    &format!("{} incidence rows attached", attached),
                );
            }
            Err(e) => logging::error(
                Stage::Spreadsheet,
                Some(&workbook.display().to_string()),
                &e.to_string(),
            ),
        }

        if level.has_particulates() {
            let workbook = &cfg.inputs.air_quality_xlsx;
            match spreadsheet::load_sheet(workbook, cfg.inputs.air_quality_sheet.as_deref()) {
                Ok(sheet) => {
                    let attached = spreadsheet::attach_particulates(&sheet, &mut groups);
                    logging::info(
                        Stage::Spreadsheet,
                        Some(&level.to_string()),
                        &format!("{} PM readings attached", attached),
                    );
                }
                Err(e) => logging::error(
                    Stage::Spreadsheet,
                    Some(&workbook.display().to_string()),
                    &e.to_string(),
                ),
            }
        }

        aggregate::write_results(&cfg.outputs.results_path(level), &groups, level)?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Stage 5: statistical summary
// ---------------------------------------------------------------------------

/// Print the missing-value report and, when complete, the summary and
/// correlation matrix of every level.
pub fn run_analyze(cfg: &PipelineConfig) -> Result<(), PipelineError> {
    for level in Level::ALL {
        let path = cfg.outputs.results_path(level);
        let frame = NumericFrame::from_csv(&path, &analysis_columns(level))?;

        println!("\n── {} level ({} rows) ──", level, frame.len());
        for (column, has_missing) in missing_report(&frame) {
            println!("Missing values in '{}': {}", column, has_missing);
        }

        match summarize(&frame) {
            Ok(summary) => print!("{}", format_summary(&summary)),
            Err(e) => {
                println!("{}", e);
                logging::warn(Stage::Analysis, Some(&level.to_string()), &e.to_string());
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Stage 6: regression and plots
// ---------------------------------------------------------------------------

/// Fit incidence against each exposure column, print the fit and render it.
pub fn run_visualize(cfg: &PipelineConfig) -> Result<(), PipelineError> {
    for level in Level::ALL {
        let path = cfg.outputs.results_path(level);
        let frame = NumericFrame::from_csv(&path, &analysis_columns(level))?;

        for &x_column in exposure_columns(level) {
            let key = format!("{} {}", level, x_column);
            let (xs, ys) = paired_observations(&frame, x_column, COL_INCIDENCE);
            if xs.len() < frame.len() {
                logging::warn(
                    Stage::Analysis,
                    Some(&key),
                    &format!("{} of {} rows incomplete, skipped", frame.len() - xs.len(), frame.len()),
                );
            }

            let fit = match linear_regression(&xs, &ys) {
                Ok(fit) => fit,
                Err(e) => {
                    logging::warn(Stage::Analysis, Some(&key), &e.to_string());
                    continue;
                }
            };
            println!(
                "{}: {} ~ {}  slope={:.6} intercept={:.6} r={:.4} p={:.6} (n={})",
                level, COL_INCIDENCE, x_column, fit.slope, fit.intercept, fit.r_value, fit.p_value, fit.n
            );

            let labels = PlotLabels {
                title: format!("{}: incidence vs {}", level, x_column),
                x: match x_column {
                    COL_PM => "PM".to_string(),
                    COL_RADON_AVERAGE => "population-weighted radon index".to_string(),
                    other => other.to_string(),
                },
                y: "incidence per 100,000".to_string(),
            };
            let stem = cfg.outputs.plot_stem(level, x_column);
            if let Err(e) = render_regression(&stem, &xs, &ys, &fit, &labels)
                .map_err(|e| PipelineError::Plot(e.to_string()))
            {
                logging::error(Stage::Plot, Some(&key), &e.to_string());
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Whole run
// ---------------------------------------------------------------------------

fn report(stage: Stage, name: &str, result: Result<(), PipelineError>) -> bool {
    match result {
        Ok(()) => true,
        Err(e) => {
            logging::error(stage, None, &format!("{} stage failed: {}", name, e));
            false
        }
    }
}

/// Run every stage in order. Returns the number of stages that failed.
pub fn run_all(cfg: &PipelineConfig) -> usize {
    let mut outcomes = Vec::new();

    if cfg.stages.skip_fetch {
        logging::info(Stage::System, None, "Reusing existing archive, fetch skipped");
    } else {
        outcomes.push(report(Stage::Fetch, "fetch", run_fetch(cfg).map(|_| ())));
    }
    outcomes.push(report(Stage::Lookup, "enrich", run_enrich(cfg).map(|_| ())));
    outcomes.push(report(Stage::Aggregate, "aggregate", run_aggregate(cfg)));
    outcomes.push(report(Stage::Analysis, "analyze", run_analyze(cfg)));
    outcomes.push(report(Stage::Plot, "visualize", run_visualize(cfg)));

    let failed = outcomes.iter().filter(|ok| !**ok).count();
    logging::log_stage_summary(Stage::System, "Pipeline", outcomes.len(), outcomes.len() - failed, failed);
    failed
}
