/// Radon index vs. lung cancer incidence, Czech districts and regions.
///
/// Runs the whole pipeline once: fetch the radon layer, enrich it with
/// census and administrative lookups, aggregate, attach incidence and PM,
/// then print statistics and render regression plots.

use radon_incidence::config::{self, PipelineConfig};
use radon_incidence::logging::{self, Stage};
use radon_incidence::pipeline;

fn main() {
    let config_path = config::config_path_from_env();
    let (cfg, config_error) = match config::load_config(&config_path) {
        Ok(cfg) => (cfg, None),
        Err(e) => (PipelineConfig::default(), Some(e)),
    };

    logging::init_logger(
        cfg.logging.level,
        cfg.logging.file.as_deref(),
        cfg.logging.timestamps,
    );

    if let Some(e) = config_error {
        logging::error(
            Stage::System,
            Some(&config_path.display().to_string()),
            &format!("{}; continuing with defaults", e),
        );
    }
    logging::info(
        Stage::System,
        None,
        &format!("Starting radon pipeline, output in {}", cfg.outputs.dir.display()),
    );

    pipeline::run_all(&cfg);
}
