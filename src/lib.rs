pub mod analysis;
pub mod config;
pub mod ingest;
pub mod logging;
pub mod model;
pub mod pipeline;
pub mod plot;
pub mod regions;
