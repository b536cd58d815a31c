/// Czech Geological Survey radon layer client
///
/// Retrieves the radon-index features from the ArcGIS REST service behind
/// the geohazard map (mapy.geology.cz). The layer is paged by object id:
/// each request asks for one fixed window of ids, attributes only.
///
/// Service: https://mapy.geology.cz/arcgis/rest/services/Geohazardy/radon_komplexni_informace/MapServer/0

use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use std::time::Duration;

use crate::logging::{self, Stage};
use crate::model::{
    ATTR_MUNICIPALITY, ATTR_RADON, ATTR_SETTLEMENT, FetchError, RadonArchive, normalize_code,
};

// ============================================================================
// ArcGIS Response Structures
// ============================================================================

/// Query response in `f=pjson` format.
///
/// ArcGIS reports request errors with HTTP 200 and an `error` object instead
/// of `features`, so both are optional here.
#[derive(Debug, Deserialize)]
pub struct FeatureCollection {
    #[serde(default)]
    pub features: Vec<Feature>,
    pub error: Option<ServiceError>,
}

#[derive(Debug, Deserialize)]
pub struct Feature {
    pub attributes: FeatureAttributes,
}

/// Attributes requested via `outFields`.
///
/// Codes arrive as numbers or strings depending on the layer version, so
/// they are kept as raw JSON and coerced afterwards.
#[derive(Debug, Default, Deserialize)]
pub struct FeatureAttributes {
    pub objectid: Option<i64>,
    pub kod_cast: Option<Value>,
    pub kod_obec: Option<Value>,
    pub radon: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct ServiceError {
    pub code: Option<i64>,
    #[serde(default)]
    pub message: String,
}

// ============================================================================
// Query windows
// ============================================================================

/// Exclusive object-id bounds of one request: `lower < objectid < upper`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryWindow {
    pub lower: u32,
    pub upper: u32,
}

impl fmt::Display for QueryWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "objectid {}..{}", self.lower, self.upper)
    }
}

/// The fixed pagination scheme: `count` windows of `size` ids starting at 0.
///
/// Bounds are exclusive on both sides, so ids that are exact multiples of
/// `size` fall between windows and are never requested. Windows whose
/// bounds would not fit in a `u32` are dropped with a warning.
pub fn query_windows(count: u32, size: u32) -> Vec<QueryWindow> {
    let windows: Vec<QueryWindow> = (0..count)
        .map_while(|i| {
            let lower = size.checked_mul(i)?;
            let upper = lower.checked_add(size)?;
            Some(QueryWindow { lower, upper })
        })
        .collect();
    if windows.len() < count as usize {
        logging::warn(
            Stage::Fetch,
            None,
            &format!(
                "{} windows of {} ids exceed the objectid range, only {} queried",
                count,
                size,
                windows.len()
            ),
        );
    }
    windows
}

/// Build the full query URL for one window.
pub fn build_query_url(endpoint: &str, window: QueryWindow) -> String {
    format!(
        "{}?where=objectid%3E{}+and+objectid+%3C{}\
         &outFields=objectid%2C+{}%2C+{}%2C+{}\
         &returnGeometry=false&returnTrueCurves=false&returnIdsOnly=false\
         &returnCountOnly=false&returnZ=false&returnM=false\
         &returnDistinctValues=false&returnExtentOnly=false\
         &sqlFormat=none&featureEncoding=esriDefault&f=pjson",
        endpoint, window.lower, window.upper, ATTR_MUNICIPALITY, ATTR_SETTLEMENT, ATTR_RADON
    )
}

// ============================================================================
// Feature source
// ============================================================================

/// Anything that can answer a window query with a feature collection.
pub trait FeatureSource {
    fn fetch_window(&self, window: QueryWindow) -> Result<FeatureCollection, FetchError>;
}

/// Live client for the geology service.
pub struct GeologyClient {
    client: reqwest::blocking::Client,
    endpoint: String,
}

impl GeologyClient {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Transport(e.to_string()))?;
        Ok(GeologyClient {
            client,
            endpoint: endpoint.to_string(),
        })
    }
}

impl FeatureSource for GeologyClient {
    fn fetch_window(&self, window: QueryWindow) -> Result<FeatureCollection, FetchError> {
        let url = build_query_url(&self.endpoint, window);

        let response = self
            .client
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(FetchError::Http(response.status().as_u16()));
        }

        let body = response
            .text()
            .map_err(|e| FetchError::Transport(e.to_string()))?;
        parse_feature_collection(&body)
    }
}

/// Parse a `pjson` query response, turning an embedded service error into
/// a `FetchError`.
pub fn parse_feature_collection(body: &str) -> Result<FeatureCollection, FetchError> {
    let collection: FeatureCollection =
        serde_json::from_str(body).map_err(|e| FetchError::Parse(e.to_string()))?;

    if let Some(err) = &collection.error {
        return match err.code {
            Some(code) if (100..600).contains(&code) => Err(FetchError::Http(code as u16)),
            _ => Err(FetchError::Parse(format!("service error: {}", err.message))),
        };
    }

    Ok(collection)
}

// ============================================================================
// Fetch loop
// ============================================================================

/// Outcome counts of one fetch run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchSummary {
    pub windows: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub features: usize,
}

/// Query every window once and collect the features into an archive.
///
/// A failed window is logged and skipped; its features are simply absent.
/// Nothing is retried.
pub fn fetch_radon_archive(
    source: &dyn FeatureSource,
    windows: &[QueryWindow],
) -> (RadonArchive, FetchSummary) {
    let mut archive = RadonArchive::default();
    let mut summary = FetchSummary {
        windows: windows.len(),
        ..Default::default()
    };

    for &window in windows {
        match source.fetch_window(window) {
            Ok(collection) => {
                let count = collection.features.len();
                for feature in collection.features {
                    let attrs = feature.attributes;
                    archive.push(
                        attrs.kod_cast.as_ref().and_then(code_from_value),
                        attrs.kod_obec.as_ref().and_then(code_from_value),
                        attrs.radon.as_ref().and_then(radon_from_value),
                    );
                }
                logging::debug(
                    Stage::Fetch,
                    Some(&window.to_string()),
                    &format!("{} features", count),
                );
                summary.succeeded += 1;
                summary.features += count;
            }
            Err(e) => {
                logging::log_window_failure(&window.to_string(), &e);
                summary.failed += 1;
            }
        }
    }

    logging::log_stage_summary(
        Stage::Fetch,
        "Radon fetch",
        summary.windows,
        summary.succeeded,
        summary.failed,
    );

    (archive, summary)
}

// ============================================================================
// Attribute coercion
// ============================================================================

/// Coerce a code attribute (number or string) into a key string.
pub fn code_from_value(value: &Value) -> Option<String> {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(i.to_string())
            } else if let Some(u) = n.as_u64() {
                Some(u.to_string())
            } else {
                let f = n.as_f64()?;
                if f.fract() == 0.0 && f.is_finite() {
                    Some(format!("{}", f as i64))
                } else {
                    Some(f.to_string())
                }
            }
        }
        Value::String(s) => normalize_code(s),
        _ => None,
    }
}

/// Coerce the radon attribute into a numeric index; anything else is missing.
pub fn radon_from_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().replace(',', ".").parse::<f64>().ok(),
        _ => None,
    }
    .filter(|v| v.is_finite())
}

// ============================================================================
// Tests
// ============================================================================
