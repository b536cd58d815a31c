//! Numeric coercion and summary statistics over the result tables.

use std::fmt;
use std::path::Path;

use crate::model::PipelineError;

/// Parse a cell as a number, treating anything non-numeric as missing.
///
/// Accepts surrounding whitespace and a decimal comma ("12,5").
pub fn coerce_numeric(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let parsed = trimmed
        .parse::<f64>()
        .ok()
        .or_else(|| trimmed.replace(',', ".").parse::<f64>().ok())?;
    parsed.is_finite().then_some(parsed)
}

// ---------------------------------------------------------------------------
// Frame
// ---------------------------------------------------------------------------

/// Named numeric columns of equal length; `None` marks a missing value.
#[derive(Debug, Clone, PartialEq)]
pub struct NumericFrame {
    pub columns: Vec<(String, Vec<Option<f64>>)>,
}

impl NumericFrame {
    pub fn new(columns: Vec<(String, Vec<Option<f64>>)>) -> Self {
        NumericFrame { columns }
    }

    /// Reads `names` from a CSV with a header row, coercing every cell.
    pub fn from_csv(path: &Path, names: &[&str]) -> Result<Self, PipelineError> {
        let mut rdr = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
        let headers = rdr.headers()?.clone();

        let mut indices = Vec::with_capacity(names.len());
        for name in names {
            let idx = headers.iter().position(|h| h == *name).ok_or_else(|| {
                PipelineError::MissingColumn {
                    file: path.display().to_string(),
                    column: name.to_string(),
                }
            })?;
            indices.push(idx);
        }

        let mut columns: Vec<(String, Vec<Option<f64>>)> =
            names.iter().map(|n| (n.to_string(), Vec::new())).collect();
        for record in rdr.records() {
            let record = record?;
            for (slot, &idx) in columns.iter_mut().zip(&indices) {
                slot.1.push(record.get(idx).and_then(coerce_numeric));
            }
        }
        Ok(NumericFrame { columns })
    }

    pub fn column(&self, name: &str) -> Option<&[Option<f64>]> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, values)| values.as_slice())
    }

    pub fn len(&self) -> usize {
        self.columns.first().map_or(0, |(_, v)| v.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Per column: does it contain at least one missing value?
pub fn missing_report(frame: &NumericFrame) -> Vec<(String, bool)> {
    frame
        .columns
        .iter()
        .map(|(name, values)| (name.clone(), values.iter().any(Option::is_none)))
        .collect()
}

// ---------------------------------------------------------------------------
// Summary
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum StatsError {
    /// Correlation refused because these columns contain missing values.
    MissingValues(Vec<String>),
    /// Not enough observations for the statistic.
    InsufficientData { needed: usize, got: usize },
    /// The regressor has zero variance.
    ConstantInput,
}

impl fmt::Display for StatsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatsError::MissingValues(cols) => write!(
                f,
                "Missing values detected in {}. Cannot calculate correlation matrix.",
                cols.join(", ")
            ),
            StatsError::InsufficientData { needed, got } => {
                write!(f, "Insufficient data: need {} observations, got {}", needed, got)
            }
            StatsError::ConstantInput => write!(f, "Regressor is constant"),
        }
    }
}

impl std::error::Error for StatsError {}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSummary {
    pub name: String,
    pub mean: f64,
    /// Sample standard deviation (n − 1).
    pub std_dev: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub columns: Vec<ColumnSummary>,
    /// Pearson correlation, `correlation[i][j]` between columns i and j.
    pub correlation: Vec<Vec<f64>>,
}

pub fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

pub fn sample_std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return f64::NAN;
    }
    let m = mean(values);
    let ss: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    (ss / (values.len() - 1) as f64).sqrt()
}

/// Pearson correlation of two equal-length series. `NaN` if either is constant.
pub fn pearson(xs: &[f64], ys: &[f64]) -> f64 {
    let mx = mean(xs);
    let my = mean(ys);
    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (x, y) in xs.iter().zip(ys) {
        let dx = x - mx;
        let dy = y - my;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    if sxx == 0.0 || syy == 0.0 {
        return f64::NAN;
    }
    (sxy / (sxx * syy).sqrt()).clamp(-1.0, 1.0)
}

/// Mean, standard deviation and correlation matrix of every column.
///
/// Refuses to compute anything if a single value is missing; a partial
/// matrix is never produced.
pub fn summarize(frame: &NumericFrame) -> Result<Summary, StatsError> {
    let missing: Vec<String> = missing_report(frame)
        .into_iter()
        .filter_map(|(name, has_missing)| has_missing.then_some(name))
        .collect();
    if !missing.is_empty() {
        return Err(StatsError::MissingValues(missing));
    }
    if frame.len() < 2 {
        return Err(StatsError::InsufficientData { needed: 2, got: frame.len() });
    }

    let dense: Vec<Vec<f64>> = frame
        .columns
        .iter()
        .map(|(_, values)| values.iter().flatten().copied().collect())
        .collect();

    let columns = frame
        .columns
        .iter()
        .zip(&dense)
        .map(|((name, _), values)| ColumnSummary {
            name: name.clone(),
            mean: mean(values),
            std_dev: sample_std_dev(values),
        })
        .collect();

    let k = dense.len();
    let mut correlation = vec![vec![f64::NAN; k]; k];
    for i in 0..k {
        for j in i..k {
            let r = if i == j {
                if sample_std_dev(&dense[i]) > 0.0 { 1.0 } else { f64::NAN }
            } else {
                pearson(&dense[i], &dense[j])
            };
            correlation[i][j] = r;
            correlation[j][i] = r;
        }
    }

    Ok(Summary { columns, correlation })
}

/// Renders a summary the way it is printed to the console.
pub fn format_summary(summary: &Summary) -> String {
    let mut out = String::new();
    for c in &summary.columns {
        out.push_str(&format!("{:<16} mean={:>10.4} std={:>10.4}\n", c.name, c.mean, c.std_dev));
    }
    out.push_str(&format!("{:<16}", ""));
    for c in &summary.columns {
        out.push_str(&format!("{:>16}", c.name));
    }
    out.push('\n');
    for (c, row) in summary.columns.iter().zip(&summary.correlation) {
        out.push_str(&format!("{:<16}", c.name));
        for r in row {
            out.push_str(&format!("{:>16.6}", r));
        }
        out.push('\n');
    }
    out
}
