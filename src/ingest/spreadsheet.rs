/// Spreadsheet extracts: NOR cancer incidence and regional air quality.
///
/// The National Oncology Registry publishes ten-year incidence as long
/// tables, one row per (period, territory, diagnosis, sex, ...) with the
/// crude rate in a fixed column. The district extract is large, so only a
/// known data-row range is scanned. The air-quality workbook is a formatted
/// report; PM readings are read cell by cell via `regions::find_region`.

use calamine::{Data, Range, Reader, open_workbook_auto};
use std::borrow::Cow;
use std::path::Path;

use crate::analysis::stats::coerce_numeric;
use crate::config::RowRange;
use crate::logging::{self, Stage};
use crate::model::{AggregateRow, PipelineError};
use crate::regions::{find_region, parse_cell_ref};

// ============================================================================
// Sheet layout
// ============================================================================

/// Zero-based column positions within a NOR extract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SheetLayout {
    pub period_col: usize,
    pub group_col: usize,
    pub diagnosis_col: usize,
    pub value_col: usize,
}

/// Layout shared by the district and region incidence extracts.
pub const NOR_LAYOUT: SheetLayout = SheetLayout {
    period_col: 0,
    group_col: 2,
    diagnosis_col: 3,
    value_col: 12,
};

// ============================================================================
// Workbook access
// ============================================================================

/// Open a workbook and return the named worksheet, or the first one.
pub fn load_sheet(path: &Path, sheet: Option<&str>) -> Result<Range<Data>, PipelineError> {
    let mut workbook = open_workbook_auto(path)?;
    let name = match sheet {
        Some(name) => name.to_string(),
        None => workbook.sheet_names().first().cloned().ok_or_else(|| {
            PipelineError::Spreadsheet(format!("{} has no worksheets", path.display()))
        })?,
    };
    let range = workbook.worksheet_range(&name)?;
    logging::debug(
        Stage::Spreadsheet,
        Some(&path.display().to_string()),
        &format!("sheet '{}' is {} rows x {} columns", name, range.height(), range.width()),
    );
    Ok(range)
}

fn cell_text(cell: &Data) -> Option<Cow<'_, str>> {
    match cell {
        Data::String(s) => Some(Cow::Borrowed(s.as_str())),
        Data::Int(i) => Some(Cow::Owned(i.to_string())),
        Data::Float(f) => Some(Cow::Owned(f.to_string())),
        _ => None,
    }
}

/// Numeric content of a cell; text is coerced, anything else is missing.
pub fn cell_number(cell: &Data) -> Option<f64> {
    match cell {
        Data::Float(f) => Some(*f).filter(|v| v.is_finite()),
        Data::Int(i) => Some(*i as f64),
        Data::String(s) => coerce_numeric(s),
        _ => None,
    }
}

// ============================================================================
// Incidence attachment
// ============================================================================

/// What to look for while scanning an incidence extract.
#[derive(Debug, Clone)]
pub struct IncidenceQuery<'a> {
    pub period: &'a str,
    pub diagnosis: &'a str,
    pub rows: RowRange,
    pub layout: SheetLayout,
}

/// Scan the data rows of `sheet` (the first row is the header) and write
/// the incidence of every matching row into the aggregate with the same
/// group name.
///
/// A later match for the same group overwrites an earlier one. Aggregates
/// with no match keep `incidence = None`. Returns the number of matching
/// rows that found an aggregate.
pub fn attach_incidence(
    sheet: &Range<Data>,
    query: &IncidenceQuery<'_>,
    aggregates: &mut [AggregateRow],
) -> usize {
    let data: Vec<&[Data]> = sheet.rows().skip(1).collect();
    let span = query.rows.clamp(data.len());
    if query.rows.end.is_some_and(|end| end > data.len()) {
        logging::warn(
            Stage::Spreadsheet,
            None,
            &format!(
                "row range {}..{:?} exceeds sheet height {}, scanning {:?}",
                query.rows.start,
                query.rows.end,
                data.len(),
                span
            ),
        );
    }

    let layout = query.layout;
    let mut attached = 0;
    for row in &data[span] {
        let text = |col: usize| row.get(col).and_then(cell_text);
        if text(layout.period_col).as_deref() != Some(query.period)
            || text(layout.diagnosis_col).as_deref() != Some(query.diagnosis)
        {
            continue;
        }
        let Some(group) = text(layout.group_col) else {
            continue;
        };
        let value = row.get(layout.value_col).and_then(cell_number);

        if let Some(target) = aggregates.iter_mut().find(|a| a.group == *group) {
            target.incidence = value;
            attached += 1;
        } else {
            logging::debug(
                Stage::Spreadsheet,
                Some(&*group),
                "incidence row has no matching aggregate",
            );
        }
    }

    let unmatched = aggregates.iter().filter(|a| a.incidence.is_none()).count();
    if unmatched > 0 {
        logging::warn(
            Stage::Spreadsheet,
            None,
            &format!("{} of {} groups without incidence", unmatched, aggregates.len()),
        );
    }
    attached
}

// ============================================================================
// Particulate matter
// ============================================================================

/// Copy each region's PM reading from its registry cell into the matching
/// aggregate. Groups missing from the registry keep `pm = None`. Returns
/// the number of regions that received a value.
pub fn attach_particulates(sheet: &Range<Data>, aggregates: &mut [AggregateRow]) -> usize {
    let mut attached = 0;
    for target in aggregates.iter_mut() {
        let Some(region) = find_region(&target.group) else {
            logging::warn(
                Stage::Spreadsheet,
                Some(&target.group),
                "region not in registry, no PM cell",
            );
            continue;
        };
        let Some(position) = parse_cell_ref(region.pm_cell) else {
            logging::error(Stage::Spreadsheet, Some(region.nuts_code), "invalid PM cell reference");
            continue;
        };

        target.pm = sheet.get_value(position).and_then(cell_number);
        if target.pm.is_some() {
            attached += 1;
        } else {
            logging::warn(
                Stage::Spreadsheet,
                Some(region.nuts_code),
                &format!("cell {} holds no number", region.pm_cell),
            );
        }
    }
    attached
}

// ============================================================================
// Tests
// ============================================================================
