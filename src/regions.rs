/// Region registry for the aggregation and air-quality attachment.
///
/// Defines the 14 Czech regions (kraje) as they are spelled in the district
/// list and the NOR extracts, together with the cell of the air-quality
/// workbook that holds each region's particulate-matter reading. The PM
/// workbook has no region column to join on, so this table is the single
/// source of truth for that mapping.

// ---------------------------------------------------------------------------
// Region metadata
// ---------------------------------------------------------------------------

/// Metadata for a single region.
pub struct Region {
    /// NUTS 3 code.
    pub nuts_code: &'static str,
    /// Region name as spelled in `Nazev_kraje`.
    pub name: &'static str,
    /// A1 reference of the PM reading in the air-quality workbook.
    pub pm_cell: &'static str,
}

/// All regions, in the row order of the air-quality workbook.
pub static REGION_REGISTRY: &[Region] = &[
    Region { nuts_code: "CZ010", name: "Hlavní město Praha", pm_cell: "C4" },
    Region { nuts_code: "CZ020", name: "Středočeský kraj", pm_cell: "C5" },
    Region { nuts_code: "CZ031", name: "Jihočeský kraj", pm_cell: "C6" },
    Region { nuts_code: "CZ032", name: "Plzeňský kraj", pm_cell: "C7" },
    Region { nuts_code: "CZ041", name: "Karlovarský kraj", pm_cell: "C8" },
    Region { nuts_code: "CZ042", name: "Ústecký kraj", pm_cell: "C9" },
    Region { nuts_code: "CZ051", name: "Liberecký kraj", pm_cell: "C10" },
    Region { nuts_code: "CZ052", name: "Královéhradecký kraj", pm_cell: "C11" },
    Region { nuts_code: "CZ053", name: "Pardubický kraj", pm_cell: "C12" },
    Region { nuts_code: "CZ063", name: "Kraj Vysočina", pm_cell: "C13" },
    Region { nuts_code: "CZ064", name: "Jihomoravský kraj", pm_cell: "C14" },
    Region { nuts_code: "CZ071", name: "Olomoucký kraj", pm_cell: "C15" },
    Region { nuts_code: "CZ072", name: "Zlínský kraj", pm_cell: "C16" },
    Region { nuts_code: "CZ080", name: "Moravskoslezský kraj", pm_cell: "C17" },
];

/// Looks up a region by name. Returns `None` if not found.
pub fn find_region(name: &str) -> Option<&'static Region> {
    REGION_REGISTRY.iter().find(|r| r.name == name)
}

/// Converts an A1 reference ("C17") into zero-based `(row, column)`.
pub fn parse_cell_ref(cell: &str) -> Option<(u32, u32)> {
    let split = cell.find(|c: char| c.is_ascii_digit())?;
    let (letters, digits) = cell.split_at(split);
    if letters.is_empty() || !letters.chars().all(|c| c.is_ascii_uppercase()) {
        return None;
    }
    let row: u32 = digits.parse().ok()?;
    if row == 0 {
        return None;
    }
    let column = letters
        .bytes()
        .try_fold(0u32, |acc, b| acc.checked_mul(26)?.checked_add(u32::from(b - b'A' + 1)))?;
    Some((row - 1, column - 1))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
