// ============================================================
// LEGACY CATEGORY TRANSFORM
// ============================================================
// Old survey exports carry generic "Checkbox"/"Number" columns instead of
// named category columns. The heuristic here derives an ordinary column
// mapping for them, so the declarative mapper stays the only projection path.

use crate::application::use_cases::column_mapper::project;
use crate::domain::table::{NormalizedTable, RawTable, CUSTOMER_NAME_COLUMN};
use crate::domain::transform::{ColumnMapping, TransformConfig};

pub const CHECKBOX_HEADER: &str = "Checkbox";
pub const NUMBER_HEADER: &str = "Number";

pub const LEGACY_PROFILE_SLUG: &str = "moores";
pub const LEGACY_PROFILE_VERSION: u32 = 1;

pub const CATEGORY_COLUMNS: [&str; 7] = [
    "Clothing/Garment",
    "Home Decor (Sewing/Quilting/Embroidery)",
    "Quilting/Applique",
    "Embroidery/Applique",
    "Business/Craft Fairs/Items for Sale",
    "Other",
    "All of the Above?",
];

/// True iff the headers contain at least one exact "Checkbox" and one exact "Number".
pub fn detect(headers: &[String]) -> bool {
    headers.iter().any(|h| h == CHECKBOX_HEADER) && headers.iter().any(|h| h == NUMBER_HEADER)
}

fn positions_of(headers: &[String], name: &str) -> Vec<usize> {
    headers
        .iter()
        .enumerate()
        .filter(|(_, h)| h.as_str() == name)
        .map(|(index, _)| index)
        .collect()
}

/// Mapping equivalent to the legacy split: Checkbox/Number columns dropped,
/// the seven category columns spliced in at the first Checkbox (or appended
/// when there is none), everything else passed through in order.
///
/// Category slot `i` reads the i-th Number column, else the i-th Checkbox
/// column, else nothing.
pub fn derive_mapping(headers: &[String]) -> Vec<ColumnMapping> {
    let checkbox = positions_of(headers, CHECKBOX_HEADER);
    let number = positions_of(headers, NUMBER_HEADER);

    let categories: Vec<ColumnMapping> = CATEGORY_COLUMNS
        .iter()
        .enumerate()
        .map(|(slot, name)| {
            match number.get(slot).or_else(|| checkbox.get(slot)) {
                Some(&source) => ColumnMapping::new(*name, source),
                None => ColumnMapping::unmapped(*name),
            }
        })
        .collect();

    let insert_at = checkbox.first().copied();
    let mut mapping = Vec::with_capacity(headers.len() + CATEGORY_COLUMNS.len());
    let mut categories = Some(categories);

    for (index, header) in headers.iter().enumerate() {
        if Some(index) == insert_at {
            mapping.extend(categories.take().unwrap_or_default());
        }
        if header != CHECKBOX_HEADER && header != NUMBER_HEADER {
            mapping.push(ColumnMapping::new(header.clone(), index));
        }
    }
    if let Some(rest) = categories {
        mapping.extend(rest);
    }

    mapping
}

/// Apply the legacy split to a tokenized table.
pub fn apply(headers: &[String], rows: &[Vec<String>]) -> NormalizedTable {
    let raw = RawTable::new(headers.to_vec(), rows.to_vec());
    project(&raw, &derive_mapping(headers))
}

/// The legacy layout as a stored profile: name, email, then the seven
/// category answers in raw columns 2..=8.
pub fn legacy_profile() -> TransformConfig {
    let mut columns = vec![
        ColumnMapping::new(CUSTOMER_NAME_COLUMN, 0),
        ColumnMapping::new("Email", 1),
    ];
    columns.extend(
        CATEGORY_COLUMNS
            .iter()
            .enumerate()
            .map(|(slot, name)| ColumnMapping::new(*name, slot + 2)),
    );

    TransformConfig {
        slug: LEGACY_PROFILE_SLUG.to_string(),
        title: "Moores Survey CSV to PDF".to_string(),
        description: "Upload a Forminator survey CSV export to generate per-respondent PDFs."
            .to_string(),
        title_column: Some(CUSTOMER_NAME_COLUMN.to_string()),
        version: LEGACY_PROFILE_VERSION,
        columns,
    }
}
