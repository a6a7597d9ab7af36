//! Report header and row decoding.
//!
//! Every report file starts with a metadata line whose fifth field carries
//! the report date as `Viewing=[<date>]`, followed by a line of column labels
//! and then one data row per search term. Data rows are decoded once, here,
//! into [`BasicRow`] or [`ExtendedRow`]; nothing downstream indexes into raw
//! fields.
//!
//! | Layout | Fields |
//! |--------|--------|
//! | basic | department, search term, search frequency rank |
//! | extended | basic fields, then 3 × (product id, title, click share, conversion share) |

use anyhow::{bail, Context, Result};

use crate::models::{DateSnapshot, ProductClick, View, PRODUCT_SLOTS};

/// Position of the `Viewing=[…]` field in the metadata line.
pub const DATE_MARKER_FIELD: usize = 4;

const DATE_MARKER_PREFIX: &str = "Viewing=[";
const DATE_MARKER_SUFFIX: &str = "]";

/// Fields before the first product group.
pub const BASIC_FIELDS: usize = 3;
/// Fields per product group.
pub const PRODUCT_GROUP_FIELDS: usize = 4;
/// Fields an extended row must carry.
pub const EXTENDED_FIELDS: usize = BASIC_FIELDS + PRODUCT_SLOTS * PRODUCT_GROUP_FIELDS;

/// Per-file context handed to the index alongside each row.
#[derive(Debug, Clone)]
pub struct Report {
    /// Date label taken from the metadata line.
    pub date: String,
    /// Identifier of the source file.
    pub source_ref: String,
    /// Column labels from the second line, as written in the file.
    pub labels: Vec<String>,
}

/// Number of fields a row must have for `view`.
pub fn required_fields(view: View) -> usize {
    match view {
        View::Basic => BASIC_FIELDS,
        View::Extended => EXTENDED_FIELDS,
    }
}

/// Extract the report date from the metadata line.
pub fn report_date<F: AsRef<str>>(header: &[F]) -> Result<String> {
    let Some(field) = header.get(DATE_MARKER_FIELD) else {
        bail!(
            "Report header has {} fields, expected a date marker at field {}",
            header.len(),
            DATE_MARKER_FIELD + 1
        );
    };
    let field = field.as_ref().trim();
    let date = field
        .strip_prefix(DATE_MARKER_PREFIX)
        .and_then(|rest| rest.strip_suffix(DATE_MARKER_SUFFIX))
        .map(str::trim);
    match date {
        Some(d) if !d.is_empty() => Ok(d.to_string()),
        _ => bail!("Report header field '{}' is not a Viewing=[<date>] marker", field),
    }
}

/// Parse a rank cell, tolerating thousands separators (`"1,234"`).
pub fn parse_rank(raw: &str) -> Result<i64> {
    let cleaned: String = raw.trim().chars().filter(|c| *c != ',').collect();
    cleaned
        .parse::<i64>()
        .with_context(|| format!("Invalid search frequency rank: '{}'", raw))
}

/// Term and rank, common to both layouts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicRow {
    pub department: String,
    pub search_term: String,
    pub rank: i64,
    /// The rank cell exactly as it appeared in the file.
    pub rank_text: String,
}

/// A basic row plus its three product slots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtendedRow {
    pub base: BasicRow,
    pub products: Vec<ProductClick>,
}

/// A decoded data row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceRow {
    Basic(BasicRow),
    Extended(ExtendedRow),
}

impl SourceRow {
    pub fn base(&self) -> &BasicRow {
        match self {
            SourceRow::Basic(b) => b,
            SourceRow::Extended(e) => &e.base,
        }
    }

    pub fn products(&self) -> &[ProductClick] {
        match self {
            SourceRow::Basic(_) => &[],
            SourceRow::Extended(e) => &e.products,
        }
    }

    /// Convert into the snapshot stored under the report date.
    pub fn into_snapshot(self, source_ref: &str) -> DateSnapshot {
        let (rank, products) = match self {
            SourceRow::Basic(b) => (b.rank, Vec::new()),
            SourceRow::Extended(e) => (e.base.rank, e.products),
        };
        DateSnapshot {
            source_ref: source_ref.to_string(),
            rank,
            products,
        }
    }
}

/// Decode one data row for `view`.
///
/// Rows may carry trailing fields beyond the layout; they are ignored.
pub fn parse_row<F: AsRef<str>>(view: View, fields: &[F]) -> Result<SourceRow> {
    let needed = required_fields(view);
    if fields.len() < needed {
        bail!(
            "Row has {} fields, {} view needs at least {}",
            fields.len(),
            view,
            needed
        );
    }
    let base = parse_basic(fields)?;
    match view {
        View::Basic => Ok(SourceRow::Basic(base)),
        View::Extended => {
            let products = (0..PRODUCT_SLOTS)
                .map(|slot| {
                    let at = BASIC_FIELDS + slot * PRODUCT_GROUP_FIELDS;
                    ProductClick {
                        order: (slot + 1) as u8,
                        product_id: cell(fields, at),
                        title: cell(fields, at + 1),
                        click_share: cell(fields, at + 2),
                        conversion_share: cell(fields, at + 3),
                    }
                })
                .collect();
            Ok(SourceRow::Extended(ExtendedRow { base, products }))
        }
    }
}

fn parse_basic<F: AsRef<str>>(fields: &[F]) -> Result<BasicRow> {
    let search_term = cell(fields, 1);
    if search_term.is_empty() {
        bail!("Row has an empty search term");
    }
    let rank_text = fields[2].as_ref().to_string();
    let rank = parse_rank(&rank_text)
        .with_context(|| format!("Bad rank for search term '{}'", search_term))?;
    Ok(BasicRow {
        department: cell(fields, 0),
        search_term,
        rank,
        rank_text,
    })
}

fn cell<F: AsRef<str>>(fields: &[F], at: usize) -> String {
    fields[at].as_ref().trim().to_string()
}
