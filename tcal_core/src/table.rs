//! Extraction of the schedule table from a scraped page.
//!
//! The extraction runs in two explicit phases. [`normalize_markup`] is a purely
//! textual rewrite of the table fragment which removes the sectioning wrappers
//! and expands self-closing cells. [`parse_table`] then parses the rewritten
//! fragment strictly: any error reported by the HTML parser rejects the input.

use std::sync::OnceLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::{ser::SerializeMap, Serialize, Serializer};

use crate::error::{Error, Result};

/// What to do with data rows whose cell count differs from the header's.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RowShapePolicy {
    /// Reject the table with [`Error::RowShape`].
    #[default]
    Strict,
    /// Drop surplus cells and pad missing ones with empty values.
    Truncate,
}

/// The rows of a parsed table, header row separated from the data rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTable {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// One data row keyed by the header names, in header order.
///
/// An empty value means the cell had no text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    fields: Vec<(String, String)>,
}

impl Record {
    /// Insert a field, replacing the value of an existing field with the same name.
    ///
    /// A replaced field keeps its original position. Returns `true` on replacement.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) -> bool {
        let name = name.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(field, _)| *field == name) {
            Some((_, existing)) => {
                *existing = value;
                true
            }
            None => {
                self.fields.push((name, value));
                false
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<N: Into<String>, V: Into<String>> FromIterator<(N, V)> for Record {
    fn from_iter<T: IntoIterator<Item = (N, V)>>(iter: T) -> Self {
        let mut record = Record::default();
        for (name, value) in iter {
            record.insert(name, value);
        }
        record
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

impl RawTable {
    /// Zip every data row against the header row.
    pub fn records(&self, policy: RowShapePolicy) -> Result<Vec<Record>> {
        let expected = self.header.len();
        let mut records = Vec::with_capacity(self.rows.len());
        for (index, row) in self.rows.iter().enumerate() {
            if row.len() != expected {
                match policy {
                    RowShapePolicy::Strict => {
                        return Err(Error::RowShape {
                            row: index + 1,
                            expected,
                            found: row.len(),
                        })
                    }
                    RowShapePolicy::Truncate => tracing::debug!(
                        row = index + 1,
                        expected,
                        found = row.len(),
                        "reshaping row to header length"
                    ),
                }
            }
            let values = row
                .iter()
                .map(String::as_str)
                .chain(std::iter::repeat(""));
            let mut record = Record::default();
            for (name, value) in self.header.iter().zip(values) {
                if record.insert(name.as_str(), value) {
                    tracing::warn!(header = %name, "duplicate header, keeping the last value");
                }
            }
            records.push(record);
        }
        Ok(records)
    }
}

/// Return the outer markup of the first element inside the container matching `selector`.
pub fn extract_table_markup(html: &str, selector: &str) -> Result<String> {
    let container_selector =
        Selector::parse(selector).map_err(|_| Error::InvalidSelector(selector.to_string()))?;
    let dom = Html::parse_document(html);
    let container = dom
        .select(&container_selector)
        .next()
        .ok_or_else(|| Error::NotFound(selector.to_string()))?;
    let first_child = container
        .children()
        .find_map(ElementRef::wrap)
        .ok_or_else(|| Error::NotFound(format!("{selector} > *")))?;
    Ok(first_child.html())
}

fn section_tag_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"(?i)</?\s*(?:thead|tbody|tfoot)\b[^>]*>").unwrap())
}

fn self_closing_cell_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(
            r"(?xi)
                <(?P<tag>td|th)\b # the cell tag
                (?P<attributes>[^>]*?) # anything up to the slash
                \s*/>
            ",
        )
        .unwrap()
    })
}

/// Rewrite the table markup so it can be parsed strictly.
///
/// Sectioning information is discarded, row order is preserved.
pub fn normalize_markup(markup: &str) -> String {
    let without_sections = section_tag_regex().replace_all(markup, "");
    self_closing_cell_regex()
        .replace_all(&without_sections, "<${tag}${attributes}></${tag}>")
        .into_owned()
}

/// Parse normalized table markup into a [`RawTable`].
///
/// The markup must consist of exactly one `table` element and must not produce
/// any parse error.
pub fn parse_table(markup: &str) -> Result<RawTable> {
    let fragment = Html::parse_fragment(markup);
    if let Some(error) = fragment.errors.first() {
        return Err(Error::MalformedInput(error.to_string()));
    }
    let root = fragment.root_element();
    let has_stray_text = root
        .children()
        .filter_map(|node| node.value().as_text())
        .any(|text| !text.trim().is_empty());
    let mut elements = root.children().filter_map(ElementRef::wrap);
    let table = match (elements.next(), elements.next()) {
        (Some(table), None) if table.value().name() == "table" && !has_stray_text => table,
        _ => {
            return Err(Error::MalformedInput(String::from(
                "expected a single table element",
            )))
        }
    };
    let mut rows = table_rows(table).map(|row| {
        row.children()
            .filter_map(ElementRef::wrap)
            .filter(|cell| matches!(cell.value().name(), "td" | "th"))
            .map(cell_text)
            .collect::<Vec<String>>()
    });
    let header = rows
        .next()
        .ok_or_else(|| Error::MalformedInput(String::from("table has no rows")))?;
    Ok(RawTable {
        header,
        rows: rows.collect(),
    })
}

/// Rows directly inside the table, including those the parser wrapped in an implicit section.
fn table_rows(table: ElementRef<'_>) -> impl Iterator<Item = ElementRef<'_>> {
    table
        .children()
        .filter_map(ElementRef::wrap)
        .flat_map(|child| match child.value().name() {
            "tr" => vec![child],
            "thead" | "tbody" | "tfoot" => child
                .children()
                .filter_map(ElementRef::wrap)
                .filter(|row| row.value().name() == "tr")
                .collect(),
            _ => vec![],
        })
}

fn cell_text(cell: ElementRef<'_>) -> String {
    cell.text().collect::<String>().trim().to_string()
}

/// Run the whole extraction: locate, normalize, parse and zip.
pub fn extract_records(html: &str, selector: &str, policy: RowShapePolicy) -> Result<Vec<Record>> {
    let markup = extract_table_markup(html, selector)?;
    let normalized = normalize_markup(&markup);
    let table = parse_table(&normalized)?;
    tracing::debug!(
        columns = table.header.len(),
        rows = table.rows.len(),
        "parsed schedule table"
    );
    table.records(policy)
}
