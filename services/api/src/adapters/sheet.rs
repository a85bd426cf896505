//! services/api/src/adapters/sheet.rs
//!
//! The catalog ingestion adapter: fetches the published CSV export of the
//! book sheet over HTTP and parses its positional columns into named
//! `BookRecord`s. This is the only place in the codebase that knows which
//! column lives at which offset.

use async_trait::async_trait;
use regex::Regex;
use tracing::warn;

use bookcorner_core::domain::{BookRecord, Category};
use bookcorner_core::ports::{CatalogSource, PortError, PortResult};

// Column offsets in the published sheet, iloc-style.
const COL_INTEREST_LEVEL: usize = 1;
const COL_RECOMMENDER: usize = 2;
const COL_TITLE: usize = 3;
const COL_AUTHOR: usize = 4;
const COL_ATOS: usize = 5;
const COL_QUIZ_ID: usize = 7;
const COL_WORD_COUNT: usize = 8;
const COL_RATIONALE_EN: usize = 10;
const COL_RATIONALE_ZH: usize = 12;
const COL_CATEGORY: usize = 14;
const COL_TOPIC: usize = 15;
const COL_SERIES: usize = 16;

//=========================================================================================
// The Adapter Struct
//=========================================================================================

/// Implements the `CatalogSource` port against the remote sheet.
pub struct SheetCatalog {
    client: reqwest::Client,
    url: String,
    atos_re: Regex,
}

impl SheetCatalog {
    pub fn new(url: String) -> Self {
        let client = reqwest::Client::builder()
            .user_agent("bookcorner-api")
            .gzip(true)
            .build()
            .expect("failed to build reqwest client");
        Self {
            client,
            url,
            // First number in the ATOS column, e.g. "ATOS 4.5" or "4.5 / IL LG".
            atos_re: Regex::new(r"\d+(\.\d+)?").expect("static regex"),
        }
    }

    /// Extracts the ATOS score from its semi-structured column. Anything
    /// without a recognizable number coerces to 0.0.
    fn parse_atos(&self, field: &str) -> f64 {
        self.atos_re
            .find(field)
            .and_then(|m| m.as_str().parse::<f64>().ok())
            .unwrap_or(0.0)
    }

    fn parse_row(&self, row: &[String]) -> Option<BookRecord> {
        let title = cell(row, COL_TITLE);
        if title.is_empty() {
            return None;
        }
        Some(BookRecord {
            title,
            author: cell(row, COL_AUTHOR),
            interest_level: cell(row, COL_INTEREST_LEVEL),
            atos_level: self.parse_atos(&cell(row, COL_ATOS)),
            quiz_id: cell(row, COL_QUIZ_ID),
            word_count: parse_word_count(&cell(row, COL_WORD_COUNT)),
            category: Category::parse(&cell(row, COL_CATEGORY)),
            topic: cell(row, COL_TOPIC),
            series: cell(row, COL_SERIES),
            recommender: cell(row, COL_RECOMMENDER),
            rationale_en: cell(row, COL_RATIONALE_EN),
            rationale_zh: cell(row, COL_RATIONALE_ZH),
        })
    }

    fn parse_document(&self, text: &str) -> Vec<BookRecord> {
        let rows = parse_csv(text);
        // First row is the header; everything downstream is addressed by
        // position, so the header text itself is irrelevant.
        rows.iter()
            .skip(1)
            .filter_map(|row| self.parse_row(row))
            .collect()
    }
}

fn cell(row: &[String], idx: usize) -> String {
    row.get(idx).map(|s| s.trim().to_string()).unwrap_or_default()
}

/// Digit-only coercion of the word-count column: "31,938 words" becomes
/// 31938; garbage becomes 0.
fn parse_word_count(field: &str) -> u32 {
    let digits: String = field.chars().filter(|c| c.is_ascii_digit()).collect();
    digits.parse::<u32>().unwrap_or(0)
}

/// Minimal RFC 4180 reader: quoted fields, doubled quotes, newlines inside
/// quotes, CRLF line endings. The published export is well-formed enough
/// that anything it emits round-trips through this.
fn parse_csv(text: &str) -> Vec<Vec<String>> {
    let mut rows = Vec::new();
    let mut row: Vec<String> = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' => {
                    if chars.peek() == Some(&'"') {
                        chars.next();
                        field.push('"');
                    } else {
                        in_quotes = false;
                    }
                }
                _ => field.push(c),
            }
            continue;
        }
        match c {
            '"' => in_quotes = true,
            ',' => {
                row.push(std::mem::take(&mut field));
            }
            '\r' => {} // swallowed; the '\n' that follows ends the row
            '\n' => {
                row.push(std::mem::take(&mut field));
                if row.len() > 1 || !row[0].is_empty() {
                    rows.push(std::mem::take(&mut row));
                } else {
                    row.clear();
                }
            }
            _ => field.push(c),
        }
    }
    // Trailing row without a final newline.
    if !field.is_empty() || !row.is_empty() {
        row.push(field);
        rows.push(row);
    }
    rows
}

//=========================================================================================
// `CatalogSource` Trait Implementation
//=========================================================================================

#[async_trait]
impl CatalogSource for SheetCatalog {
    async fn fetch_catalog(&self) -> PortResult<Vec<BookRecord>> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| PortError::Unavailable(e.to_string()))?;

        if !response.status().is_success() {
            warn!(status = %response.status(), "catalog sheet fetch failed");
            return Err(PortError::Unavailable(format!(
                "sheet returned HTTP {}",
                response.status()
            )));
        }

        let text = response
            .text()
            .await
            .map_err(|e| PortError::Unavailable(e.to_string()))?;
        Ok(self.parse_document(&text))
    }
}
