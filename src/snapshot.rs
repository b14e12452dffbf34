use std::fmt::Write as _;

use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("invalid language '{0}': no such column in the snapshot")]
    UnknownDisplayLanguage(String),
    #[error("snapshot io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Point-in-time table of language proportions: one row per region, one
/// column per language.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub languages: Vec<String>,
    pub rows: Vec<SnapshotRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SnapshotRow {
    pub region: String,
    /// One cell per entry of `Snapshot::languages`; `None` when the region
    /// does not track that language.
    pub values: Vec<Option<f64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnEntry {
    pub region: String,
    pub value: Option<f64>,
}

impl Snapshot {
    pub fn new(languages: Vec<String>, rows: Vec<SnapshotRow>) -> Self {
        Self { languages, rows }
    }

    pub fn has_language(&self, language: &str) -> bool {
        self.language_index(language).is_some()
    }

    pub fn value(&self, region: &str, language: &str) -> Option<f64> {
        let index = self.language_index(language)?;
        self.rows
            .iter()
            .find(|row| row.region == region)
            .and_then(|row| row.values.get(index).copied().flatten())
    }

    /// All regions' values for one language.
    pub fn column(&self, language: &str) -> Result<Vec<ColumnEntry>, SnapshotError> {
        let index = self
            .language_index(language)
            .ok_or_else(|| SnapshotError::UnknownDisplayLanguage(language.to_string()))?;
        Ok(self
            .rows
            .iter()
            .map(|row| ColumnEntry {
                region: row.region.clone(),
                value: row.values.get(index).copied().flatten(),
            })
            .collect())
    }

    /// Fixed-width table with a leading row index, for consoles and `.txt`
    /// exports.
    pub fn to_table(&self) -> String {
        let mut header = vec![String::new(), "regions".to_string()];
        header.extend(self.languages.iter().cloned());

        let mut cells: Vec<Vec<String>> = Vec::with_capacity(self.rows.len());
        for (index, row) in self.rows.iter().enumerate() {
            let mut line = vec![index.to_string(), row.region.clone()];
            line.extend(row.values.iter().map(|value| match value {
                Some(value) => format!("{value:.6}"),
                None => "NaN".to_string(),
            }));
            cells.push(line);
        }

        let widths: Vec<usize> = (0..header.len())
            .map(|column| {
                cells
                    .iter()
                    .map(|line| line[column].len())
                    .chain(std::iter::once(header[column].len()))
                    .max()
                    .unwrap_or(0)
            })
            .collect();

        let mut table = String::new();
        for line in std::iter::once(&header).chain(cells.iter()) {
            let rendered: Vec<String> = line
                .iter()
                .zip(&widths)
                .map(|(cell, &width)| format!("{cell:>width$}"))
                .collect();
            let _ = writeln!(table, "{}", rendered.join("  ").trim_end());
        }
        table
    }

    /// Comma separated rendering; the first, unnamed column is the row index.
    pub fn to_csv(&self) -> String {
        let mut csv = String::new();
        let _ = write!(csv, ",regions");
        for language in &self.languages {
            let _ = write!(csv, ",{}", csv_field(language));
        }
        csv.push('\n');
        for (index, row) in self.rows.iter().enumerate() {
            let _ = write!(csv, "{index},{}", csv_field(&row.region));
            for value in &row.values {
                match value {
                    Some(value) => {
                        let _ = write!(csv, ",{value}");
                    }
                    None => csv.push(','),
                }
            }
            csv.push('\n');
        }
        csv
    }

    fn language_index(&self, language: &str) -> Option<usize> {
        self.languages.iter().position(|name| name == language)
    }
}

fn csv_field(value: &str) -> String {
    if value.contains(&[',', '"', '\n'][..]) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
