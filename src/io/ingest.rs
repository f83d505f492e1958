//! Spectrum file ingest.
//!
//! Turns a text file of columns into raw spectra:
//!
//! - first column is the x axis (eV or nm), every further column one dataset
//! - `.csv` files (or files whose first data line has a comma) are read with
//!   the `csv` crate; anything else is split on whitespace/tabs
//! - leading non-numeric lines are headers (the last one names the datasets)
//! - `#` comments and blank lines are skipped
//! - data rows that fail to parse are skipped and counted
//!
//! No unit conversion or validation happens here; that is `fit::prepare`.

use std::path::Path;

use crate::domain::XUnit;
use crate::error::{AppError, EXIT_USAGE};
use crate::fit::prepare::RawSpectrum;

/// One named column of a spectrum file.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    /// Column header, or `dataset N` (1-based) when the file has none.
    pub name: String,
    pub raw: RawSpectrum,
}

/// Parsed file with ingest statistics.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestedFile {
    pub datasets: Vec<Dataset>,
    pub rows_read: usize,
    pub rows_skipped: usize,
}

/// Read a spectrum file from disk.
pub fn load_spectra(path: &Path, unit: XUnit) -> Result<IngestedFile, AppError> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| AppError::new(EXIT_USAGE, format!("Failed to read '{}': {e}", path.display())))?;
    let comma = path
        .extension()
        .and_then(|s| s.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
    parse_spectra(&text, unit, comma)
        .map_err(|e| AppError::new(EXIT_USAGE, format!("{}: {e}", path.display())))
}

/// Parse spectrum text. `comma` forces comma-separated parsing.
pub fn parse_spectra(text: &str, unit: XUnit, comma: bool) -> Result<IngestedFile, String> {
    let comma = comma || first_data_line(text).is_some_and(|l| l.contains(','));
    let rows = if comma { split_csv(text)? } else { split_whitespace(text) };

    let mut header: Option<Vec<String>> = None;
    let mut columns: Vec<Vec<f64>> = Vec::new();
    let mut rows_read = 0;
    let mut rows_skipped = 0;

    for fields in rows {
        if fields.is_empty() || fields.iter().all(|f| f.is_empty()) {
            continue;
        }
        let parsed: Option<Vec<f64>> = fields.iter().map(|f| f.parse::<f64>().ok()).collect();

        match parsed {
            Some(values) if values.len() >= 2 => {
                rows_read += 1;
                if columns.is_empty() {
                    columns = vec![Vec::new(); values.len()];
                }
                if values.len() < columns.len() {
                    rows_skipped += 1;
                    continue;
                }
                for (col, v) in columns.iter_mut().zip(values) {
                    col.push(v);
                }
            }
            _ if columns.is_empty() => {
                // Still in the header block.
                header = Some(fields);
            }
            _ => {
                rows_read += 1;
                rows_skipped += 1;
            }
        }
    }

    if rows_skipped > 0 {
        log::warn!("Skipped {rows_skipped} malformed row(s) of {rows_read}");
    }
    if columns.len() < 2 {
        return Err("no numeric data with at least two columns".to_string());
    }

    let mut columns = columns.into_iter();
    let x = columns.next().unwrap_or_default();
    let datasets = columns
        .enumerate()
        .map(|(i, y)| {
            let name = header
                .as_ref()
                .and_then(|h| h.get(i + 1))
                .filter(|s| !s.is_empty())
                .cloned()
                .unwrap_or_else(|| format!("dataset {}", i + 1));
            Dataset {
                name,
                raw: RawSpectrum {
                    x: x.clone(),
                    y,
                    unit,
                },
            }
        })
        .collect();

    Ok(IngestedFile {
        datasets,
        rows_read,
        rows_skipped,
    })
}

/// Keep only the requested 1-based dataset indices (all when empty).
pub fn select_datasets(datasets: Vec<Dataset>, wanted: &[usize]) -> Result<Vec<Dataset>, AppError> {
    if wanted.is_empty() {
        return Ok(datasets);
    }
    let total = datasets.len();
    if let Some(bad) = wanted.iter().find(|&&i| i == 0 || i > total) {
        return Err(AppError::new(
            EXIT_USAGE,
            format!("Dataset {bad} does not exist (file has {total})"),
        ));
    }
    Ok(datasets
        .into_iter()
        .enumerate()
        .filter(|(i, _)| wanted.contains(&(i + 1)))
        .map(|(_, d)| d)
        .collect())
}

fn is_comment(line: &str) -> bool {
    let t = line.trim();
    t.is_empty() || t.starts_with('#')
}

fn first_data_line(text: &str) -> Option<&str> {
    text.lines()
        .filter(|l| !is_comment(l))
        .find(|l| l.trim().chars().next().is_some_and(|c| c.is_ascii_digit() || matches!(c, '-' | '+' | '.')))
}

fn split_csv(text: &str) -> Result<Vec<Vec<String>>, String> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .comment(Some(b'#'))
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| format!("CSV parse error: {e}"))?;
        rows.push(record.iter().map(str::to_string).collect());
    }
    Ok(rows)
}

fn split_whitespace(text: &str) -> Vec<Vec<String>> {
    text.lines()
        .filter(|l| !is_comment(l))
        .map(|l| l.split_whitespace().map(str::to_string).collect())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_whitespace_columns_with_header() {
        let text = "# measured 2024\nEnergy  A  B\n1.50 0.1 0.2\n1.51\t0.3 0.4\n\n1.52 0.5 0.6\n";
        let file = parse_spectra(text, XUnit::ElectronVolt, false).unwrap();
        assert_eq!(file.datasets.len(), 2);
        assert_eq!(file.datasets[0].name, "A");
        assert_eq!(file.datasets[1].name, "B");
        assert_eq!(file.datasets[1].raw.y, vec![0.2, 0.4, 0.6]);
        assert_eq!(file.datasets[0].raw.x, vec![1.50, 1.51, 1.52]);
        assert_eq!(file.rows_read, 3);
    }

    #[test]
    fn parses_csv_and_skips_bad_rows() {
        let text = "wavelength,abs\n700,0.1\n702,oops\n704,0.3\n";
        let file = parse_spectra(text, XUnit::Auto, true).unwrap();
        assert_eq!(file.datasets.len(), 1);
        assert_eq!(file.datasets[0].name, "abs");
        assert_eq!(file.datasets[0].raw.x, vec![700.0, 704.0]);
        assert_eq!(file.rows_skipped, 1);
        assert_eq!(file.datasets[0].raw.unit, XUnit::Auto);
    }

    #[test]
    fn detects_commas_without_extension() {
        let text = "1.5,0.1\n1.6,0.2\n";
        let file = parse_spectra(text, XUnit::ElectronVolt, false).unwrap();
        assert_eq!(file.datasets[0].name, "dataset 1");
        assert_eq!(file.datasets[0].raw.y, vec![0.1, 0.2]);
    }

    #[test]
    fn single_column_is_an_error() {
        assert!(parse_spectra("1.0\n2.0\n", XUnit::ElectronVolt, false).is_err());
    }

    #[test]
    fn selects_datasets_by_one_based_index() {
        let text = "1.5 1 2 3\n1.6 4 5 6\n";
        let file = parse_spectra(text, XUnit::ElectronVolt, false).unwrap();
        let picked = select_datasets(file.datasets.clone(), &[1, 3]).unwrap();
        assert_eq!(picked.len(), 2);
        assert_eq!(picked[1].raw.y, vec![3.0, 6.0]);
        let err = select_datasets(file.datasets, &[4]).unwrap_err();
        assert_eq!(err.exit_code(), EXIT_USAGE);
    }
}
