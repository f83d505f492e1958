//! JSON export of fit results.
//!
//! The document carries everything a plotting or reporting consumer needs:
//! - tool/version and a UTC timestamp
//! - per dataset: name, source unit, normalization scale and the full `FitResult`
//!   (parameters, uncertainties, curves, status)

use std::fs::File;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::app::pipeline::DatasetFit;
use crate::domain::{FitResult, XUnit};
use crate::error::{AppError, EXIT_INTERNAL};

/// Top-level JSON document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultsFile {
    pub tool: String,
    pub version: String,
    pub generated_at: DateTime<Utc>,
    pub source: String,
    pub datasets: Vec<DatasetEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetEntry {
    pub name: String,
    pub source_unit: XUnit,
    /// Raw peak height the spectrum was divided by.
    pub scale: f64,
    pub result: FitResult,
}

/// Assemble the JSON document for a run.
pub fn results_document(source: &Path, fits: &[DatasetFit]) -> ResultsFile {
    ResultsFile {
        tool: "elliott".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        generated_at: Utc::now(),
        source: source.display().to_string(),
        datasets: fits
            .iter()
            .map(|f| DatasetEntry {
                name: f.name.clone(),
                source_unit: f.prepared.source_unit,
                scale: f.prepared.scale,
                result: f.result.clone(),
            })
            .collect(),
    }
}

/// Write the JSON document to `path`.
pub fn write_results_json(path: &Path, source: &Path, fits: &[DatasetFit]) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(EXIT_INTERNAL, format!("Failed to create JSON '{}': {e}", path.display())))?;

    serde_json::to_writer_pretty(file, &results_document(source, fits))
        .map_err(|e| AppError::new(EXIT_INTERNAL, format!("Failed to write JSON: {e}")))?;

    Ok(())
}
