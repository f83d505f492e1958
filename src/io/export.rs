//! Export fit results to CSV.
//!
//! The export is meant to be easy to consume in spreadsheets or downstream
//! scripts. Each dataset gets one block:
//!
//! - `dataset,<name>`
//! - a `parameter,value,uncertainty` table (plus R², RSS, Urbach, status)
//! - the curves on the fit grid: raw, baseline, normalized, fit, components

use std::io::Write;
use std::path::Path;

use crate::app::pipeline::DatasetFit;
use crate::domain::{PARAM_NAMES, XUnit};
use crate::error::{AppError, EXIT_INTERNAL};
use crate::fit::prepare::NM_EV;

/// Write all dataset results to a CSV file.
pub fn write_results_csv(path: &Path, fits: &[DatasetFit]) -> Result<(), AppError> {
    let file = std::fs::File::create(path)
        .map_err(|e| AppError::new(EXIT_INTERNAL, format!("Failed to create export CSV '{}': {e}", path.display())))?;
    write_results(file, fits)
        .map_err(|e| AppError::new(EXIT_INTERNAL, format!("Failed to write export CSV '{}': {e}", path.display())))
}

/// Write the CSV blocks to any writer.
pub fn write_results<W: Write>(out: W, fits: &[DatasetFit]) -> Result<(), csv::Error> {
    let mut w = csv::WriterBuilder::new().flexible(true).from_writer(out);

    for fit in fits {
        let r = &fit.result;
        w.write_record(["dataset", fit.name.as_str()])?;
        w.write_record(["parameter", "value", "uncertainty"])?;

        let values = r.parameters.to_array();
        let errors = r.parameter_uncertainties.as_ref().map(|e| e.to_array());
        for (j, name) in PARAM_NAMES.iter().enumerate() {
            let err = errors
                .and_then(|e| e[j])
                .map(|v| format!("{v:.6e}"))
                .unwrap_or_default();
            w.write_record([name.to_string(), format!("{:.8}", values[j]), err])?;
        }
        w.write_record(["r_squared".to_string(), format!("{:.6}", r.r_squared), String::new()])?;
        w.write_record(["rss".to_string(), format!("{:.6e}", r.residual_sum_of_squares), String::new()])?;
        let urbach = r.urbach.map(|u| format!("{:.6}", u.energy)).unwrap_or_default();
        w.write_record(["urbach_energy".to_string(), urbach, String::new()])?;
        w.write_record(["kernel".to_string(), r.kernel.kind.display_name().to_string(), String::new()])?;
        w.write_record([
            "status".to_string(),
            r.convergence_status.display_name().to_string(),
            String::new(),
        ])?;

        let source_nm = fit.prepared.source_unit == XUnit::Nanometer;
        let mut header = vec!["energy_ev"];
        if source_nm {
            header.push("wavelength_nm");
        }
        header.extend([
            "raw",
            "baseline",
            "normalized",
            "fit",
            "fit_raw",
            "exciton",
            "continuum",
            "residual",
        ]);
        w.write_record(&header)?;

        let s = &fit.prepared.spectrum;
        for (i, (&e, &y)) in s.energies().iter().zip(s.intensities()).enumerate() {
            let f = r.predicted_curve[i].1;
            let mut row = vec![format!("{e:.6}")];
            if source_nm {
                row.push(format!("{:.3}", NM_EV / e));
            }
            row.extend([
                format!("{:.6e}", fit.prepared.raw_intensities[i]),
                format!("{:.6e}", fit.prepared.baseline[i]),
                format!("{y:.6e}"),
                format!("{f:.6e}"),
                format!("{:.6e}", fit.prepared.denormalize(i, f)),
                format!("{:.6e}", r.exciton_curve[i].1),
                format!("{:.6e}", r.continuum_curve[i].1),
                format!("{:.6e}", r.residuals[i]),
            ]);
            w.write_record(&row)?;
        }
    }

    w.flush()?;
    Ok(())
}
