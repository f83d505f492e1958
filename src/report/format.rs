//! Formatted terminal output.
//!
//! We keep formatting code in one place so:
//! - the math/fitting code stays clean and testable
//! - output changes are localized (important for future snapshot tests)

use crate::app::pipeline::{DatasetFit, RunOutput};
use crate::domain::{FitConfig, FitOutcome, PARAM_COUNT};

/// Parameter labels as printed (name, unit).
const PARAM_LABELS: [(&str, &str); PARAM_COUNT] = [
    ("Eg", "eV"),
    ("Eb", "eV"),
    ("Gamma", "eV"),
    ("A", ""),
    ("C", ""),
    ("b", ""),
];

/// Format the full run summary (input stats + one block per dataset).
pub fn format_run_summary(run: &RunOutput, config: &FitConfig) -> String {
    let mut out = String::new();

    out.push_str("=== elliott - Exciton Binding Energy Fit ===\n");
    out.push_str(&format!("Input: {}\n", config.input_path.display()));
    out.push_str(&format!(
        "Rows: read={} skipped={} | datasets fitted={} rejected={}\n",
        run.rows_read,
        run.rows_skipped,
        run.fits.len(),
        run.rejected.len()
    ));
    out.push_str(&format!(
        "Kernel: {} | width: {} | restarts: {}\n",
        config.fit.kernel.display_name(),
        config
            .fit
            .kernel_width
            .map(|w| format!("{w:.4} eV (fixed)"))
            .unwrap_or_else(|| "fitted".to_string()),
        config.fit.restarts
    ));

    for fit in &run.fits {
        out.push('\n');
        out.push_str(&format_fit(fit));
    }
    for (name, err) in &run.rejected {
        out.push_str(&format!("\n(skipped {name}) {err}\n"));
    }

    out
}

/// Format one dataset's fit as a parameter table plus diagnostics.
pub fn format_fit(fit: &DatasetFit) -> String {
    let r = &fit.result;
    let p = &fit.prepared;
    let mut out = String::new();

    out.push_str(&format!("Dataset: {}\n", fit.name));
    out.push_str(&format!(
        "Points: n={} | E=[{:.4}, {:.4}] eV | source unit: {}{}\n",
        p.spectrum.len(),
        p.spectrum.energy_min(),
        p.spectrum.energy_max(),
        p.source_unit.label(),
        if fit.focused { " | focused" } else { "" }
    ));

    out.push_str(&format!("{:<8} {:>14} {:>14}\n", "param", "value", "std err"));
    out.push_str(&format!("{:-<8} {:-<14} {:-<14}\n", "", "", ""));
    let values = r.parameters.to_array();
    let errors = r.parameter_uncertainties.map(|e| e.to_array());
    for (j, (name, unit)) in PARAM_LABELS.iter().enumerate() {
        let err = match errors.and_then(|e| e[j]) {
            Some(v) => format!("{v:.3e}"),
            None => "-".to_string(),
        };
        let line = format!("{:<8} {:>14.6} {:>14} {unit}", name, values[j], err);
        out.push_str(line.trim_end());
        out.push('\n');
    }

    out.push_str(&format!(
        "1s exciton: {:.4} eV | Eb = {:.2} meV\n",
        r.parameters.first_exciton_energy(),
        r.parameters.binding_energy * 1e3
    ));
    out.push_str(&format!(
        "R^2={:.6} RSS={:.4e} | {} after {} iterations (start #{})\n",
        r.r_squared,
        r.residual_sum_of_squares,
        r.convergence_status.display_name(),
        r.iterations,
        r.restart_index
    ));
    match r.outcome {
        FitOutcome::ConvergedWithUncertainty => {}
        FitOutcome::ConvergedWithoutUncertainty => {
            out.push_str("note: covariance is singular; uncertainties unavailable\n");
        }
        FitOutcome::NotConverged => {
            out.push_str("warning: fit did not converge; treat parameters with caution\n");
        }
    }
    if let Some(u) = r.urbach {
        out.push_str(&format!(
            "Urbach energy: {:.2} meV ({} points)\n",
            u.energy * 1e3,
            u.n_points
        ));
    }

    out
}
