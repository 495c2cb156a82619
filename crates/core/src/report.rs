//! Plain-text sensor and verdict reports.
//!
//! Used both as generator input and, verbatim, in fallback answers.

use std::fmt::Write;

use crate::telemetry::Machine;
use crate::thresholds::ThresholdConfig;
use crate::verdict::{Classification, FailureVerdict};

/// Normal operating range for process temperature, in Kelvin (display only).
pub const NORMAL_TEMP_RANGE_K: (f64, f64) = (300.0, 315.0);

/// Normal rotational speed range (display only).
pub const NORMAL_RPM_RANGE: (f64, f64) = (1200.0, 1800.0);

/// Normal torque range in Nm (display only).
pub const NORMAL_TORQUE_RANGE_NM: (f64, f64) = (40.0, 60.0);

fn reading(value: Option<f64>, precision: usize) -> String {
    match value {
        Some(v) => format!("{v:.precision$}"),
        None => "N/A".to_string(),
    }
}

/// Full machine report: identity, status, readings with normal ranges, and
/// every verdict with its recommended action. Limits come from `cfg`.
pub fn machine_report(
    machine: &Machine,
    classification: &Classification,
    cfg: &ThresholdConfig,
) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Machine ID: {}", machine.id);
    let _ = writeln!(out, "Model: {}", machine.model_name);
    if let Some(location) = &machine.location {
        let _ = writeln!(out, "Location: {location}");
    }
    let _ = writeln!(out, "Status: {}", classification.status().as_str());

    let Some(snap) = classification.snapshot() else {
        let _ = writeln!(out, "No telemetry has been recorded for this machine yet.");
        return out;
    };

    let _ = writeln!(out, "Last reading: {}", snap.timestamp.to_rfc3339());
    let _ = writeln!(out, "--- SENSOR READINGS ---");
    let _ = writeln!(
        out,
        "Temperature: {} K / {} C (Normal: {:.0}-{:.0} K)",
        reading(snap.process_temp_k, 1),
        reading(snap.process_temp_c(), 1),
        NORMAL_TEMP_RANGE_K.0,
        NORMAL_TEMP_RANGE_K.1
    );
    let _ = writeln!(
        out,
        "RPM: {} (Normal: {:.0}-{:.0})",
        reading(snap.rpm, 0),
        NORMAL_RPM_RANGE.0,
        NORMAL_RPM_RANGE.1
    );
    let _ = writeln!(
        out,
        "Torque: {} Nm (Normal: {:.0}-{:.0} Nm)",
        reading(snap.torque_nm, 1),
        NORMAL_TORQUE_RANGE_NM.0,
        NORMAL_TORQUE_RANGE_NM.1
    );
    let _ = writeln!(
        out,
        "Tool Wear: {} min (Limit: {:.0} min)",
        reading(snap.tool_wear_min, 0),
        cfg.tool_wear_limit_min
    );
    let _ = writeln!(out, "Failure label: {}", snap.failure_label());

    let verdicts = classification.verdicts();
    if verdicts.is_empty() {
        let _ = writeln!(out, "No anomalies detected. All sensors within thresholds.");
    } else {
        let _ = writeln!(out, "--- DETECTED ANOMALIES ({}) ---", verdicts.len());
        out.push_str(&verdict_details(verdicts));
    }
    out
}

/// One block per verdict: severity, label, code, description, action.
pub fn verdict_details(verdicts: &[FailureVerdict]) -> String {
    let mut out = String::new();
    for v in verdicts {
        let _ = writeln!(
            out,
            "[{}] {} ({})",
            v.severity.as_str(),
            v.kind.label(),
            v.code()
        );
        let _ = writeln!(out, "Description: {}", v.description);
        let _ = writeln!(out, "Action: {}", v.kind.recommended_action());
    }
    out
}

/// Compact single-line-per-verdict summary.
pub fn verdict_summary(verdicts: &[FailureVerdict]) -> String {
    if verdicts.is_empty() {
        return "No failures detected.".to_string();
    }
    verdicts
        .iter()
        .map(|v| {
            format!(
                "[{}] {} ({}): {}",
                v.severity.as_str(),
                v.kind.label(),
                v.code(),
                v.description
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}
