//! `certbot renew` output parser.

use crate::model::RenewalOutcome;
use regex::Regex;
use std::sync::OnceLock;

const RENEWED_MARKERS: [&str; 2] = [
    "Successfully renewed certificate",
    "Congratulations! Your certificate and chain have been saved",
];
const NEEDS_RENEWAL_MARKERS: [&str; 2] = ["Renewing an existing certificate", "Attempting to renew cert"];

/// What a renewal output line says about the run.
#[derive(Debug, Default, PartialEq, Eq)]
struct RenewalLine {
    renewed: bool,
    needs_renewal: bool,
    /// Count from a `N renewed, M unchanged, ...` summary line.
    summary: Option<u32>,
}

fn summary_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(\d+)\s+renewed").expect("summary pattern is valid")
    })
}

fn classify(line: &str) -> RenewalLine {
    let summary = if line.contains("renewed,") && line.contains("unchanged,") {
        summary_pattern()
            .captures(line)
            .and_then(|caps| caps[1].parse().ok())
    } else {
        None
    };
    RenewalLine {
        renewed: RENEWED_MARKERS.iter().any(|m| line.contains(m)),
        needs_renewal: NEEDS_RENEWAL_MARKERS.iter().any(|m| line.contains(m)),
        summary,
    }
}

/// Count renewals from per-certificate lines, falling back to the summary line.
///
/// Output with neither is a run where nothing was due, not an error.
pub(crate) fn parse_renewal(output: &str) -> RenewalOutcome {
    let lines: Vec<RenewalLine> = output.lines().map(classify).collect();

    let mut outcome = RenewalOutcome {
        needed_renewal: lines.iter().filter(|l| l.needs_renewal).count() as u32,
        successfully_renewed: lines.iter().filter(|l| l.renewed).count() as u32,
    };

    if outcome == RenewalOutcome::default() {
        // Last summary line wins; a renewed count implies each one needed renewal.
        if let Some(n) = lines.iter().rev().find_map(|l| l.summary) {
            outcome.successfully_renewed = n;
            outcome.needed_renewal = n;
        }
    }
    outcome
}
