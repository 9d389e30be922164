//! HTML report builder for the status email.
//!
//! Success and failure reports share one layout; only the accent colour,
//! heading suffix and renewal counts differ. Text is interpolated as-is.

use crate::model::{CertificateRecord, RenewalOutcome};
use std::fmt::Write;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::OffsetDateTime;

const REPORT_TITLE: &str = "SSL Renewal Report";

/// `Fri Jan 05 2024 15:04:09 GMT+0000`
const BODY_DATE: &[BorrowedFormatItem<'static>] = format_description!(
    "[weekday repr:short] [month repr:short] [day] [year] [hour]:[minute]:[second] GMT[offset_hour sign:mandatory][offset_minute]"
);

/// `Jan 5, 2024, 3:04 PM`
const SUBJECT_DATE: &[BorrowedFormatItem<'static>] = format_description!(
    "[month repr:short] [day padding:none], [year], [hour repr:12 padding:none]:[minute] [period]"
);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReportKind {
    Success,
    Failure,
}

impl ReportKind {
    fn accent(self) -> &'static str {
        match self {
            ReportKind::Success => "#2a5d84",
            ReportKind::Failure => "#d84315",
        }
    }

    fn title(self) -> String {
        match self {
            ReportKind::Success => REPORT_TITLE.to_string(),
            ReportKind::Failure => format!("{REPORT_TITLE} - FAILED"),
        }
    }
}

/// Renewal counts, or the placeholder shown when the run failed before they were known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RenewalCounts {
    Known(RenewalOutcome),
    Unknown,
}

pub(crate) struct ReportInput<'a> {
    pub kind: ReportKind,
    pub hostname: &'a str,
    pub timestamp: &'a str,
    pub total_certificates: usize,
    pub counts: RenewalCounts,
    pub records: &'a [CertificateRecord],
}

/// Date as shown in the report header.
pub(crate) fn format_report_date(at: OffsetDateTime) -> String {
    at.format(BODY_DATE).unwrap_or_else(|_| at.to_string())
}

/// Email subject for a report generated at `at`.
pub(crate) fn report_subject(kind: ReportKind, at: OffsetDateTime) -> String {
    let date = at.format(SUBJECT_DATE).unwrap_or_else(|_| at.date().to_string());
    match kind {
        ReportKind::Success => format!("{REPORT_TITLE} - {date}"),
        ReportKind::Failure => format!("{REPORT_TITLE} - {date} - FAILED"),
    }
}

fn render_table(records: &[CertificateRecord]) -> String {
    let mut html = String::from(
        r#"<table border="1" cellpadding="4" cellspacing="0" style="border-collapse:collapse;">"#,
    );
    html.push_str("<tr><th>Status</th><th>Certificate Name</th><th>Domains</th><th>Expiry Date</th></tr>");
    for rec in records {
        let _ = write!(
            html,
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
            rec.status.as_deref().unwrap_or_default(),
            rec.name,
            rec.domains.as_deref().unwrap_or_default(),
            rec.expiry.as_deref().unwrap_or_default(),
        );
    }
    html.push_str("</table>");
    html
}

pub(crate) fn build_html_report(input: &ReportInput<'_>) -> String {
    let accent = input.kind.accent();
    let (needing, renewed) = match input.counts {
        RenewalCounts::Known(o) => (o.needed_renewal.to_string(), o.successfully_renewed.to_string()),
        RenewalCounts::Unknown => ("Unknown".to_string(), "0".to_string()),
    };

    format!(
        r#"<!DOCTYPE html>
<html><head><meta charset="UTF-8">
<style>
  body {{ font-family:Arial,sans-serif; color:#222; }}
  h2 {{ color:{accent}; }}
  h3 {{ color:{accent}; }}
  table {{ margin-bottom:24px; }}
  th {{ background:#f0f4f8; }}
  td,th {{ padding:6px 12px; }}
</style>
</head><body>
  <h2>{title}</h2>
  <p><b>Host:</b> {host}<br><b>Date:</b> {date}</p>

  <p><b>Total certificates:</b> {total}<br>
  <b>Total needing updated:</b> {needing}<br>
  <b>Total successfully updated:</b> {renewed}</p>

  <h3>Certificate Status</h3>
  {table}
</body></html>
"#,
        title = input.kind.title(),
        host = input.hostname,
        date = input.timestamp,
        total = input.total_certificates,
        table = render_table(input.records),
    )
}
