//! `certbot certificates` listing parser.

use crate::model::CertificateRecord;
use regex::Regex;
use std::sync::OnceLock;

const NAME_MARKER: &str = "Certificate Name:";
const DOMAINS_MARKER: &str = "Domains:";
const EXPIRY_MARKER: &str = "Expiry Date:";

/// Records in listing order, plus the marker count they must agree with.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct CertificateReport {
    pub records: Vec<CertificateRecord>,
    pub total: usize,
}

/// How a single listing line contributes to the current record.
#[derive(Debug, PartialEq, Eq)]
enum ListingLine<'a> {
    Name(&'a str),
    Domains(&'a str),
    /// `None` when the line does not have the `<date> <time> (<status>)` shape.
    Expiry(Option<(&'a str, &'a str)>),
    Other,
}

fn expiry_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"Expiry Date:\s*([^ ]+[ ][^ ]+)[ ]+\(([^)]*)\)")
            .expect("expiry pattern is valid")
    })
}

/// Text between the first and second colon, trimmed.
fn field_value(line: &str) -> &str {
    line.split(':').nth(1).unwrap_or_default().trim()
}

fn classify(line: &str) -> ListingLine<'_> {
    if line.contains(NAME_MARKER) {
        ListingLine::Name(field_value(line))
    } else if line.contains(DOMAINS_MARKER) {
        ListingLine::Domains(field_value(line))
    } else if line.contains(EXPIRY_MARKER) {
        let parsed = expiry_pattern().captures(line).map(|caps| {
            let (_, [expiry, status]) = caps.extract();
            (expiry, status)
        });
        ListingLine::Expiry(parsed)
    } else {
        ListingLine::Other
    }
}

/// Count `Certificate Name:` markers in a listing.
pub(crate) fn count_certificates(listing: &str) -> usize {
    listing.lines().filter(|l| l.contains(NAME_MARKER)).count()
}

pub(crate) fn parse_certificates(listing: &str) -> CertificateReport {
    let mut records = Vec::new();
    let mut pending: Option<CertificateRecord> = None;

    for line in listing.lines() {
        match classify(line) {
            ListingLine::Name(name) => {
                records.extend(pending.take());
                pending = Some(CertificateRecord {
                    name: name.to_string(),
                    ..Default::default()
                });
            }
            ListingLine::Domains(domains) => {
                if let Some(rec) = pending.as_mut() {
                    rec.domains = Some(domains.to_string());
                }
            }
            ListingLine::Expiry(Some((expiry, status))) => {
                if let Some(rec) = pending.as_mut() {
                    rec.expiry = Some(expiry.to_string());
                    rec.status = Some(status.to_string());
                }
            }
            ListingLine::Expiry(None) | ListingLine::Other => {}
        }
    }
    records.extend(pending);

    CertificateReport {
        records,
        total: count_certificates(listing),
    }
}
