//! Tolerant parsers for certbot's human-oriented output.
//!
//! Lines that don't have the expected shape are skipped or leave fields unset;
//! parsing never fails.

mod certificates;
mod renewal;

pub(crate) use certificates::parse_certificates;
pub(crate) use renewal::parse_renewal;
