//! Command lines for certbot, systemd and the host name lookup.

use crate::model::RunConfig;

pub(crate) const HOSTNAME: &str = "hostname";

/// Flags for an unattended renewal with a standalone HTTP-01 listener on port 80.
const RENEW_FLAGS: &str = "--agree-tos --preferred-challenges http-01 --standalone --verbose";

impl RunConfig {
    pub fn listing_command(&self) -> String {
        format!("{} certificates", self.certbot_bin)
    }

    pub fn renew_command(&self) -> String {
        format!("{} renew {RENEW_FLAGS}", self.certbot_bin)
    }
}

pub(crate) fn is_active_command(service: &str) -> String {
    format!("systemctl is-active --quiet {service}")
}

pub(crate) fn stop_command(service: &str) -> String {
    format!("systemctl stop {service}")
}

pub(crate) fn start_command(service: &str) -> String {
    format!("systemctl start {service}")
}
