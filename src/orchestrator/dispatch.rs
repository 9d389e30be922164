//! Report dispatch: send to the configured recipient, or note why not.

use crate::model::RunLog;
use crate::notify::Notifier;
use tracing::warn;

/// Send `html` to `recipient`. Returns whether the message was accepted.
///
/// A missing recipient or a failed delivery is recorded in the run log and never
/// propagated.
pub(super) async fn dispatch_report<N: Notifier>(
    notifier: &N,
    recipient: Option<&str>,
    subject: &str,
    html: &str,
    log: &mut RunLog,
) -> bool {
    let Some(to) = recipient else {
        log.record("SMTP_TO_ADDRESS or SMTP_FROM_ADDRESS not set, skipping email.");
        return false;
    };

    log.record(format!("Sending report to {to}..."));
    match notifier.send(to, subject, html).await {
        Ok(()) => {
            log.record("Email report sent.");
            true
        }
        Err(e) => {
            warn!("report email to {} failed: {}", to, e);
            log.record(format!("Failed to send report email: {e}"));
            false
        }
    }
}
