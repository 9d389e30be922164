//! Renewal run lifecycle.
//!
//! One run walks `RunStage` in order: pre-renewal snapshot, web server pause,
//! `certbot renew`, web server restart, post-renewal snapshot, success report.
//! Any failure switches to the failure report, built from the pre-renewal snapshot.
//! `run` itself never fails; the outcome is in the returned result and the email sent.

use super::dispatch::dispatch_report;
use crate::engine::certbot::HOSTNAME;
use crate::engine::service::pause_first_active;
use crate::engine::CommandRunner;
use crate::model::{RenewalOutcome, RenewalRunResult, RunConfig, RunLog, RunStage};
use crate::notify::Notifier;
use crate::parse::{parse_certificates, parse_renewal};
use crate::report::{
    build_html_report, format_report_date, report_subject, RenewalCounts, ReportInput, ReportKind,
};
use anyhow::{Context, Result};
use time::OffsetDateTime;
use tracing::debug;

const UNKNOWN_HOST: &str = "unknown host";

/// Facts gathered so far. The failure report is built from whatever is here.
#[derive(Debug, Default)]
struct RunState {
    stage: RunStage,
    pre_snapshot: String,
    post_snapshot: String,
    renew_output: String,
    hostname: String,
    timestamp: String,
    paused_service: Option<String>,
    total_certificates: usize,
    outcome: Option<RenewalOutcome>,
    notified: bool,
}

fn local_now() -> OffsetDateTime {
    OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc())
}

pub(crate) struct RenewalOrchestrator<'a, R, N> {
    runner: &'a R,
    notifier: &'a N,
    cfg: &'a RunConfig,
}

impl<'a, R: CommandRunner, N: Notifier> RenewalOrchestrator<'a, R, N> {
    pub fn new(runner: &'a R, notifier: &'a N, cfg: &'a RunConfig) -> Self {
        Self {
            runner,
            notifier,
            cfg,
        }
    }

    pub async fn run(&self) -> RenewalRunResult {
        let mut log = RunLog::default();
        let mut state = RunState::default();
        log.record("SSL renewal started.");

        let error = match self.renew_and_report(&mut state, &mut log).await {
            Ok(()) => {
                log.record("SSL renewal finished successfully.");
                None
            }
            Err(e) => {
                let message = format!("{e:#}");
                log.record(format!(
                    "An error occurred during {}: {}",
                    state.stage.as_str(),
                    message
                ));
                self.report_failure(&mut state, &mut log).await;
                log.record("SSL renewal finished with errors.");
                Some(message)
            }
        };

        RenewalRunResult {
            success: error.is_none(),
            hostname: state.hostname,
            timestamp: state.timestamp,
            stage: state.stage,
            error,
            paused_service: state.paused_service,
            pre_snapshot: state.pre_snapshot,
            post_snapshot: state.post_snapshot,
            renew_output: state.renew_output,
            total_certificates: state.total_certificates,
            outcome: state.outcome,
            notified: state.notified,
            log,
        }
    }

    async fn list_certificates(&self) -> Result<String> {
        self.runner
            .run(&self.cfg.listing_command())
            .await
            .context("certificate listing failed")
    }

    async fn renew_and_report(&self, state: &mut RunState, log: &mut RunLog) -> Result<()> {
        state.stage = RunStage::PreSnapshot;
        log.record("Getting certificate status before renewal...");
        state.pre_snapshot = self.list_certificates().await?;

        state.stage = RunStage::ServicePaused;
        let paused = pause_first_active(self.runner, &self.cfg.services, log).await;
        state.paused_service = paused.as_ref().map(|svc| svc.name().to_string());

        state.stage = RunStage::Renewed;
        log.record("Running certbot renew...");
        let renewed = self.runner.run(&self.cfg.renew_command()).await;
        match &renewed {
            Ok(out) => log.append_raw(out),
            Err(e) => {
                if let Some(out) = e.stdout() {
                    log.append_raw(out);
                }
            }
        }

        // The web server comes back whatever certbot did.
        let resumed = match paused {
            Some(svc) => svc.resume(self.runner, log).await,
            None => Ok(()),
        };
        if let (Err(_), Err(e)) = (&renewed, &resumed) {
            log.record(format!("Failed to start the web server again: {e}"));
        }
        state.renew_output = renewed.context("certbot renew failed")?;

        state.stage = RunStage::ServiceResumed;
        resumed.context("web server restart failed")?;

        state.stage = RunStage::PostSnapshot;
        log.record("Getting certificate status after renewal...");
        state.post_snapshot = self.list_certificates().await?;

        state.stage = RunStage::Reported;
        log.record("Building HTML report...");
        state.hostname = self
            .runner
            .run(HOSTNAME)
            .await
            .context("hostname lookup failed")?;
        let now = local_now();
        state.timestamp = format_report_date(now);

        let outcome = parse_renewal(&state.renew_output);
        let listing = parse_certificates(&state.post_snapshot);
        state.outcome = Some(outcome);
        state.total_certificates = listing.total;

        let html = build_html_report(&ReportInput {
            kind: ReportKind::Success,
            hostname: &state.hostname,
            timestamp: &state.timestamp,
            total_certificates: listing.total,
            counts: RenewalCounts::Known(outcome),
            records: &listing.records,
        });
        state.notified = dispatch_report(
            self.notifier,
            self.cfg.recipient.as_deref(),
            &report_subject(ReportKind::Success, now),
            &html,
            log,
        )
        .await;

        state.stage = RunStage::Finished;
        Ok(())
    }

    async fn report_failure(&self, state: &mut RunState, log: &mut RunLog) {
        state.hostname = match self.runner.run(HOSTNAME).await {
            Ok(host) => host,
            Err(e) => {
                debug!("hostname lookup failed: {}", e);
                UNKNOWN_HOST.to_string()
            }
        };
        let now = local_now();
        state.timestamp = format_report_date(now);

        let listing = parse_certificates(&state.pre_snapshot);
        state.outcome = None;
        state.total_certificates = listing.total;

        let html = build_html_report(&ReportInput {
            kind: ReportKind::Failure,
            hostname: &state.hostname,
            timestamp: &state.timestamp,
            total_certificates: listing.total,
            counts: RenewalCounts::Unknown,
            records: &listing.records,
        });
        state.notified = dispatch_report(
            self.notifier,
            self.cfg.recipient.as_deref(),
            &report_subject(ReportKind::Failure, now),
            &html,
            log,
        )
        .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::test_support::{RecordingNotifier, ScriptedRunner};
    use std::time::Duration;

    const LISTING: &str = "certbot certificates";
    const RENEW: &str =
        "certbot renew --agree-tos --preferred-challenges http-01 --standalone --verbose";

    const ONE_CERT: &str = "\
Found the following certs:
  Certificate Name: example.org
    Domains: example.org www.example.org
    Expiry Date: 2024-04-01 10:00:00+00:00 (VALID: 89 days)
    Certificate Path: /etc/letsencrypt/live/example.org/fullchain.pem";

    const OLD_CERT: &str = "\
Found the following certs:
  Certificate Name: example.org
    Domains: example.org www.example.org
    Expiry Date: 2024-01-10 10:00:00+00:00 (VALID: 5 days)";

    const RENEWED: &str = "\
Processing /etc/letsencrypt/renewal/example.org.conf
Congratulations! Your certificate and chain have been saved at: /etc/letsencrypt/live/example.org/fullchain.pem";

    fn config(recipient: Option<&str>) -> RunConfig {
        RunConfig {
            certbot_bin: "certbot".into(),
            services: ["nginx", "httpd", "apache2"].map(String::from).to_vec(),
            command_timeout: Duration::from_secs(60),
            recipient: recipient.map(String::from),
        }
    }

    /// nginx running, both listings and hostname answer.
    fn host_with_nginx() -> ScriptedRunner {
        ScriptedRunner::new()
            .ok(LISTING, OLD_CERT)
            .ok(LISTING, ONE_CERT)
            .ok("systemctl is-active --quiet nginx", "")
            .ok("systemctl stop nginx", "")
            .ok("systemctl start nginx", "")
            .ok("hostname", "web-01")
    }

    #[tokio::test]
    async fn happy_path_sends_success_report() {
        let runner = host_with_nginx().ok(RENEW, RENEWED);
        let notifier = RecordingNotifier::default();
        let cfg = config(Some("ops@example.org"));

        let result = RenewalOrchestrator::new(&runner, &notifier, &cfg).run().await;

        assert!(result.success, "{:?}", result.error);
        assert_eq!(result.stage, RunStage::Finished);
        assert_eq!(result.hostname, "web-01");
        assert_eq!(result.paused_service.as_deref(), Some("nginx"));
        assert_eq!(result.total_certificates, 1);
        assert_eq!(
            result.outcome,
            Some(RenewalOutcome {
                needed_renewal: 0,
                successfully_renewed: 1,
            })
        );
        assert!(result.notified);
        assert_eq!(result.post_snapshot, ONE_CERT);

        assert_eq!(
            runner.calls(),
            [
                LISTING,
                "systemctl is-active --quiet nginx",
                "systemctl stop nginx",
                RENEW,
                "systemctl start nginx",
                LISTING,
                "hostname",
            ]
        );

        let sent = notifier.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "ops@example.org");
        assert!(sent[0].subject.starts_with("SSL Renewal Report - "));
        assert!(!sent[0].subject.contains("FAILED"));
        assert!(sent[0].html.contains("<b>Total certificates:</b> 1<br>"));
        assert!(sent[0].html.contains("<b>Total successfully updated:</b> 1</p>"));
        // Table shows the post-renewal state.
        assert!(sent[0].html.contains("VALID: 89 days"));

        assert!(result.log.contains("Congratulations!"));
        assert_eq!(
            result.log.lines().last().map(String::as_str),
            Some("SSL renewal finished successfully.")
        );
    }

    #[tokio::test]
    async fn renewal_failure_restarts_server_and_reports_pre_snapshot() {
        let runner = host_with_nginx().fail_with(
            RENEW,
            "Attempting to renew cert (example.org) from /etc/letsencrypt/renewal/example.org.conf",
            "Challenge failed for domain example.org",
        );
        let notifier = RecordingNotifier::default();
        let cfg = config(Some("ops@example.org"));

        let result = RenewalOrchestrator::new(&runner, &notifier, &cfg).run().await;

        assert!(!result.success);
        assert_eq!(result.stage, RunStage::Renewed);
        let error = result.error.as_deref().unwrap();
        assert!(error.starts_with("certbot renew failed"));
        assert!(error.contains("Challenge failed"));
        assert_eq!(result.outcome, None);
        assert_eq!(result.total_certificates, 1);

        assert_eq!(runner.count("systemctl start nginx"), 1);
        assert_eq!(runner.count(LISTING), 1);

        let sent = notifier.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].subject.ends_with(" - FAILED"));
        assert!(sent[0].html.contains("<h2>SSL Renewal Report - FAILED</h2>"));
        assert!(sent[0].html.contains("<b>Total needing updated:</b> Unknown<br>"));
        assert!(sent[0].html.contains("VALID: 5 days"));
        assert!(sent[0].html.contains("<b>Host:</b> web-01<br>"));

        assert!(result.log.contains("Attempting to renew cert"));
        assert!(result.log.contains("Starting nginx back up..."));
        assert_eq!(
            result.log.lines().last().map(String::as_str),
            Some("SSL renewal finished with errors.")
        );
    }

    #[tokio::test]
    async fn missing_recipient_skips_email_but_succeeds() {
        let runner = host_with_nginx().ok(RENEW, RENEWED);
        let notifier = RecordingNotifier::default();
        let cfg = config(None);

        let result = RenewalOrchestrator::new(&runner, &notifier, &cfg).run().await;

        assert!(result.success);
        assert!(!result.notified);
        assert!(notifier.sent().is_empty());
        assert!(result.log.contains("skipping email"));
    }

    #[tokio::test]
    async fn no_active_web_server_renews_without_pausing() {
        let runner = ScriptedRunner::new()
            .ok(LISTING, ONE_CERT)
            .ok(RENEW, "0 renewed, 1 unchanged, 0 failed")
            .ok("hostname", "web-01");
        let notifier = RecordingNotifier::default();
        let cfg = config(Some("ops@example.org"));

        let result = RenewalOrchestrator::new(&runner, &notifier, &cfg).run().await;

        assert!(result.success);
        assert_eq!(result.outcome, Some(RenewalOutcome::default()));
        assert_eq!(result.paused_service, None);
        assert!(runner.calls().iter().all(|c| !c.starts_with("systemctl st")));
    }

    #[tokio::test]
    async fn listing_failure_reports_empty_snapshot() {
        let runner = ScriptedRunner::new()
            .fail_with(LISTING, "", "certbot: command not found")
            .ok("hostname", "web-01");
        let notifier = RecordingNotifier::default();
        let cfg = config(Some("ops@example.org"));

        let result = RenewalOrchestrator::new(&runner, &notifier, &cfg).run().await;

        assert!(!result.success);
        assert_eq!(result.stage, RunStage::PreSnapshot);
        assert_eq!(result.total_certificates, 0);
        assert_eq!(runner.count(RENEW), 0);

        let sent = notifier.sent();
        assert!(sent[0].html.contains("<b>Total certificates:</b> 0<br>"));
    }

    #[tokio::test]
    async fn hostname_failure_falls_back_to_unknown_host() {
        let runner = ScriptedRunner::new()
            .ok(LISTING, ONE_CERT)
            .ok(RENEW, RENEWED)
            .fail("hostname");
        let notifier = RecordingNotifier::default();
        let cfg = config(Some("ops@example.org"));

        let result = RenewalOrchestrator::new(&runner, &notifier, &cfg).run().await;

        assert!(!result.success);
        assert_eq!(result.stage, RunStage::Reported);
        assert_eq!(result.hostname, "unknown host");
        let sent = notifier.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].html.contains("<b>Host:</b> unknown host<br>"));
    }

    #[tokio::test]
    async fn failure_email_error_is_swallowed() {
        let runner = host_with_nginx().fail(RENEW);
        let notifier = RecordingNotifier::failing();
        let cfg = config(Some("ops@example.org"));

        let result = RenewalOrchestrator::new(&runner, &notifier, &cfg).run().await;

        assert!(!result.success);
        assert!(!result.notified);
        assert_eq!(notifier.sent().len(), 1);
        assert!(result.log.contains("Failed to send report email"));
        assert!(result.log.contains("SSL renewal finished with errors."));
    }

    #[tokio::test]
    async fn success_email_error_keeps_run_successful() {
        let runner = host_with_nginx().ok(RENEW, RENEWED);
        let notifier = RecordingNotifier::failing();
        let cfg = config(Some("ops@example.org"));

        let result = RenewalOrchestrator::new(&runner, &notifier, &cfg).run().await;

        assert!(result.success);
        assert!(!result.notified);
        assert_eq!(notifier.sent().len(), 1);
    }

    #[tokio::test]
    async fn restart_failure_after_renewal_fails_the_run() {
        let runner = ScriptedRunner::new()
            .ok(LISTING, ONE_CERT)
            .ok("systemctl is-active --quiet nginx", "")
            .ok("systemctl stop nginx", "")
            .fail_with("systemctl start nginx", "", "Job for nginx.service failed")
            .ok(RENEW, RENEWED)
            .ok("hostname", "web-01");
        let notifier = RecordingNotifier::default();
        let cfg = config(Some("ops@example.org"));

        let result = RenewalOrchestrator::new(&runner, &notifier, &cfg).run().await;

        assert!(!result.success);
        assert_eq!(result.stage, RunStage::ServiceResumed);
        assert!(result.error.unwrap().starts_with("web server restart failed"));
        assert_eq!(result.renew_output, RENEWED);
    }

    #[tokio::test]
    async fn renewal_and_restart_both_failing_logs_both() {
        let runner = ScriptedRunner::new()
            .ok(LISTING, ONE_CERT)
            .ok("systemctl is-active --quiet nginx", "")
            .ok("systemctl stop nginx", "")
            .fail_with("systemctl start nginx", "", "Job for nginx.service failed")
            .fail(RENEW)
            .ok("hostname", "web-01");
        let notifier = RecordingNotifier::default();
        let cfg = config(Some("ops@example.org"));

        let result = RenewalOrchestrator::new(&runner, &notifier, &cfg).run().await;

        assert_eq!(result.stage, RunStage::Renewed);
        assert!(result.error.unwrap().starts_with("certbot renew failed"));
        assert!(result.log.contains("Failed to start the web server again"));
    }
}
