use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

/// Everything one renewal run needs to know, resolved from the CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    pub certbot_bin: String,
    /// Web servers probed in order; the first active one is stopped for the challenge.
    pub services: Vec<String>,
    pub command_timeout: Duration,
    pub recipient: Option<String>,
}

/// One block of `certbot certificates` output.
///
/// Fields the listing did not provide in the expected shape stay `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateRecord {
    pub name: String,
    pub domains: Option<String>,
    pub expiry: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenewalOutcome {
    pub needed_renewal: u32,
    pub successfully_renewed: u32,
}

/// States of a renewal run, in the order they are entered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStage {
    #[default]
    Started,
    PreSnapshot,
    ServicePaused,
    Renewed,
    ServiceResumed,
    PostSnapshot,
    Reported,
    Finished,
}

impl RunStage {
    pub fn as_str(self) -> &'static str {
        match self {
            RunStage::Started => "start",
            RunStage::PreSnapshot => "pre-renewal snapshot",
            RunStage::ServicePaused => "web server pause",
            RunStage::Renewed => "certificate renewal",
            RunStage::ServiceResumed => "web server restart",
            RunStage::PostSnapshot => "post-renewal snapshot",
            RunStage::Reported => "report",
            RunStage::Finished => "finish",
        }
    }
}

/// Human-readable progress lines for one run, in order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunLog {
    lines: Vec<String>,
}

impl RunLog {
    /// Print a progress line and keep it.
    pub fn record(&mut self, message: impl Into<String>) {
        let message = message.into();
        info!("{}", message);
        self.lines.push(message);
    }

    /// Keep raw tool output without echoing it at info level.
    pub fn append_raw(&mut self, text: &str) {
        debug!("{}", text);
        self.lines.push(text.to_string());
    }
}

#[cfg(test)]
impl RunLog {
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.lines.iter().any(|l| l.contains(needle))
    }
}

/// What one run produced. Discarded after the process prints it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RenewalRunResult {
    pub success: bool,
    pub hostname: String,
    pub timestamp: String,
    /// Last stage entered; on failure, the stage that failed.
    pub stage: RunStage,
    #[serde(default)]
    pub error: Option<String>,
    /// Web server stopped for the challenge, if one was running.
    #[serde(default)]
    pub paused_service: Option<String>,
    pub pre_snapshot: String,
    pub post_snapshot: String,
    pub renew_output: String,
    pub total_certificates: usize,
    /// `None` when the run failed before the counts could be derived.
    #[serde(default)]
    pub outcome: Option<RenewalOutcome>,
    pub notified: bool,
    pub log: RunLog,
}
