use crate::engine::ShellRunner;
use crate::model::{RenewalRunResult, RunConfig};
use crate::notify::{self, MailConfig, SmtpNotifier};
use crate::orchestrator::RenewalOrchestrator;
use anyhow::{Context, Result};
use clap::Parser;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Parser, Clone)]
#[command(
    name = "certbot-renew-report",
    version,
    about = "Renew certbot certificates around a running web server and email a report"
)]
pub struct Cli {
    /// Report recipient
    #[arg(long, env = "SMTP_TO_ADDRESS")]
    pub to: Option<String>,

    /// Fallback report recipient, used when --to is not set
    #[arg(long, env = "SMTP_FROM_ADDRESS")]
    pub from_address: Option<String>,

    /// SMTP server host
    #[arg(long, env = "MAIL_HOST")]
    pub mail_host: Option<String>,

    /// SMTP server port
    #[arg(long, env = "MAIL_PORT", default_value_t = 465)]
    pub mail_port: u16,

    /// SMTP username, also used as the sender address
    #[arg(long, env = "MAIL_USERNAME")]
    pub mail_username: Option<String>,

    /// SMTP password
    #[arg(long, env = "MAIL_PASSWORD", hide_env_values = true)]
    pub mail_password: Option<String>,

    /// `ssl` for implicit TLS (usually port 465); anything else uses STARTTLS
    #[arg(long, env = "MAIL_ENCRYPTION")]
    pub mail_encryption: Option<String>,

    /// Sender display name
    #[arg(long, env = "MAIL_FROM_NAME")]
    pub mail_from_name: Option<String>,

    /// SMTP dispatch timeout
    #[arg(long, env = "MAIL_TIMEOUT", default_value = "60s")]
    pub mail_timeout: humantime::Duration,

    /// certbot executable
    #[arg(long = "certbot", env = "CERTBOT_BIN", default_value = "certbot")]
    pub certbot_bin: String,

    /// Web servers to stop during renewal, tried in order; the first active one is stopped
    #[arg(
        long,
        env = "RENEW_SERVICES",
        value_delimiter = ',',
        default_value = "nginx,httpd,apache2"
    )]
    pub services: Vec<String>,

    /// Upper bound for each external command
    #[arg(long, env = "RENEW_COMMAND_TIMEOUT", default_value = "10m")]
    pub command_timeout: humantime::Duration,

    /// Print the run result as JSON on stdout when finished
    #[arg(long)]
    pub json: bool,

    /// Send a test email to MAIL_USERNAME and exit
    #[arg(long)]
    pub send_test_email: bool,

    /// Default log filter when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

/// First non-empty address of `to` and `fallback`.
pub fn resolve_recipient(to: Option<&str>, fallback: Option<&str>) -> Option<String> {
    [to, fallback]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|a| !a.is_empty())
        .map(String::from)
}

/// Build a `RunConfig` from CLI arguments.
pub fn build_config(args: &Cli) -> RunConfig {
    RunConfig {
        certbot_bin: args.certbot_bin.clone(),
        services: args
            .services
            .iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        command_timeout: Duration::from(args.command_timeout),
        recipient: resolve_recipient(args.to.as_deref(), args.from_address.as_deref()),
    }
}

pub fn build_mail_config(args: &Cli) -> MailConfig {
    MailConfig {
        host: args.mail_host.clone(),
        port: args.mail_port,
        username: args.mail_username.clone(),
        password: args.mail_password.clone(),
        encryption: args.mail_encryption.clone(),
        from_name: args.mail_from_name.clone(),
        timeout: Duration::from(args.mail_timeout),
    }
}

pub async fn run(args: Cli) -> Result<()> {
    let notifier = SmtpNotifier::from_config(&build_mail_config(&args))?;

    if args.send_test_email {
        notify::send_test_email(&notifier, args.mail_username.as_deref()).await;
        return Ok(());
    }

    let cfg = build_config(&args);
    if args.to.is_some() && args.from_address.is_some() {
        info!("both SMTP_TO_ADDRESS and SMTP_FROM_ADDRESS set; reporting to SMTP_TO_ADDRESS");
    }
    if cfg.services.is_empty() {
        warn!("no web servers configured; port 80 must already be free");
    }

    let runner = ShellRunner::new(cfg.command_timeout);
    let result = RenewalOrchestrator::new(&runner, &notifier, &cfg).run().await;

    if args.json {
        print_json(&result)?;
    }
    Ok(())
}

fn print_json(result: &RenewalRunResult) -> Result<()> {
    let out = serde_json::to_string_pretty(result).context("serialize run result")?;
    println!("{out}");
    Ok(())
}
