//! Web server pause/resume around the standalone challenge listener.

use super::certbot::{is_active_command, start_command, stop_command};
use super::{CommandError, CommandRunner};
use crate::model::RunLog;
use tracing::{debug, error, warn};

/// A web server stopped to free port 80.
///
/// Hand it back with [`PausedService::resume`]. If the guard is dropped without
/// that (panic, cancelled future) the service is started synchronously from `Drop`.
#[must_use = "a paused service must be resumed"]
#[derive(Debug)]
pub(crate) struct PausedService {
    name: String,
    resumed: bool,
}

impl PausedService {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn resume<R: CommandRunner>(
        mut self,
        runner: &R,
        log: &mut RunLog,
    ) -> Result<(), CommandError> {
        self.resumed = true;
        log.record(format!("Starting {} back up...", self.name));
        runner.run(&start_command(&self.name)).await.map(|_| ())
    }
}

impl Drop for PausedService {
    fn drop(&mut self) {
        if self.resumed {
            return;
        }
        warn!("{} was never restarted; starting it now", self.name);
        match std::process::Command::new("systemctl")
            .args(["start", &self.name])
            .status()
        {
            Ok(status) if status.success() => {}
            Ok(status) => error!("systemctl start {} exited with {}", self.name, status),
            Err(e) => error!("systemctl start {} failed: {}", self.name, e),
        }
    }
}

/// Stop the first active service among `candidates`.
///
/// Inactive or missing services, and services that refuse to stop, are skipped.
pub(crate) async fn pause_first_active<R: CommandRunner>(
    runner: &R,
    candidates: &[String],
    log: &mut RunLog,
) -> Option<PausedService> {
    for svc in candidates {
        if let Err(e) = runner.run(&is_active_command(svc)).await {
            debug!("{} not active: {}", svc, e);
            continue;
        }
        log.record(format!("Stopping {svc} to free port 80..."));
        match runner.run(&stop_command(svc)).await {
            Ok(_) => {
                return Some(PausedService {
                    name: svc.clone(),
                    resumed: false,
                })
            }
            Err(e) => debug!("could not stop {}: {}", svc, e),
        }
    }
    None
}
