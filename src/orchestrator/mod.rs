//! Renewal run orchestration.
//!
//! This module owns the run lifecycle (snapshot, web server pause, renew, restart,
//! snapshot) and the final report dispatch. The CLI layer builds the collaborators
//! and calls into [`RenewalOrchestrator::run`].

mod controller;
mod dispatch;
#[cfg(test)]
pub(crate) mod test_support;

pub(crate) use controller::RenewalOrchestrator;
