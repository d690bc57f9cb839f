//! Dispatch scheduler.
//!
//! Spawns one [`DestinationSender`] per configured destination into a task
//! group and waits for all of them. Destinations never share a lock or a
//! throttle; a failing or panicking sender only affects itself.
//!
//! The run ends when every sender is terminal (skipped or stopped), or when
//! the cancellation token fires, in which case every sender is unwound first.

use std::sync::Arc;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use super::{DestinationSender, SenderOutcome, SenderSettings};
use crate::config::{DestinationConfig, MessagePayload};
use crate::telegram::Transport;

/// Outcome counts for one scheduler run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerReport {
    /// Destinations that failed validation.
    pub skipped: usize,
    /// Destinations stopped by a fatal error.
    pub stopped: usize,
    /// Senders unwound by cancellation.
    pub cancelled: usize,
    /// Sender tasks that panicked.
    pub panicked: usize,
}

impl SchedulerReport {
    fn record(&mut self, outcome: SenderOutcome) {
        match outcome {
            SenderOutcome::Skipped => self.skipped += 1,
            SenderOutcome::Stopped => self.stopped += 1,
            SenderOutcome::Cancelled => self.cancelled += 1,
        }
    }

    /// Total number of senders accounted for.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.skipped + self.stopped + self.cancelled + self.panicked
    }
}

/// Periodic broadcast scheduler.
pub struct DispatchScheduler<T: Transport> {
    /// Shared transport (one authenticated session).
    transport: Arc<T>,

    /// Settings handed to every sender.
    settings: SenderSettings,
}

impl<T: Transport> DispatchScheduler<T> {
    /// Creates a new dispatch scheduler.
    #[must_use]
    pub fn new(transport: Arc<T>) -> Self {
        Self {
            transport,
            settings: SenderSettings::default(),
        }
    }

    /// Sets the sender settings.
    #[must_use]
    pub const fn with_settings(mut self, settings: SenderSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Runs one sender per destination until all are terminal or `cancel` fires.
    pub async fn run(
        &self,
        config: DestinationConfig,
        payload: MessagePayload,
        cancel: CancellationToken,
    ) -> SchedulerReport {
        info!("Dispatch scheduler started with {} destinations", config.len());

        let payload = Arc::new(payload);
        let mut senders = JoinSet::new();

        for (destination, interval) in config {
            let mut sender = DestinationSender::new(
                destination,
                interval,
                Arc::clone(&self.transport),
                Arc::clone(&payload),
                self.settings,
            );
            let cancel = cancel.child_token();
            senders.spawn(async move { sender.run(cancel).await });
        }

        let mut report = SchedulerReport::default();
        while let Some(joined) = senders.join_next().await {
            match joined {
                Ok(outcome) => report.record(outcome),
                Err(e) => {
                    error!("Sender task failed: {}", e);
                    report.panicked += 1;
                }
            }
        }

        info!(
            "Dispatch scheduler finished: {} skipped, {} stopped, {} cancelled, {} failed",
            report.skipped, report.stopped, report.cancelled, report.panicked
        );
        report
    }
}

impl<T: Transport> std::fmt::Debug for DispatchScheduler<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchScheduler")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}
