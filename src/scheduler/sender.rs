//! Per-destination sender.
//!
//! Each sender validates its destination once, then loops forever:
//! 1. Send the payload (file with caption if the image exists now, else text)
//! 2. On success wait the configured interval
//! 3. On a rate limit wait exactly the signaled duration and resend
//! 4. On an unclassified error wait the fixed backoff and resend
//! 5. On forbidden/banned/invalid peer stop for good
//!
//! Every wait and every transport call is raced against cancellation.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::state::format_wait;
use super::validator::{ChatValidator, ResolvedTarget};
use super::{SenderOutcome, SenderState};
use crate::config::{DEFAULT_RETRY_BACKOFF_SECS, Destination, MessagePayload};
use crate::telegram::{Transport, TransportError, truncate_for_log};

/// Tunables shared by every sender of one scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SenderSettings {
    /// Wait after an unclassified send error before resending.
    pub retry_backoff: Duration,
}

impl Default for SenderSettings {
    fn default() -> Self {
        Self {
            retry_backoff: Duration::from_secs(DEFAULT_RETRY_BACKOFF_SECS),
        }
    }
}

/// What to do after one send attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NextStep {
    Wait(Duration),
    Stop,
}

/// Drives the send cycle of a single destination.
pub struct DestinationSender<T: Transport> {
    destination: Destination,
    interval: Duration,
    transport: Arc<T>,
    payload: Arc<MessagePayload>,
    settings: SenderSettings,
    state: SenderState,
}

impl<T: Transport> DestinationSender<T> {
    /// Creates a sender in the `Validating` state.
    #[must_use]
    pub fn new(
        destination: Destination,
        interval: Duration,
        transport: Arc<T>,
        payload: Arc<MessagePayload>,
        settings: SenderSettings,
    ) -> Self {
        Self {
            destination,
            interval,
            transport,
            payload,
            settings,
            state: SenderState::Validating,
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> SenderState {
        self.state
    }

    /// Runs until the destination is skipped, stopped, or `cancel` fires.
    pub async fn run(&mut self, cancel: CancellationToken) -> SenderOutcome {
        let validator = ChatValidator::new(Arc::clone(&self.transport));

        let validated = tokio::select! {
            () = cancel.cancelled() => return SenderOutcome::Cancelled,
            result = validator.validate_destination(self.destination) => result,
        };

        let target = match validated {
            Ok(target) => target,
            Err(e) => {
                warn!(destination = %self.destination, "Skipping destination: {}", e.reason);
                self.transition(SenderState::Skipped);
                return SenderOutcome::Skipped;
            }
        };

        self.transition(SenderState::Active);
        info!(
            destination = %self.destination,
            "Sending every {}",
            format_wait(self.interval)
        );

        loop {
            let result = tokio::select! {
                () = cancel.cancelled() => return SenderOutcome::Cancelled,
                result = self.send_once(&target) => result,
            };

            let wait = match self.classify(result) {
                NextStep::Wait(wait) => wait,
                NextStep::Stop => return SenderOutcome::Stopped,
            };

            if !self.sleep(wait, &cancel).await {
                return SenderOutcome::Cancelled;
            }

            if self.state == SenderState::Retrying {
                self.transition(SenderState::Active);
            }
        }
    }

    /// Sends the payload once, attaching the image only if it exists right now.
    async fn send_once(&self, target: &ResolvedTarget<T::Entity>) -> Result<(), TransportError> {
        let text = self.payload.text();
        let topic_id = target.topic_id();

        if let Some(image) = self.payload.image_to_send().await {
            debug!(destination = %self.destination, "Sending image {}", image.display());
            return self
                .transport
                .send_file(&target.entity, image, text, topic_id)
                .await;
        }

        if let Some(missing) = self.payload.image_path() {
            debug!(
                destination = %self.destination,
                "Image {} not found, sending text only",
                missing.display()
            );
        }

        self.transport
            .send_text(&target.entity, text, topic_id)
            .await
    }

    /// Maps a send result to the next wait, updating state.
    fn classify(&mut self, result: Result<(), TransportError>) -> NextStep {
        match result {
            Ok(()) => {
                info!(
                    destination = %self.destination,
                    "Sent \"{}\"",
                    truncate_for_log(self.payload.text(), 30)
                );
                NextStep::Wait(self.interval)
            }
            Err(TransportError::RateLimited(seconds)) => {
                warn!(
                    destination = %self.destination,
                    "Rate limited, retrying the same message in {}",
                    format_wait(Duration::from_secs(u64::from(seconds)))
                );
                self.transition(SenderState::Retrying);
                NextStep::Wait(Duration::from_secs(u64::from(seconds)))
            }
            Err(e) if e.is_fatal() => {
                error!(destination = %self.destination, "Stopping destination: {}", e);
                self.transition(SenderState::Stopped);
                NextStep::Stop
            }
            Err(e) => {
                warn!(
                    destination = %self.destination,
                    "Send failed: {}. Retrying in {}",
                    e,
                    format_wait(self.settings.retry_backoff)
                );
                NextStep::Wait(self.settings.retry_backoff)
            }
        }
    }

    /// Sleeps for `wait`. Returns `false` if cancelled first.
    async fn sleep(&self, wait: Duration, cancel: &CancellationToken) -> bool {
        let next_at = chrono::TimeDelta::from_std(wait)
            .ok()
            .and_then(|delta| chrono::Local::now().checked_add_signed(delta))
            .map_or_else(String::new, |at| at.format(" (at %H:%M:%S)").to_string());

        info!(
            destination = %self.destination,
            "Waiting {}{} before next send",
            format_wait(wait),
            next_at
        );

        tokio::select! {
            () = cancel.cancelled() => false,
            () = tokio::time::sleep(wait) => true,
        }
    }

    fn transition(&mut self, next: SenderState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal transition {} -> {}",
            self.state,
            next
        );
        debug!(destination = %self.destination, "{} -> {}", self.state, next);
        self.state = next;
    }
}

impl<T: Transport> std::fmt::Debug for DestinationSender<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DestinationSender")
            .field("destination", &self.destination)
            .field("interval", &self.interval)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telegram::mock::MockTransport;

    fn sender(
        transport: &Arc<MockTransport>,
        raw: &str,
        interval_secs: u64,
    ) -> DestinationSender<MockTransport> {
        let payload = MessagePayload::new("hello", None).unwrap();
        DestinationSender::new(
            raw.parse().unwrap(),
            Duration::from_secs(interval_secs),
            Arc::clone(transport),
            Arc::new(payload),
            SenderSettings::default(),
        )
    }

    /// Runs `sender` for `secs` of virtual time, then cancels it.
    async fn run_for(
        mut sender: DestinationSender<MockTransport>,
        secs: u64,
    ) -> (SenderOutcome, SenderState) {
        let cancel = CancellationToken::new();
        let task = tokio::spawn({
            let cancel = cancel.clone();
            async move {
                let outcome = sender.run(cancel).await;
                (outcome, sender.state())
            }
        });
        tokio::time::sleep(Duration::from_secs(secs)).await;
        cancel.cancel();
        task.await.unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_waits_exact_interval() {
        let transport = Arc::new(MockTransport::new().with_chat(-100, false));
        let (outcome, state) = run_for(sender(&transport, "-100", 60), 150).await;

        assert_eq!(outcome, SenderOutcome::Cancelled);
        assert_eq!(state, SenderState::Active);

        let attempts = transport.attempts_for(-100);
        assert_eq!(attempts.len(), 3);
        for pair in attempts.windows(2) {
            assert_eq!(pair[1].at - pair[0].at, Duration::from_secs(60));
        }
        assert_eq!(transport.resolves(), vec![-100]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_waits_signaled_duration() {
        let transport = Arc::new(
            MockTransport::new()
                .with_chat(-100, false)
                .with_script(-100, [Err(TransportError::RateLimited(30))]),
        );
        let (_, state) = run_for(sender(&transport, "-100", 300), 100).await;

        let attempts = transport.attempts_for(-100);
        assert_eq!(attempts.len(), 2);
        assert_eq!(attempts[1].at - attempts[0].at, Duration::from_secs(30));
        assert_eq!(attempts[0].text, attempts[1].text);
        assert_eq!(state, SenderState::Active);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_error_uses_fixed_backoff() {
        let transport = Arc::new(
            MockTransport::new().with_chat(-100, false).with_script(
                -100,
                [
                    Err(TransportError::Other("timeout".to_owned())),
                    Err(TransportError::Other("timeout".to_owned())),
                ],
            ),
        );
        run_for(sender(&transport, "-100", 600), 630).await;

        let gaps: Vec<Duration> = transport
            .attempts_for(-100)
            .windows(2)
            .map(|pair| pair[1].at - pair[0].at)
            .collect();
        assert_eq!(
            gaps,
            vec![
                Duration::from_secs(10),
                Duration::from_secs(10),
                Duration::from_secs(600)
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_fatal_error_stops_sender() {
        for fatal in [
            TransportError::Forbidden("CHAT_WRITE_FORBIDDEN".to_owned()),
            TransportError::Banned("USER_BANNED_IN_CHANNEL".to_owned()),
            TransportError::InvalidPeer("PEER_ID_INVALID".to_owned()),
        ] {
            let transport = Arc::new(
                MockTransport::new()
                    .with_chat(-100, false)
                    .with_script(-100, [Ok(()), Err(fatal)]),
            );
            let mut sender = sender(&transport, "-100", 5);
            let outcome = sender.run(CancellationToken::new()).await;

            assert_eq!(outcome, SenderOutcome::Stopped);
            assert_eq!(sender.state(), SenderState::Stopped);

            tokio::time::sleep(Duration::from_secs(60)).await;
            assert_eq!(transport.attempts_for(-100).len(), 2);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_destination_is_skipped() {
        let transport = Arc::new(MockTransport::new().with_chat(-100, false));
        let mut sender = sender(&transport, "-100/4", 5);

        assert_eq!(sender.run(CancellationToken::new()).await, SenderOutcome::Skipped);
        assert_eq!(sender.state(), SenderState::Skipped);
        assert!(transport.attempts().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_interrupts_in_flight_send() {
        let transport = Arc::new(
            MockTransport::new()
                .with_chat(-100, false)
                .with_hanging_sends(-100),
        );
        let (outcome, _) = run_for(sender(&transport, "-100", 5), 3).await;

        assert_eq!(outcome, SenderOutcome::Cancelled);
        assert_eq!(transport.attempts_for(-100).len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_image_checked_on_every_attempt() {
        let image = tempfile::NamedTempFile::new().unwrap();
        let image_path = image.path().to_path_buf();
        let transport = Arc::new(MockTransport::new().with_chat(-100, false));
        let payload = MessagePayload::new("caption", Some(image_path.clone())).unwrap();
        let mut sender = DestinationSender::new(
            Destination::Chat(-100),
            Duration::from_secs(60),
            Arc::clone(&transport),
            Arc::new(payload),
            SenderSettings::default(),
        );

        let cancel = CancellationToken::new();
        let task = tokio::spawn({
            let cancel = cancel.clone();
            async move { sender.run(cancel).await }
        });

        tokio::time::sleep(Duration::from_secs(30)).await;
        drop(image);
        tokio::time::sleep(Duration::from_secs(40)).await;
        cancel.cancel();
        task.await.unwrap();

        let attempts = transport.attempts_for(-100);
        assert_eq!(attempts.len(), 2);
        assert_eq!(attempts[0].image.as_deref(), Some(image_path.as_path()));
        assert_eq!(attempts[0].text, "caption");
        assert_eq!(attempts[1].image, None);
        assert_eq!(attempts[1].text, "caption");
    }
}
