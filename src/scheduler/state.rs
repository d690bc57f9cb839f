//! Sender lifecycle states.

use std::fmt;
use std::time::Duration;

/// Lifecycle of a single destination's sender.
///
/// ```text
/// Validating -> Active <-> Retrying
///     |           |
///     v           v
///  Skipped     Stopped
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SenderState {
    /// Resolving the destination before the first send.
    #[default]
    Validating,
    /// Sending and waiting the configured interval.
    Active,
    /// Waiting out a rate limit before repeating the same send.
    Retrying,
    /// Validation failed; no send was ever attempted.
    Skipped,
    /// A permission, ban or invalid-peer error ended the sender.
    Stopped,
}

impl SenderState {
    /// Whether the sender will never act again.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Skipped | Self::Stopped)
    }

    /// Whether moving from `self` to `next` is a legal transition.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Validating, Self::Active | Self::Skipped)
                | (Self::Active, Self::Active | Self::Retrying | Self::Stopped)
                | (Self::Retrying, Self::Active | Self::Stopped)
        )
    }
}

impl fmt::Display for SenderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Validating => "validating",
            Self::Active => "active",
            Self::Retrying => "retrying",
            Self::Skipped => "skipped",
            Self::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// How a sender task ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SenderOutcome {
    /// The destination failed validation.
    Skipped,
    /// The destination was stopped by a fatal transport error.
    Stopped,
    /// The run was cancelled from outside.
    Cancelled,
}

/// Formats a wait for display, e.g. `1h 2m 5s`.
#[must_use]
pub fn format_wait(wait: Duration) -> String {
    let total = wait.as_secs();
    let (hours, minutes, seconds) = (total / 3600, (total % 3600) / 60, total % 60);

    if hours > 0 {
        format!("{hours}h {minutes}m {seconds}s")
    } else if minutes > 0 {
        format!("{minutes}m {seconds}s")
    } else {
        format!("{seconds}s")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_state() {
        assert_eq!(SenderState::default(), SenderState::Validating);
        assert!(!SenderState::default().is_terminal());
    }

    #[test]
    fn test_terminal_states() {
        assert!(SenderState::Skipped.is_terminal());
        assert!(SenderState::Stopped.is_terminal());
        assert!(!SenderState::Retrying.is_terminal());
    }

    #[test]
    fn test_transitions() {
        assert!(SenderState::Validating.can_transition_to(SenderState::Active));
        assert!(SenderState::Validating.can_transition_to(SenderState::Skipped));
        assert!(SenderState::Active.can_transition_to(SenderState::Retrying));
        assert!(SenderState::Retrying.can_transition_to(SenderState::Active));
        assert!(SenderState::Active.can_transition_to(SenderState::Stopped));

        assert!(!SenderState::Validating.can_transition_to(SenderState::Stopped));
        assert!(!SenderState::Skipped.can_transition_to(SenderState::Active));
        assert!(!SenderState::Stopped.can_transition_to(SenderState::Active));
    }

    #[test]
    fn test_format_wait() {
        assert_eq!(format_wait(Duration::from_secs(45)), "45s");
        assert_eq!(format_wait(Duration::from_secs(300)), "5m 0s");
        assert_eq!(format_wait(Duration::from_secs(3725)), "1h 2m 5s");
    }
}
