//! Bounded, cancellable polling for charges that settle asynchronously.
//!
//! Used when the next action is a redirect or an offline payment instruction
//! and no webhook is wired. The supervisor's attempt counter is separate from
//! any retry count inside the transport.

use std::future::Future;
use std::num::NonZeroU32;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
#[cfg(feature = "telemetry")]
use tracing::{debug, instrument, warn};

use crate::charge::ChargeState;
use crate::error::ChargeError;

/// Default delay between fetches.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);

/// Default number of fetches before giving up.
pub const DEFAULT_MAX_ATTEMPTS: NonZeroU32 = NonZeroU32::new(10).expect("non-zero literal");

/// Result of a polling run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// The charge reached a terminal status.
    Settled(ChargeState),
    /// The processor now asks the payer for a PIN, OTP or address, which
    /// polling cannot supply.
    ActionRequired(ChargeState),
    /// The attempt budget ran out before a terminal status was seen.
    ///
    /// This is the supervisor giving up, not a processor-reported
    /// [`ChargeStatus::Timeout`](crate::charge::ChargeStatus::Timeout).
    Exhausted {
        /// Fetches made.
        attempts: u32,
        /// Last state fetched successfully, if any.
        last: Option<ChargeState>,
    },
    /// The caller cancelled the run.
    Cancelled,
}

/// Re-fetches a charge at a fixed interval until it is terminal.
///
/// The first fetch happens immediately; each later one waits `interval` after
/// the previous tick. A failed fetch uses up an attempt. Polling also stops
/// as soon as a fetched state waits on customer input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollingSupervisor {
    interval: Duration,
    max_attempts: NonZeroU32,
}

impl Default for PollingSupervisor {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL, DEFAULT_MAX_ATTEMPTS)
    }
}

impl PollingSupervisor {
    /// Creates a supervisor.
    #[must_use]
    pub const fn new(interval: Duration, max_attempts: NonZeroU32) -> Self {
        Self {
            interval,
            max_attempts,
        }
    }

    /// Returns the delay between fetches.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Returns the attempt budget.
    #[must_use]
    pub const fn max_attempts(&self) -> NonZeroU32 {
        self.max_attempts
    }

    /// Polls `fetch` until it yields a terminal state or one that waits on the
    /// payer, the budget runs out, or `token` is cancelled.
    ///
    /// `fetch` receives the 1-based attempt number. Cancellation is observed
    /// while waiting for a tick and while a fetch is in flight; once cancelled,
    /// no further fetch starts and no terminal state is reported.
    #[cfg_attr(
        feature = "telemetry",
        instrument(
            name = "dcharge.polling.run",
            skip_all,
            fields(max_attempts = self.max_attempts.get(), interval = ?self.interval)
        )
    )]
    pub async fn run<F, Fut>(&self, token: &CancellationToken, mut fetch: F) -> PollOutcome
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<ChargeState, ChargeError>>,
    {
        // A zero period panics in tokio.
        let mut ticker = tokio::time::interval(self.interval.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last = None;

        for attempt in 1..=self.max_attempts.get() {
            tokio::select! {
                biased;
                () = token.cancelled() => return PollOutcome::Cancelled,
                _ = ticker.tick() => {}
            }

            let result = tokio::select! {
                biased;
                () = token.cancelled() => return PollOutcome::Cancelled,
                result = fetch(attempt) => result,
            };

            match result {
                Ok(state) if state.is_terminal() => {
                    #[cfg(feature = "telemetry")]
                    debug!(charge_id = %state.id, status = %state.status, attempt, "Charge settled");
                    return PollOutcome::Settled(state);
                }
                Ok(state) if state.next_action.requires_customer_input() => {
                    #[cfg(feature = "telemetry")]
                    debug!(
                        charge_id = %state.id,
                        next_action = state.next_action.type_name().unwrap_or("none"),
                        attempt,
                        "Charge now awaits customer input"
                    );
                    return PollOutcome::ActionRequired(state);
                }
                Ok(state) => {
                    #[cfg(feature = "telemetry")]
                    debug!(charge_id = %state.id, status = %state.status, attempt, "Charge not settled yet");
                    last = Some(state);
                }
                #[cfg_attr(not(feature = "telemetry"), allow(unused_variables))]
                Err(err) => {
                    #[cfg(feature = "telemetry")]
                    warn!(error = %err, attempt, "Charge poll fetch failed");
                }
            }
        }

        #[cfg(feature = "telemetry")]
        warn!(
            attempts = self.max_attempts.get(),
            "Charge did not settle within the polling budget"
        );
        PollOutcome::Exhausted {
            attempts: self.max_attempts.get(),
            last,
        }
    }
}
