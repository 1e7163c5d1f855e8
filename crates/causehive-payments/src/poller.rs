//! Payment Status Poller
//!
//! Resolves a payment by reference after the donor leaves for the hosted
//! payment page. Polling and the countdown are one state machine advanced by
//! a single one-second tick:
//!
//! ```text
//!            ┌──────────────┐  verify: success   ┌─────────┐
//!   start ──▶│   checking   │───────────────────▶│ success │──▶ clear cart,
//!            └──────┬───────┘                    └─────────┘    redirect
//!                   │ verify: other / error           ▲
//!                   ▼                                 │
//!            ┌──────────────┐  verify: success        │
//!            │   pending    │─────────────────────────┘
//!            └──────┬───────┘
//!                   │ verify: failed/reversed, or countdown reaches zero
//!                   ▼
//!              ┌─────────┐
//!              │ failed  │
//!              └─────────┘
//! ```
//!
//! A verification answer is judged by when it arrives: anything arriving at
//! or after the deadline loses to the timeout.

use std::sync::Arc;
use std::time::Duration;

use causehive_core::cart::CartHandle;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::checkout::success_path;
use crate::error::Result;
use crate::gateway::{PaymentGateway, Verification};

pub const MSG_CHECKING: &str = "Checking payment status...";
pub const MSG_WAITING: &str = "Waiting for payment confirmation...";
pub const MSG_SUCCESS: &str = "Payment completed successfully!";
pub const MSG_TIMEOUT: &str = "Payment timeout. Please try again.";
const MSG_DECLINED: &str = "Payment was not completed.";

/// Payment status as shown to the donor
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Checking,
    Pending,
    Success,
    Failed,
}

impl PaymentStatus {
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Failed)
    }
}

/// Why a payment ended in `failed`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum FailureReason {
    /// No terminal answer before the countdown ran out; offer "try again"
    Timeout,
    /// The gateway reported the payment failed or was reversed
    Declined(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PollerConfig {
    pub poll_interval: Duration,
    /// Total budget before the payment is declared timed out
    pub timeout: Duration,
    pub redirect_delay: Duration,
    pub tick: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            timeout: Duration::from_secs(300),
            redirect_delay: Duration::from_secs(3),
            tick: Duration::from_secs(1),
        }
    }
}

impl PollerConfig {
    /// Read `CAUSEHIVE_POLL_INTERVAL_SECS` and `CAUSEHIVE_PAYMENT_TIMEOUT_SECS`
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            poll_interval: secs_from_env("CAUSEHIVE_POLL_INTERVAL_SECS").unwrap_or(defaults.poll_interval),
            timeout: secs_from_env("CAUSEHIVE_PAYMENT_TIMEOUT_SECS").unwrap_or(defaults.timeout),
            ..defaults
        }
    }
}

fn secs_from_env(key: &str) -> Option<Duration> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Some(Duration::from_secs(secs)),
        _ => {
            tracing::warn!(key, value = %raw, "Ignoring invalid duration");
            None
        }
    }
}

/// Format a countdown as `m:ss`
pub fn format_remaining(remaining: Duration) -> String {
    let secs = remaining.as_secs();
    format!("{}:{:02}", secs / 60, secs % 60)
}

/// What the driver should do after a tick
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickAction {
    Idle,
    Verify,
    TimedOut,
}

/// Point-in-time view of a poll, published to subscribers
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PollSnapshot {
    pub reference: String,
    pub status: PaymentStatus,
    pub message: String,
    pub failure: Option<FailureReason>,
    pub remaining_secs: u64,
    /// Countdown as `m:ss`
    pub remaining: String,
    pub attempts: u32,
    pub verification: Option<Verification>,
    /// Set once the redirect delay after success has passed
    pub redirect_to: Option<String>,
}

/// The poll/countdown state machine
#[derive(Debug)]
pub struct PaymentPoller {
    reference: String,
    config: PollerConfig,
    status: PaymentStatus,
    message: String,
    failure: Option<FailureReason>,
    elapsed: Duration,
    last_poll: Option<Duration>,
    attempts: u32,
    verification: Option<Verification>,
}

impl PaymentPoller {
    pub fn new(reference: impl Into<String>, config: PollerConfig) -> Self {
        Self {
            reference: reference.into(),
            config,
            status: PaymentStatus::Checking,
            message: MSG_CHECKING.into(),
            failure: None,
            elapsed: Duration::ZERO,
            last_poll: None,
            attempts: 0,
            verification: None,
        }
    }

    pub fn reference(&self) -> &str {
        &self.reference
    }

    pub const fn config(&self) -> &PollerConfig {
        &self.config
    }

    pub const fn status(&self) -> PaymentStatus {
        self.status
    }

    pub const fn failure(&self) -> Option<&FailureReason> {
        self.failure.as_ref()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn remaining(&self) -> Duration {
        self.config.timeout.saturating_sub(self.elapsed)
    }

    /// Advance the clock to `elapsed` since the poll started
    pub fn tick(&mut self, elapsed: Duration) -> TickAction {
        if self.status.is_terminal() {
            return TickAction::Idle;
        }
        self.elapsed = elapsed.max(self.elapsed);

        if self.elapsed >= self.config.timeout {
            self.time_out();
            return TickAction::TimedOut;
        }

        let due = self
            .last_poll
            .is_none_or(|last| self.elapsed.saturating_sub(last) >= self.config.poll_interval);
        if due {
            self.last_poll = Some(self.elapsed);
            self.attempts += 1;
            TickAction::Verify
        } else {
            TickAction::Idle
        }
    }

    /// Fold in a verification answer that arrived at `elapsed`
    pub fn apply_verification(&mut self, result: Result<Verification>, elapsed: Duration) -> PaymentStatus {
        if self.status.is_terminal() {
            return self.status;
        }
        self.elapsed = elapsed.max(self.elapsed);

        if self.elapsed >= self.config.timeout {
            if matches!(&result, Ok(v) if v.status.is_success()) {
                tracing::warn!(reference = %self.reference, "Payment confirmed after the deadline, keeping timeout");
            }
            self.time_out();
            return self.status;
        }

        match result {
            Ok(verification) if verification.status.is_success() => {
                tracing::info!(
                    reference = %self.reference,
                    amount = %verification.amount,
                    currency = %verification.currency,
                    "Payment confirmed"
                );
                self.status = PaymentStatus::Success;
                self.message = MSG_SUCCESS.into();
                self.verification = Some(verification);
            }
            Ok(verification) if verification.status.is_failure() => {
                let reason = verification
                    .gateway_response
                    .clone()
                    .unwrap_or_else(|| MSG_DECLINED.into());
                tracing::warn!(reference = %self.reference, reason = %reason, "Payment failed");
                self.status = PaymentStatus::Failed;
                self.message = reason.clone();
                self.failure = Some(FailureReason::Declined(reason));
                self.verification = Some(verification);
            }
            Ok(verification) => {
                tracing::debug!(reference = %self.reference, status = ?verification.status, "Payment not confirmed yet");
                self.status = PaymentStatus::Pending;
                self.message = MSG_WAITING.into();
                self.verification = Some(verification);
            }
            Err(e) => {
                tracing::warn!(reference = %self.reference, error = %e, "Verification failed, retrying on next poll");
                self.status = PaymentStatus::Pending;
                self.message = MSG_CHECKING.into();
            }
        }
        self.status
    }

    fn time_out(&mut self) {
        tracing::warn!(reference = %self.reference, attempts = self.attempts, "Payment timed out");
        self.status = PaymentStatus::Failed;
        self.message = MSG_TIMEOUT.into();
        self.failure = Some(FailureReason::Timeout);
    }

    pub fn snapshot(&self) -> PollSnapshot {
        let remaining = self.remaining();
        PollSnapshot {
            reference: self.reference.clone(),
            status: self.status,
            message: self.message.clone(),
            failure: self.failure.clone(),
            remaining_secs: remaining.as_secs(),
            remaining: format_remaining(remaining),
            attempts: self.attempts,
            verification: self.verification.clone(),
            redirect_to: None,
        }
    }
}

/// Owns a running poll; dropping the handle cancels it
pub struct PollerHandle {
    reference: String,
    snapshots: watch::Receiver<PollSnapshot>,
    task: JoinHandle<()>,
}

impl PollerHandle {
    pub fn reference(&self) -> &str {
        &self.reference
    }

    pub fn snapshot(&self) -> PollSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<PollSnapshot> {
        self.snapshots.clone()
    }

    /// Stop polling and the countdown together
    pub fn cancel(&self) {
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Start polling `reference` on the current runtime
pub fn spawn_poller(
    gateway: Arc<dyn PaymentGateway>,
    cart: CartHandle,
    reference: impl Into<String>,
    config: PollerConfig,
) -> PollerHandle {
    let reference = reference.into();
    let machine = PaymentPoller::new(reference.clone(), config);
    let (tx, snapshots) = watch::channel(machine.snapshot());

    tracing::info!(reference = %reference, gateway = gateway.name(), "Polling payment status");
    let task = tokio::spawn(run(machine, gateway, cart, tx));

    PollerHandle {
        reference,
        snapshots,
        task,
    }
}

async fn run(
    mut machine: PaymentPoller,
    gateway: Arc<dyn PaymentGateway>,
    cart: CartHandle,
    tx: watch::Sender<PollSnapshot>,
) {
    let config = *machine.config();
    let reference = machine.reference().to_string();
    let started = Instant::now();
    let deadline = started + config.timeout;

    let mut ticker = time::interval(config.tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        if machine.tick(started.elapsed()) == TickAction::Verify {
            tokio::select! {
                result = gateway.verify(&reference) => {
                    machine.apply_verification(result, started.elapsed());
                }
                () = time::sleep_until(deadline) => {
                    machine.tick(started.elapsed());
                }
            }
        }

        if machine.status() == PaymentStatus::Success {
            cart.write().await.clear();
        }
        tx.send_replace(machine.snapshot());

        if machine.status().is_terminal() {
            break;
        }
    }

    if machine.status() == PaymentStatus::Success {
        time::sleep(config.redirect_delay).await;
        let redirect = success_path(&reference);
        tracing::debug!(reference = %reference, redirect = %redirect, "Redirecting to success view");
        tx.send_modify(|snapshot| snapshot.redirect_to = Some(redirect));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PaymentError;
    use crate::gateway::{ScriptedGateway, TransactionStatus};
    use causehive_core::repository::demo_causes;
    use causehive_core::{CartConfig, CartStore, Currency, MemoryStorage};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    const REF: &str = "CAUSEHIVE_1700000000000_AB12CD";

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    fn verification(status: TransactionStatus) -> Result<Verification> {
        Ok(Verification {
            reference: REF.into(),
            status,
            amount: Decimal::ZERO,
            currency: "USD".into(),
            paid_at: None,
            gateway_response: status.is_failure().then(|| "Declined".to_string()),
            customer_email: None,
        })
    }

    async fn filled_cart() -> CartHandle {
        let cart = CartStore::load(Arc::new(MemoryStorage::new()), CartConfig::default()).into_handle();
        let cause = demo_causes().remove(0);
        cart.write()
            .await
            .add_or_update(&cause, dec!(10), Currency::Usd, false, None)
            .unwrap();
        cart
    }

    #[test]
    fn test_first_poll_immediate_then_every_interval() {
        let mut poller = PaymentPoller::new(REF, PollerConfig::default());
        assert_eq!(poller.status(), PaymentStatus::Checking);

        assert_eq!(poller.tick(secs(0)), TickAction::Verify);
        for s in 1..5 {
            assert_eq!(poller.tick(secs(s)), TickAction::Idle);
        }
        assert_eq!(poller.tick(secs(5)), TickAction::Verify);
        assert_eq!(poller.tick(secs(6)), TickAction::Idle);
    }

    #[test]
    fn test_pending_then_success() {
        let mut poller = PaymentPoller::new(REF, PollerConfig::default());
        poller.tick(secs(0));
        assert_eq!(
            poller.apply_verification(verification(TransactionStatus::Abandoned), secs(0)),
            PaymentStatus::Pending
        );
        assert_eq!(poller.message(), MSG_WAITING);

        poller.tick(secs(5));
        assert_eq!(
            poller.apply_verification(verification(TransactionStatus::Success), secs(5)),
            PaymentStatus::Success
        );
        assert_eq!(poller.message(), MSG_SUCCESS);
        assert_eq!(poller.tick(secs(300)), TickAction::Idle);
        assert_eq!(poller.status(), PaymentStatus::Success);
    }

    #[test]
    fn test_transport_error_stays_pending() {
        let mut poller = PaymentPoller::new(REF, PollerConfig::default());
        poller.tick(secs(0));
        let status = poller.apply_verification(Err(PaymentError::Gateway("connection reset".into())), secs(0));

        assert_eq!(status, PaymentStatus::Pending);
        assert_eq!(poller.message(), MSG_CHECKING);
        assert_eq!(poller.tick(secs(5)), TickAction::Verify);
    }

    #[test]
    fn test_gateway_failure_is_terminal() {
        let mut poller = PaymentPoller::new(REF, PollerConfig::default());
        poller.tick(secs(0));
        poller.apply_verification(verification(TransactionStatus::Failed), secs(1));

        assert_eq!(poller.status(), PaymentStatus::Failed);
        assert_eq!(poller.failure(), Some(&FailureReason::Declined("Declined".into())));
        assert_eq!(poller.tick(secs(5)), TickAction::Idle);
    }

    #[test]
    fn test_countdown_forces_timeout() {
        let mut poller = PaymentPoller::new(REF, PollerConfig::default());
        for s in 0..300 {
            if poller.tick(secs(s)) == TickAction::Verify {
                poller.apply_verification(verification(TransactionStatus::Pending), secs(s));
            }
        }
        assert_eq!(poller.status(), PaymentStatus::Pending);

        assert_eq!(poller.tick(secs(300)), TickAction::TimedOut);
        assert_eq!(poller.status(), PaymentStatus::Failed);
        assert_eq!(poller.failure(), Some(&FailureReason::Timeout));
        assert_eq!(poller.message(), MSG_TIMEOUT);
    }

    #[test]
    fn test_success_arriving_at_deadline_loses() {
        let mut poller = PaymentPoller::new(REF, PollerConfig::default());
        poller.tick(secs(295));
        let status = poller.apply_verification(verification(TransactionStatus::Success), secs(300));

        assert_eq!(status, PaymentStatus::Failed);
        assert_eq!(poller.failure(), Some(&FailureReason::Timeout));

        let mut poller = PaymentPoller::new(REF, PollerConfig::default());
        poller.tick(secs(295));
        let status = poller.apply_verification(verification(TransactionStatus::Success), secs(299));
        assert_eq!(status, PaymentStatus::Success);
    }

    #[test]
    fn test_remaining_display() {
        let mut poller = PaymentPoller::new(REF, PollerConfig::default());
        assert_eq!(poller.snapshot().remaining, "5:00");

        poller.tick(secs(61));
        assert_eq!(poller.snapshot().remaining, "3:59");

        poller.tick(Duration::from_millis(295_500));
        let snapshot = poller.snapshot();
        assert_eq!(snapshot.remaining, "0:04");
        assert_eq!(snapshot.remaining_secs, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_driver_success_clears_cart_then_redirects() {
        let gateway = Arc::new(ScriptedGateway::with_statuses([
            TransactionStatus::Pending,
            TransactionStatus::Success,
        ]));
        let cart = filled_cart().await;

        let handle = spawn_poller(gateway.clone(), cart.clone(), REF, PollerConfig::default());
        let mut rx = handle.subscribe();

        let terminal = rx.wait_for(|s| s.status.is_terminal()).await.unwrap().clone();
        assert_eq!(terminal.status, PaymentStatus::Success);
        assert_eq!(terminal.message, MSG_SUCCESS);
        assert!(cart.read().await.is_empty());
        assert_eq!(gateway.verify_calls(), 2);

        let redirected = rx.wait_for(|s| s.redirect_to.is_some()).await.unwrap().clone();
        assert_eq!(
            redirected.redirect_to.as_deref(),
            Some("/donations/success?reference=CAUSEHIVE_1700000000000_AB12CD")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_driver_times_out_with_pending_polls() {
        let gateway = Arc::new(ScriptedGateway::new());
        let cart = filled_cart().await;

        let handle = spawn_poller(gateway.clone(), cart.clone(), REF, PollerConfig::default());
        let mut rx = handle.subscribe();

        let terminal = rx.wait_for(|s| s.status.is_terminal()).await.unwrap().clone();
        assert_eq!(terminal.status, PaymentStatus::Failed);
        assert_eq!(terminal.failure, Some(FailureReason::Timeout));
        assert_eq!(terminal.remaining, "0:00");
        assert_eq!(gateway.verify_calls(), 60);
        assert_eq!(cart.read().await.items().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_polling() {
        let gateway = Arc::new(ScriptedGateway::new());
        let handle = spawn_poller(gateway.clone(), filled_cart().await, REF, PollerConfig::default());

        time::sleep(secs(6)).await;
        let calls = gateway.verify_calls();
        assert_eq!(calls, 2);

        handle.cancel();
        time::sleep(secs(30)).await;
        assert_eq!(gateway.verify_calls(), calls);
        assert!(handle.is_finished());
        assert_eq!(handle.snapshot().status, PaymentStatus::Pending);
    }
}
