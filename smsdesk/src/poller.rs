//! Drives a purchased activation from "number issued" to a final outcome.
//!
//! ```text
//! AwaitingPurchase ─buy ok─▶ Polling ─code─────────▶ CodeReceived ───────────────▶ Closed
//!                               │ ├──terminal status─▶ TerminalNoCode ─▶ RefundRequested ─▶ Closed
//!                               │ └──timeout/error───▶ TimedOut ───────▶ RefundRequested ─▶ Closed
//!                               └─cancel───────────────────────────────────────────────────▶ Closed
//! ```
//!
//! Checks are strictly sequential: the next one is scheduled only after the
//! previous one has been handled. The first check happens one interval after
//! the purchase, never immediately.
use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use derive_builder::Builder;
use serde::Serialize;
use smsdesk_config::PollerSettings;
use tokio::{
    sync::{broadcast, watch},
    task::JoinHandle,
    time::Instant,
};
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::api::{ActivationApi, ActivationStatus, PurchaseReceipt};
use crate::ApiError;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);
pub const DEFAULT_MAX_POLL_DURATION: Duration = Duration::from_secs(20 * 60);
/// Backend status for a cancelled/expired activation.
pub const CANCELLED_STATUS: &str = "6";

#[derive(Builder, Clone, Debug, PartialEq)]
#[builder(public, setter(into))]
pub struct PollerOptions {
    #[builder(default = "DEFAULT_POLL_INTERVAL")]
    pub interval: Duration,
    #[builder(default = "DEFAULT_MAX_POLL_DURATION")]
    pub max_duration: Duration,
    #[builder(default = "vec![CANCELLED_STATUS.to_string()]")]
    pub terminal_statuses: Vec<String>,
}

impl PollerOptions {
    pub fn from_settings(settings: &PollerSettings) -> Self {
        Self {
            interval: settings.interval(),
            max_duration: settings.max_duration(),
            terminal_statuses: settings.terminal_statuses.clone(),
        }
    }
}

impl Default for PollerOptions {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            max_duration: DEFAULT_MAX_POLL_DURATION,
            terminal_statuses: vec![CANCELLED_STATUS.to_string()],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PurchaseState {
    AwaitingPurchase,
    Polling,
    CodeReceived,
    TimedOut,
    TerminalNoCode,
    RefundRequested,
    Closed,
}

/// How a poll ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PollOutcome {
    CodeReceived,
    TimedOut,
    TerminalNoCode,
    Cancelled,
}

/// One purchased activation. Mutated only by the poll loop.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseSession {
    pub activation_id: String,
    pub phone_number: String,
    pub credits_spent: f64,
    pub status: Option<String>,
    pub code: Option<String>,
    pub started_at: DateTime<Utc>,
    pub refunded: bool,
    pub polling: bool,
}

impl PurchaseSession {
    pub fn from_receipt(receipt: &PurchaseReceipt) -> Self {
        Self {
            activation_id: receipt.activation_id.clone(),
            phone_number: receipt.phone_number.clone(),
            credits_spent: receipt.credits_spent,
            status: None,
            code: None,
            started_at: Utc::now(),
            refunded: false,
            polling: true,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.code.is_some() || self.refunded
    }
}

/// What observers see; published on every transition.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PollSnapshot {
    pub state: PurchaseState,
    pub outcome: Option<PollOutcome>,
    pub session: Option<PurchaseSession>,
}

impl PollSnapshot {
    fn awaiting() -> Self {
        Self {
            state: PurchaseState::AwaitingPurchase,
            outcome: None,
            session: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollDecision {
    Continue,
    CodeReceived(String),
    TerminalNoCode,
    TimedOut,
}

/// Decide what one status check means.
///
/// A code beats a terminal status, and a terminal status beats the timeout.
pub fn evaluate(
    status: &ActivationStatus,
    elapsed: Duration,
    options: &PollerOptions,
) -> PollDecision {
    if let Some(code) = status.received_code() {
        return PollDecision::CodeReceived(code.to_string());
    }
    let terminal = status
        .status
        .as_deref()
        .is_some_and(|s| options.terminal_statuses.iter().any(|t| t == s));
    if terminal {
        return PollDecision::TerminalNoCode;
    }
    if elapsed >= options.max_duration {
        return PollDecision::TimedOut;
    }
    PollDecision::Continue
}

/// Ask for the session's credits back, at most once.
///
/// Returns `Ok(false)` without calling the backend when the session was
/// already refunded.
pub async fn request_refund(
    api: &dyn ActivationApi,
    session: &mut PurchaseSession,
) -> Result<bool, ApiError> {
    if session.refunded {
        debug!(activation_id = %session.activation_id, "already refunded, skipping");
        return Ok(false);
    }
    api.refund(&session.activation_id, session.credits_spent).await?;
    session.refunded = true;
    Ok(true)
}

/// Owner of one purchase and its poll loop.
///
/// Dropping the poller (or calling [`PurchasePoller::cancel`]) stops the
/// loop: no status check or refund is issued afterwards.
pub struct PurchasePoller {
    api: Arc<dyn ActivationApi>,
    options: PollerOptions,
    updates_tx: Option<watch::Sender<PollSnapshot>>,
    updates_rx: watch::Receiver<PollSnapshot>,
    terminate: Option<broadcast::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl PurchasePoller {
    pub fn new(api: Arc<dyn ActivationApi>, options: PollerOptions) -> Self {
        let (updates_tx, updates_rx) = watch::channel(PollSnapshot::awaiting());
        Self {
            api,
            options,
            updates_tx: Some(updates_tx),
            updates_rx,
            terminate: None,
            task: None,
        }
    }

    pub fn options(&self) -> &PollerOptions {
        &self.options
    }

    pub fn state(&self) -> PurchaseState {
        self.updates_rx.borrow().state
    }

    pub fn snapshot(&self) -> PollSnapshot {
        self.updates_rx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<PollSnapshot> {
        self.updates_rx.clone()
    }

    /// Buy a number and start polling for its code.
    ///
    /// On failure the poller stays in `AwaitingPurchase` and the purchase can
    /// be retried.
    pub async fn purchase(
        &mut self,
        service: &str,
        country: &str,
    ) -> Result<PurchaseSession, ApiError> {
        if self.updates_tx.is_none() {
            return Err(ApiError::Validation(
                "this purchase has already been started".into(),
            ));
        }

        let receipt = self
            .api
            .buy_number(service, country)
            .await
            .map_err(|err| {
                warn!(error = %err, "purchase failed");
                err
            })?;

        let updates = self.updates_tx.take().ok_or_else(|| {
            ApiError::Validation("this purchase has already been started".into())
        })?;
        let session = PurchaseSession::from_receipt(&receipt);
        updates.send_replace(PollSnapshot {
            state: PurchaseState::Polling,
            outcome: None,
            session: Some(session.clone()),
        });

        let (terminate_tx, terminate_rx) = broadcast::channel(1);
        let span = info_span!("activation", activation_id = %session.activation_id);
        info!(parent: &span, phone_number = %session.phone_number, "polling started");

        self.terminate = Some(terminate_tx);
        self.task = Some(tokio::spawn(
            poll_loop(
                Arc::clone(&self.api),
                self.options.clone(),
                session.clone(),
                updates,
                terminate_rx,
            )
            .instrument(span),
        ));

        Ok(session)
    }

    /// Stop polling now. In-flight status checks are ignored.
    pub fn cancel(&mut self) {
        if let Some(updates) = self.updates_tx.take() {
            // Never purchased: nothing to stop, just close.
            updates.send_replace(PollSnapshot {
                state: PurchaseState::Closed,
                outcome: Some(PollOutcome::Cancelled),
                session: None,
            });
        }
        if let Some(terminate) = self.terminate.take() {
            let _ = terminate.send(());
        }
    }

    /// Wait until the poll loop has finished and return the final snapshot.
    pub async fn wait(&mut self) -> PollSnapshot {
        if let Some(task) = self.task.take() {
            if let Err(err) = task.await {
                error!(?err, "poll loop aborted");
            }
        }
        self.snapshot()
    }
}

impl Drop for PurchasePoller {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl std::fmt::Debug for PurchasePoller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PurchasePoller")
            .field("options", &self.options)
            .field("state", &self.state())
            .finish()
    }
}

fn publish(
    updates: &watch::Sender<PollSnapshot>,
    state: PurchaseState,
    outcome: Option<PollOutcome>,
    session: &PurchaseSession,
) {
    updates.send_replace(PollSnapshot {
        state,
        outcome,
        session: Some(session.clone()),
    });
}

async fn poll_loop(
    api: Arc<dyn ActivationApi>,
    options: PollerOptions,
    mut session: PurchaseSession,
    updates: watch::Sender<PollSnapshot>,
    mut terminate: broadcast::Receiver<()>,
) {
    let started = Instant::now();
    let activation_id = session.activation_id.clone();

    loop {
        let slept = tokio::select! {
            biased;
            _ = terminate.recv() => false,
            _ = tokio::time::sleep(options.interval) => true,
        };
        if !slept {
            return close_cancelled(&updates, &mut session);
        }

        let check = tokio::select! {
            biased;
            _ = terminate.recv() => None,
            check = api.activation_status(&activation_id) => Some(check),
        };
        let Some(check) = check else {
            return close_cancelled(&updates, &mut session);
        };

        let decision = match check {
            Ok(status) => {
                session.status = status.status.clone();
                evaluate(&status, started.elapsed(), &options)
            }
            Err(err) => {
                warn!(error = %err, "status check failed, giving up");
                PollDecision::TimedOut
            }
        };

        match decision {
            PollDecision::Continue => {
                debug!(status = ?session.status, "no code yet");
                publish(&updates, PurchaseState::Polling, None, &session);
            }
            PollDecision::CodeReceived(code) => {
                info!("code received");
                session.code = Some(code);
                session.polling = false;
                let outcome = Some(PollOutcome::CodeReceived);
                publish(&updates, PurchaseState::CodeReceived, outcome, &session);
                publish(&updates, PurchaseState::Closed, outcome, &session);
                return;
            }
            PollDecision::TerminalNoCode => {
                info!(status = ?session.status, "activation ended without a code");
                return finish_without_code(
                    api.as_ref(),
                    &updates,
                    &mut session,
                    PollOutcome::TerminalNoCode,
                )
                .await;
            }
            PollDecision::TimedOut => {
                info!(elapsed = ?started.elapsed(), "activation timed out");
                return finish_without_code(
                    api.as_ref(),
                    &updates,
                    &mut session,
                    PollOutcome::TimedOut,
                )
                .await;
            }
        }
    }
}

fn close_cancelled(updates: &watch::Sender<PollSnapshot>, session: &mut PurchaseSession) {
    info!("polling cancelled");
    session.polling = false;
    publish(
        updates,
        PurchaseState::Closed,
        Some(PollOutcome::Cancelled),
        session,
    );
}

async fn finish_without_code(
    api: &dyn ActivationApi,
    updates: &watch::Sender<PollSnapshot>,
    session: &mut PurchaseSession,
    outcome: PollOutcome,
) {
    session.polling = false;
    let state = match outcome {
        PollOutcome::TimedOut => PurchaseState::TimedOut,
        _ => PurchaseState::TerminalNoCode,
    };
    publish(updates, state, Some(outcome), session);
    publish(updates, PurchaseState::RefundRequested, Some(outcome), session);

    match request_refund(api, session).await {
        Ok(true) => info!(credits = session.credits_spent, "credits refunded"),
        Ok(false) => {}
        Err(err) => error!(error = %err, "refund failed, credits still held"),
    }
    publish(updates, PurchaseState::Closed, Some(outcome), session);
}
