//! Campaign engine — the state machine that paces a mass send.
//!
//! One engine instance owns the whole lifecycle: `Idle -> Running -> (Idle |
//! Stopped)`. A campaign is a single spawned tokio task; stop is a
//! cooperative flag through a `watch` channel, so the contact currently being
//! sent completes and nothing new starts. Contacts attempted in this cycle
//! carry a `last_sent` marker, which makes stop/restart resumable without
//! duplicate sends.

use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use rand::Rng;
use tokio::sync::{watch, Mutex};

use outreach_core::config::SendingLimits;
use outreach_core::Transport;

use crate::contact::Contact;
use crate::personalize;
use crate::store::ContactStore;

/// Campaign lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CampaignState {
    Idle,
    Running,
    /// Explicitly stopped by the operator. Functionally idle; kept distinct
    /// for status reporting.
    Stopped,
}

/// Why a campaign could not start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartError {
    AlreadyRunning,
    /// No pending/active contact without a `last_sent` marker remains.
    NothingToSend,
    QuotaExhausted { sent_today: u32, daily_limit: u32 },
}

impl std::fmt::Display for StartError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StartError::AlreadyRunning => write!(f, "campaign already running"),
            StartError::NothingToSend => write!(f, "no eligible contacts left to send"),
            StartError::QuotaExhausted { sent_today, daily_limit } => {
                write!(f, "daily quota exhausted ({sent_today}/{daily_limit})")
            }
        }
    }
}

/// What a started campaign is about to do.
#[derive(Debug, Clone)]
pub struct CampaignPlan {
    pub total_contacts: usize,
    pub batch_size: usize,
    pub batches: usize,
    pub interval_minutes: u64,
}

/// Snapshot of campaign progress.
#[derive(Debug, Clone)]
pub struct CampaignStatus {
    pub state: CampaignState,
    pub batches_done: usize,
    pub batches_total: usize,
    pub sent: usize,
    pub failed: usize,
}

/// Result of dispatching one batch.
#[derive(Debug, Clone, Copy, Default)]
pub struct BatchOutcome {
    pub sent: usize,
    pub failed: usize,
    /// True when the batch was cut short by a stop request.
    pub stopped: bool,
}

#[derive(Default)]
struct RunState {
    state: Option<CampaignState>,
    stop_tx: Option<watch::Sender<bool>>,
    batches_done: usize,
    batches_total: usize,
    sent: usize,
    failed: usize,
}

/// The batch scheduler. One instance per process; only one campaign may run
/// at a time.
pub struct CampaignEngine {
    store: Arc<Mutex<ContactStore>>,
    transport: Arc<dyn Transport>,
    limits: SendingLimits,
    run: Arc<StdMutex<RunState>>,
}

impl CampaignEngine {
    pub fn new(
        store: Arc<Mutex<ContactStore>>,
        transport: Arc<dyn Transport>,
        limits: SendingLimits,
    ) -> Self {
        Self {
            store,
            transport,
            limits,
            run: Arc::new(StdMutex::new(RunState::default())),
        }
    }

    /// Start an automatic campaign: slice the unsent eligible contacts to the
    /// remaining daily quota, partition into batches, and spawn the send
    /// loop. Progress reports go to `reply_to`.
    pub async fn start(&self, template: String, reply_to: String) -> Result<CampaignPlan, StartError> {
        if self.is_running() {
            return Err(StartError::AlreadyRunning);
        }

        let batches = {
            let mut store = self.store.lock().await;
            store.roll_over_day();

            let eligible = store.eligible_unsent(usize::MAX);
            if eligible.is_empty() {
                return Err(StartError::NothingToSend);
            }

            let stats = store.stats();
            let remaining = self.limits.daily_limit.saturating_sub(stats.sent_today) as usize;
            if remaining == 0 {
                return Err(StartError::QuotaExhausted {
                    sent_today: stats.sent_today,
                    daily_limit: self.limits.daily_limit,
                });
            }

            let mut to_send = eligible;
            to_send.truncate(remaining);
            partition(to_send, self.limits.batch_size)
        };

        let plan = CampaignPlan {
            total_contacts: batches.iter().map(Vec::len).sum(),
            batch_size: self.limits.batch_size,
            batches: batches.len(),
            interval_minutes: self.limits.batch_cooldown_secs / 60,
        };

        let (stop_tx, stop_rx) = watch::channel(false);
        {
            let mut run = self.run.lock().expect("run state poisoned");
            if matches!(run.state, Some(CampaignState::Running)) {
                return Err(StartError::AlreadyRunning);
            }
            *run = RunState {
                state: Some(CampaignState::Running),
                stop_tx: Some(stop_tx),
                batches_done: 0,
                batches_total: batches.len(),
                sent: 0,
                failed: 0,
            };
        }

        tracing::info!(
            "🚀 Campaign started: {} contacts in {} batches",
            plan.total_contacts,
            plan.batches
        );

        let store = Arc::clone(&self.store);
        let transport = Arc::clone(&self.transport);
        let limits = self.limits.clone();
        let run = Arc::clone(&self.run);
        tokio::spawn(run_campaign(
            store, transport, limits, run, stop_rx, batches, template, reply_to,
        ));

        Ok(plan)
    }

    /// Request a cooperative stop. Returns false when no campaign is running.
    pub fn stop(&self) -> bool {
        let mut run = self.run.lock().expect("run state poisoned");
        if !matches!(run.state, Some(CampaignState::Running)) {
            return false;
        }
        run.state = Some(CampaignState::Stopped);
        if let Some(tx) = run.stop_tx.take() {
            let _ = tx.send(true);
        }
        tracing::info!("🛑 Campaign stop requested");
        true
    }

    pub fn is_running(&self) -> bool {
        matches!(
            self.run.lock().expect("run state poisoned").state,
            Some(CampaignState::Running)
        )
    }

    pub fn status(&self) -> CampaignStatus {
        let run = self.run.lock().expect("run state poisoned");
        CampaignStatus {
            state: run.state.unwrap_or(CampaignState::Idle),
            batches_done: run.batches_done,
            batches_total: run.batches_total,
            sent: run.sent,
            failed: run.failed,
        }
    }

    /// Dispatch one batch right now, outside the automatic campaign (the
    /// `!send` / `!batch` path). The caller is expected to have consulted
    /// `limits::can_send` first.
    pub async fn dispatch_batch(
        &self,
        batch: &[Contact],
        template: &str,
        reply_to: &str,
    ) -> BatchOutcome {
        // Manual dispatch has no stop channel; keep the sender alive so the
        // receiver never reports a stop.
        let (_stop_tx, mut stop_rx) = watch::channel(false);
        send_batch(
            &self.store,
            self.transport.as_ref(),
            &self.limits,
            &mut stop_rx,
            batch,
            template,
            reply_to,
        )
        .await
    }
}

/// Split contacts into fixed-size batches, preserving order.
fn partition(contacts: Vec<Contact>, batch_size: usize) -> Vec<Vec<Contact>> {
    let size = batch_size.max(1);
    let mut batches = Vec::new();
    let mut it = contacts.into_iter().peekable();
    while it.peek().is_some() {
        batches.push(it.by_ref().take(size).collect());
    }
    batches
}

/// Sleep unless a stop arrives first. Returns true when stopped.
async fn wait_or_stop(stop_rx: &mut watch::Receiver<bool>, duration: Duration) -> bool {
    if *stop_rx.borrow() {
        return true;
    }
    tokio::select! {
        _ = tokio::time::sleep(duration) => false,
        _ = stop_rx.changed() => true,
    }
}

/// The campaign loop: startup delay, then batch / cooldown / batch until
/// exhausted or stopped.
#[allow(clippy::too_many_arguments)]
async fn run_campaign(
    store: Arc<Mutex<ContactStore>>,
    transport: Arc<dyn Transport>,
    limits: SendingLimits,
    run: Arc<StdMutex<RunState>>,
    mut stop_rx: watch::Receiver<bool>,
    batches: Vec<Vec<Contact>>,
    template: String,
    reply_to: String,
) {
    let total_batches = batches.len();
    let mut stopped = wait_or_stop(&mut stop_rx, Duration::from_secs(limits.start_delay_secs)).await;

    for (i, batch) in batches.iter().enumerate() {
        if stopped {
            break;
        }
        if i > 0 {
            stopped = wait_or_stop(
                &mut stop_rx,
                Duration::from_secs(limits.batch_cooldown_secs),
            )
            .await;
            if stopped {
                break;
            }
        }

        tracing::info!(
            "📤 Sending batch {}/{} ({} contacts)",
            i + 1,
            total_batches,
            batch.len()
        );
        notify(transport.as_ref(), &reply_to, &format!(
            "📤 Sending batch {}/{} ({} contacts)...",
            i + 1,
            total_batches,
            batch.len()
        ))
        .await;

        let outcome = send_batch(
            &store,
            transport.as_ref(),
            &limits,
            &mut stop_rx,
            batch,
            &template,
            &reply_to,
        )
        .await;

        {
            let mut state = run.lock().expect("run state poisoned");
            state.batches_done += 1;
            state.sent += outcome.sent;
            state.failed += outcome.failed;
        }
        stopped = outcome.stopped;

        if !stopped && i + 1 < total_batches {
            notify(transport.as_ref(), &reply_to, &format!(
                "✅ Batch {}/{} done (✅{} ❌{}). Next in {} minutes.",
                i + 1,
                total_batches,
                outcome.sent,
                outcome.failed,
                limits.batch_cooldown_secs / 60
            ))
            .await;
        }
    }

    // Final accounting. Natural completion returns the engine to Idle; a
    // stop leaves it in Stopped until the next start.
    let (batches_done, sent, failed) = {
        let run = run.lock().expect("run state poisoned");
        (run.batches_done, run.sent, run.failed)
    };
    let (still_unsent, sent_today, daily_limit) = {
        let store = store.lock().await;
        (
            store.eligible_unsent(usize::MAX).len(),
            store.stats().sent_today,
            limits.daily_limit,
        )
    };

    let summary = if stopped {
        format!(
            "🛑 Campaign stopped.\n\n📊 This session:\n• Batches: {batches_done}/{total_batches}\n• Sent: {sent} (❌{failed})\n• Still unsent: {still_unsent}\n\nRestart with !autostart — already-reached contacts are skipped."
        )
    } else {
        format!(
            "🎉 Campaign complete!\n\n📊 This session:\n• Batches: {batches_done}/{total_batches}\n• Sent: {sent} (❌{failed})\n• Still unsent: {still_unsent}\n• Daily quota: {sent_today}/{daily_limit}"
        )
    };
    notify(transport.as_ref(), &reply_to, &summary).await;

    let mut state = run.lock().expect("run state poisoned");
    state.stop_tx = None;
    if matches!(state.state, Some(CampaignState::Running)) {
        state.state = Some(CampaignState::Idle);
    }
    tracing::info!(
        "🏁 Campaign finished: {sent} sent, {failed} failed, {still_unsent} unsent"
    );
}

/// Send one batch, strictly sequentially. Never concurrent: platform
/// anti-spam heuristics punish parallel sends from one account.
async fn send_batch(
    store: &Mutex<ContactStore>,
    transport: &dyn Transport,
    limits: &SendingLimits,
    stop_rx: &mut watch::Receiver<bool>,
    batch: &[Contact],
    template: &str,
    reply_to: &str,
) -> BatchOutcome {
    let mut outcome = BatchOutcome::default();

    for (i, contact) in batch.iter().enumerate() {
        if *stop_rx.borrow() {
            outcome.stopped = true;
            break;
        }

        // Skip numbers that are not on the platform at all; no send attempt.
        let exists = match transport.exists_on_network(&contact.phone).await {
            Ok(exists) => exists,
            Err(e) => {
                tracing::warn!("⚠️ Existence check failed for {}: {e}", contact.phone);
                false
            }
        };
        if !exists {
            tracing::warn!("❌ {} is not registered on the platform", contact.phone);
            store.lock().await.record_outcome(&contact.phone, false);
            outcome.failed += 1;
            continue;
        }

        let message = personalize::render(template, contact);
        match transport.send_text(&contact.phone, &message).await {
            Ok(()) => {
                store.lock().await.record_outcome(&contact.phone, true);
                outcome.sent += 1;
                tracing::info!(
                    "✅ Sent to {} ({})",
                    contact.phone,
                    contact.name.as_deref().unwrap_or("unnamed")
                );
            }
            Err(e) => {
                // One failed contact never aborts the batch.
                tracing::warn!("❌ Send to {} failed: {e}", contact.phone);
                store.lock().await.record_outcome(&contact.phone, false);
                outcome.failed += 1;
                continue;
            }
        }

        if batch.len() > 5 && (i + 1) % 5 == 0 {
            notify(transport, reply_to, &format!(
                "📊 Progress: {}/{} (✅{} ❌{})",
                i + 1,
                batch.len(),
                outcome.sent,
                outcome.failed
            ))
            .await;
        }

        if i + 1 < batch.len() {
            let delay = random_delay(limits);
            tracing::debug!("⏱️ Pausing {}s before next contact", delay.as_secs());
            if wait_or_stop(stop_rx, delay).await {
                outcome.stopped = true;
                break;
            }
        }
    }

    outcome
}

fn random_delay(limits: &SendingLimits) -> Duration {
    let min = limits.min_delay_secs.min(limits.max_delay_secs);
    let max = limits.max_delay_secs.max(limits.min_delay_secs);
    let secs = rand::thread_rng().gen_range(min..=max);
    Duration::from_secs(secs)
}

/// Operator reports are best-effort: a failed report must not kill the
/// campaign.
async fn notify(transport: &dyn Transport, reply_to: &str, text: &str) {
    if let Err(e) = transport.send_text(reply_to, text).await {
        tracing::warn!("⚠️ Failed to deliver campaign report: {e}");
    }
}
