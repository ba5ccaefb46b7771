// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Sliding-window admission gate for registry submissions.
//!
//! At most `limit` admissions are granted in any trailing window of length
//! `window`. Every admission occupies one slot from the moment it is granted
//! until `window` has elapsed, independently of when the caller releases its
//! ticket. Callers that find the window full wait in a FIFO queue and are
//! admitted in arrival order as slots expire.
//!
//! All shared state lives behind one mutex that is never held across an
//! `.await`. Each admission owns a single timer task, so the number of live
//! timers never exceeds `limit`.

use crate::config::RateLimitConfig;
use crate::error::GateError;
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Point-in-time view of the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateSnapshot {
    /// Maximum admissions per window
    pub limit: usize,
    /// Window length
    pub window: Duration,
    /// Admissions still counted against the current window
    pub in_window: usize,
    /// Callers queued for admission
    pub waiting: usize,
    /// Tickets handed out and not yet released
    pub outstanding: usize,
}

/// Permission to perform one submission.
///
/// Dropping the ticket releases it. The slot it occupies in the rate window
/// is only freed once `window` has passed since [`admitted_at`](Self::admitted_at).
#[must_use = "a ticket represents a consumed rate-limit slot"]
#[derive(Debug)]
pub struct AdmissionTicket {
    id: u64,
    admitted_at: Instant,
    window: Duration,
    gate: Weak<Inner>,
}

impl AdmissionTicket {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// When the gate granted this admission.
    pub fn admitted_at(&self) -> Instant {
        self.admitted_at
    }

    /// When this admission stops counting against the window.
    pub fn expires_at(&self) -> Instant {
        self.admitted_at + self.window
    }
}

impl Drop for AdmissionTicket {
    fn drop(&mut self) {
        if let Some(inner) = self.gate.upgrade() {
            let mut state = inner.lock();
            state.outstanding = state.outstanding.saturating_sub(1);
        }
    }
}

/// Thread-safe sliding-window rate gate.
///
/// Cloning is cheap and yields a handle to the same window.
#[derive(Debug, Clone)]
pub struct RateGate {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    limit: usize,
    window: Duration,
    state: Mutex<GateState>,
}

#[derive(Debug, Default)]
struct GateState {
    /// Live admissions keyed by ticket id
    admissions: HashMap<u64, Admission>,
    /// Blocked callers, oldest first
    waiters: VecDeque<Waiter>,
    /// Tickets not yet released
    outstanding: usize,
    next_id: u64,
    /// Runtime that drives expiry timers, captured on first acquire
    runtime: Option<Handle>,
}

#[derive(Debug)]
struct Admission {
    expiry: JoinHandle<()>,
}

#[derive(Debug)]
struct Waiter {
    id: u64,
    tx: oneshot::Sender<Grant>,
}

#[derive(Debug)]
struct Grant {
    id: u64,
    admitted_at: Instant,
}

impl GateState {
    fn allocate_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, GateState> {
        // Every critical section leaves the state consistent before it can panic.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record an admission and schedule its expiry. Caller holds the lock.
    ///
    /// Timers go through the captured handle so admissions made from a
    /// `Drop` outside any runtime context still get an expiry.
    fn admit(self: &Arc<Self>, state: &mut GateState, id: u64, runtime: &Handle) -> Grant {
        // Read the clock the timers run on, paused or not.
        let _enter = runtime.enter();
        let admitted_at = Instant::now();
        let gate = Arc::downgrade(self);
        let expires_at = admitted_at + self.window;

        let expiry = runtime.spawn(async move {
            tokio::time::sleep_until(expires_at).await;
            if let Some(inner) = gate.upgrade() {
                inner.expire(id);
            }
        });

        state.admissions.insert(id, Admission { expiry });
        state.outstanding += 1;
        debug!(
            ticket = id,
            in_window = state.admissions.len(),
            limit = self.limit,
            "Admission granted"
        );

        Grant { id, admitted_at }
    }

    /// Hand freed capacity to queued callers in FIFO order.
    fn admit_waiters(self: &Arc<Self>, state: &mut GateState) {
        // Waiters only exist after an acquire has captured the runtime.
        let Some(runtime) = state.runtime.clone() else {
            return;
        };

        while state.admissions.len() < self.limit {
            let Some(waiter) = state.waiters.pop_front() else {
                break;
            };

            let grant = self.admit(state, waiter.id, &runtime);
            if let Err(grant) = waiter.tx.send(grant) {
                // Receiver vanished without deregistering; give the slot back.
                warn!(ticket = grant.id, "Queued caller gone, reclaiming slot");
                Self::forget(state, grant.id);
            }
        }
    }

    /// Timer callback: the admission has aged out of the window.
    fn expire(self: &Arc<Self>, id: u64) {
        let mut state = self.lock();
        if state.admissions.remove(&id).is_none() {
            return;
        }

        debug!(
            ticket = id,
            in_window = state.admissions.len(),
            waiting = state.waiters.len(),
            "Admission expired"
        );
        self.admit_waiters(&mut state);
    }

    /// Undo an admission that no caller will ever hold.
    fn refund(self: &Arc<Self>, state: &mut GateState, id: u64) {
        Self::forget(state, id);
        warn!(ticket = id, "Admission refunded after cancellation");
        self.admit_waiters(state);
    }

    fn forget(state: &mut GateState, id: u64) {
        if let Some(admission) = state.admissions.remove(&id) {
            admission.expiry.abort();
        }
        state.outstanding = state.outstanding.saturating_sub(1);
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        for (_, admission) in state.admissions.drain() {
            admission.expiry.abort();
        }
    }
}

/// A queued caller. Dropping it before admission is observed cancels the wait.
struct QueuedAcquire {
    inner: Arc<Inner>,
    id: u64,
    rx: oneshot::Receiver<Grant>,
    settled: bool,
}

impl QueuedAcquire {
    async fn wait(mut self) -> Result<AdmissionTicket, GateError> {
        let grant = (&mut self.rx).await;
        self.settled = true;

        match grant {
            Ok(grant) => Ok(AdmissionTicket {
                id: grant.id,
                admitted_at: grant.admitted_at,
                window: self.inner.window,
                gate: Arc::downgrade(&self.inner),
            }),
            Err(_) => Err(GateError::Cancelled),
        }
    }
}

impl Drop for QueuedAcquire {
    fn drop(&mut self) {
        if self.settled {
            return;
        }

        let mut state = self.inner.lock();
        if let Some(pos) = state.waiters.iter().position(|w| w.id == self.id) {
            state.waiters.remove(pos);
            warn!(ticket = self.id, waiting = state.waiters.len(), "Queued acquire cancelled");
            return;
        }

        // Admitted under the lock but never observed by the caller.
        if let Ok(grant) = self.rx.try_recv() {
            self.inner.refund(&mut state, grant.id);
        }
    }
}

impl RateGate {
    /// Create a gate admitting at most `limit` callers per `window`.
    pub fn new(limit: usize, window: Duration) -> Result<Self, GateError> {
        if limit == 0 {
            return Err(GateError::InvalidLimit);
        }
        if window.is_zero() {
            return Err(GateError::InvalidWindow);
        }

        Ok(Self {
            inner: Arc::new(Inner {
                limit,
                window,
                state: Mutex::new(GateState::default()),
            }),
        })
    }

    /// Create a gate from configuration.
    pub fn from_config(config: &RateLimitConfig) -> Result<Self, GateError> {
        Self::new(config.limit as usize, config.window_duration())
    }

    pub fn limit(&self) -> usize {
        self.inner.limit
    }

    pub fn window(&self) -> Duration {
        self.inner.window
    }

    /// Wait until the window has room, then record an admission.
    ///
    /// Queue position is taken on first poll. Dropping the returned future
    /// before it completes cancels the wait without consuming a slot.
    ///
    /// # Panics
    ///
    /// Panics if first polled outside a tokio runtime. Expiry timers for
    /// this gate run on the runtime seen by the first call.
    pub async fn acquire(&self) -> Result<AdmissionTicket, GateError> {
        let queued = {
            let mut state = self.inner.lock();
            let runtime = state.runtime.get_or_insert_with(Handle::current).clone();
            let id = state.allocate_id();

            if state.waiters.is_empty() && state.admissions.len() < self.inner.limit {
                let grant = self.inner.admit(&mut state, id, &runtime);
                return Ok(AdmissionTicket {
                    id: grant.id,
                    admitted_at: grant.admitted_at,
                    window: self.inner.window,
                    gate: Arc::downgrade(&self.inner),
                });
            }

            let (tx, rx) = oneshot::channel();
            state.waiters.push_back(Waiter { id, tx });
            debug!(
                ticket = id,
                waiting = state.waiters.len(),
                "Rate window full, caller queued"
            );

            QueuedAcquire {
                inner: Arc::clone(&self.inner),
                id,
                rx,
                settled: false,
            }
        };

        queued.wait().await
    }

    /// Like [`acquire`](Self::acquire), giving up after `timeout`.
    pub async fn acquire_timeout(&self, timeout: Duration) -> Result<AdmissionTicket, GateError> {
        match tokio::time::timeout(timeout, self.acquire()).await {
            Ok(result) => result,
            Err(_) => {
                warn!(?timeout, "Acquire timed out");
                Err(GateError::Cancelled)
            }
        }
    }

    /// Like [`acquire`](Self::acquire), giving up when `cancel` completes.
    ///
    /// If admission and cancellation are ready together, admission wins.
    pub async fn acquire_until<F>(&self, cancel: F) -> Result<AdmissionTicket, GateError>
    where
        F: Future<Output = ()>,
    {
        tokio::select! {
            biased;
            result = self.acquire() => result,
            _ = cancel => {
                warn!("Acquire cancelled by caller");
                Err(GateError::Cancelled)
            }
        }
    }

    /// Report that the exchange covered by `ticket` has finished.
    ///
    /// The slot stays occupied until the ticket's window expires.
    pub fn release(&self, ticket: AdmissionTicket) {
        let now = Instant::now();
        debug!(
            ticket = ticket.id,
            held_for = ?now.saturating_duration_since(ticket.admitted_at),
            expires_in = ?ticket.expires_at().saturating_duration_since(now),
            "Ticket released"
        );
        drop(ticket);
    }

    pub fn snapshot(&self) -> GateSnapshot {
        let state = self.inner.lock();
        GateSnapshot {
            limit: self.inner.limit,
            window: self.inner.window,
            in_window: state.admissions.len(),
            waiting: state.waiters.len(),
            outstanding: state.outstanding,
        }
    }
}
