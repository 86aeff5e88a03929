// panedash-core/src/scheduler.rs
use crossbeam::channel::{Receiver, RecvTimeoutError, Sender, TryRecvError, bounded};
use crossbeam::select;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::Widget;

/// Offset between consecutive widgets' first refresh
pub const STAGGER_STEP: Duration = Duration::from_millis(50);
/// Stagger offsets repeat after this many widgets
const STAGGER_SLOTS: usize = 20;

#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("scheduler already started")]
    AlreadyStarted,
    #[error("failed to spawn refresh loop for '{widget}': {source}")]
    Spawn {
        widget: String,
        #[source]
        source: std::io::Error,
    },
}

/// Counters kept by one refresh loop
#[derive(Debug, Default)]
pub struct LoopStats {
    ticks: AtomicU64,
    refreshes: AtomicU64,
    faults: AtomicU64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopSnapshot {
    pub widget: String,
    /// Loop iterations, including skipped (disabled) ones
    pub ticks: u64,
    /// Refreshes that ran to completion
    pub refreshes: u64,
    /// Refreshes that panicked
    pub faults: u64,
}

/// Outcome of joining the refresh loops
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StopReport {
    pub stopped: usize,
    /// Loops still inside a refresh when the grace period ran out
    pub lingering: Vec<String>,
}

impl StopReport {
    pub fn is_clean(&self) -> bool {
        self.lingering.is_empty()
    }
}

struct LoopHandle {
    widget: String,
    thread: JoinHandle<()>,
    stats: Arc<LoopStats>,
}

enum Wake {
    Elapsed,
    Nudged,
    Stop,
}

/// Deterministic first-refresh delay for the widget at `index`
pub fn stagger_for(index: usize) -> Duration {
    STAGGER_STEP * (index % STAGGER_SLOTS) as u32
}

/// Runs one independent refresh loop per widget.
///
/// Loops sleep on a stop channel so cancellation is observed within one tick.
/// A refresh that is already running cannot be interrupted; `join` waits for
/// it up to the grace period and then detaches it.
///
/// Loops can be spawned ahead of time with [`Scheduler::spawn`]. They then
/// hold at a gate until [`Scheduler::release`] and run nothing before it.
#[derive(Default)]
pub struct Scheduler {
    stop_tx: Option<Sender<()>>,
    gate_tx: Option<Sender<()>>,
    nudges: Vec<Sender<()>>,
    done_rx: Option<Receiver<()>>,
    loops: Vec<LoopHandle>,
    started: bool,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn the loops and let them run immediately
    pub fn start(&mut self, widgets: &[Arc<dyn Widget>]) -> Result<(), SchedulerError> {
        self.spawn(widgets)?;
        self.release();
        Ok(())
    }

    /// Spawn one loop per widget, held at the gate until [`Scheduler::release`].
    ///
    /// If any thread fails to spawn, the loops already spawned are stopped.
    pub fn spawn(&mut self, widgets: &[Arc<dyn Widget>]) -> Result<(), SchedulerError> {
        if self.started {
            return Err(SchedulerError::AlreadyStarted);
        }
        self.started = true;

        let (stop_tx, stop_rx) = bounded::<()>(0);
        let (gate_tx, gate_rx) = bounded::<()>(0);
        let (done_tx, done_rx) = bounded::<()>(0);

        for (index, widget) in widgets.iter().enumerate() {
            let (nudge_tx, nudge_rx) = bounded(1);
            let stats = Arc::new(LoopStats::default());

            let widget = widget.clone();
            let name = widget.name().to_string();
            let stop_rx = stop_rx.clone();
            let gate_rx = gate_rx.clone();
            let done_tx = done_tx.clone();
            let loop_stats = stats.clone();

            let thread = thread::Builder::new()
                .name(format!("refresh-{name}"))
                .spawn(move || {
                    if pass_gate(&stop_rx, &gate_rx) {
                        run_loop(widget, index, stop_rx, nudge_rx, loop_stats);
                    }
                    drop(done_tx);
                })
                .map_err(|source| SchedulerError::Spawn {
                    widget: name.clone(),
                    source,
                })?;

            self.nudges.push(nudge_tx);
            self.loops.push(LoopHandle {
                widget: name,
                thread,
                stats,
            });
        }

        self.stop_tx = Some(stop_tx);
        self.gate_tx = Some(gate_tx);
        self.done_rx = Some(done_rx);
        tracing::debug!(loops = self.loops.len(), "refresh loops spawned");
        Ok(())
    }

    /// Open the gate so spawned loops begin refreshing
    pub fn release(&mut self) {
        if self.gate_tx.take().is_some() {
            tracing::debug!(loops = self.loops.len(), "scheduler started");
        }
    }

    pub fn is_spawned(&self) -> bool {
        self.started
    }

    /// Refresh every widget now, each on its own loop thread
    pub fn refresh_all(&self) {
        for nudge in &self.nudges {
            // A full slot already guarantees a pending refresh
            let _ = nudge.try_send(());
        }
    }

    /// Tell every loop to exit without waiting for it
    pub fn signal_stop(&mut self) {
        if self.stop_tx.take().is_some() {
            tracing::debug!(loops = self.loops.len(), "stop signalled");
        }
        self.gate_tx = None;
        self.nudges.clear();
    }

    /// Wait up to `grace` for all loops to exit. Loops stuck in a refresh are detached.
    pub fn join(&mut self, grace: Duration) -> StopReport {
        let deadline = Instant::now() + grace;
        let mut all_exited = true;

        if let Some(done_rx) = self.done_rx.take() {
            all_exited = matches!(
                done_rx.recv_deadline(deadline),
                Err(RecvTimeoutError::Disconnected)
            );
        }

        let mut report = StopReport::default();
        for handle in self.loops.drain(..) {
            if all_exited || handle.thread.is_finished() {
                if handle.thread.join().is_err() {
                    tracing::error!(widget = %handle.widget, "refresh loop terminated abnormally");
                }
                report.stopped += 1;
            } else {
                tracing::warn!(
                    widget = %handle.widget,
                    grace_ms = grace.as_millis() as u64,
                    "refresh loop still busy after grace period, detaching"
                );
                report.lingering.push(handle.widget);
            }
        }
        report
    }

    pub fn stop_all(&mut self, grace: Duration) -> StopReport {
        self.signal_stop();
        self.join(grace)
    }

    pub fn stats(&self) -> Vec<LoopSnapshot> {
        self.loops
            .iter()
            .map(|handle| LoopSnapshot {
                widget: handle.widget.clone(),
                ticks: handle.stats.ticks.load(Ordering::Relaxed),
                refreshes: handle.stats.refreshes.load(Ordering::Relaxed),
                faults: handle.stats.faults.load(Ordering::Relaxed),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.loops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.loops.is_empty()
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.signal_stop();
    }
}

fn run_loop(
    widget: Arc<dyn Widget>,
    index: usize,
    stop_rx: Receiver<()>,
    nudge_rx: Receiver<()>,
    stats: Arc<LoopStats>,
) {
    let stagger = stagger_for(index);
    if !stagger.is_zero() && matches!(wait(&stop_rx, &nudge_rx, Some(stagger)), Wake::Stop) {
        return;
    }

    loop {
        // A nudge can be pending alongside the stop; stop wins
        if stop_requested(&stop_rx) {
            break;
        }
        stats.ticks.fetch_add(1, Ordering::Relaxed);

        if widget.disabled() {
            tracing::trace!(widget = %widget.name(), "disabled, skipping refresh");
        } else {
            refresh_contained(widget.as_ref(), &stats);
        }

        let interval = widget.refresh_interval();
        let timeout = (!interval.is_zero()).then_some(interval);
        match wait(&stop_rx, &nudge_rx, timeout) {
            Wake::Stop => break,
            Wake::Elapsed | Wake::Nudged => {}
        }
    }

    tracing::trace!(widget = %widget.name(), "refresh loop exited");
}

fn refresh_contained(widget: &dyn Widget, stats: &LoopStats) {
    match panic::catch_unwind(AssertUnwindSafe(|| widget.refresh())) {
        Ok(()) => {
            stats.refreshes.fetch_add(1, Ordering::Relaxed);
        }
        Err(payload) => {
            stats.faults.fetch_add(1, Ordering::Relaxed);
            let message = panic_message(payload.as_ref());
            tracing::error!(widget = %widget.name(), panic = %message, "widget refresh panicked");
            widget.report_fault(&message);
        }
    }
}

fn stop_requested(stop_rx: &Receiver<()>) -> bool {
    matches!(stop_rx.try_recv(), Err(TryRecvError::Disconnected))
}

/// Hold until the gate opens. Returns false if stop came first.
fn pass_gate(stop_rx: &Receiver<()>, gate_rx: &Receiver<()>) -> bool {
    // Neither channel carries messages; both fire by disconnecting
    select! {
        recv(stop_rx) -> _ => {}
        recv(gate_rx) -> _ => {}
    }
    !stop_requested(stop_rx)
}

fn wait(stop_rx: &Receiver<()>, nudge_rx: &Receiver<()>, timeout: Option<Duration>) -> Wake {
    // The stop channel never carries messages; it wakes us by disconnecting.
    match timeout {
        Some(timeout) => select! {
            recv(stop_rx) -> _ => Wake::Stop,
            recv(nudge_rx) -> msg => if msg.is_ok() { Wake::Nudged } else { Wake::Stop },
            default(timeout) => Wake::Elapsed,
        },
        None => select! {
            recv(stop_rx) -> _ => Wake::Stop,
            recv(nudge_rx) -> msg => if msg.is_ok() { Wake::Nudged } else { Wake::Stop },
        },
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
