// panedash-core/src/redraw.rs
use crossbeam::channel::{Receiver, Sender, TrySendError, bounded};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

struct RedrawInner {
    tx: Sender<()>,
    rx: Receiver<()>,
    closed: AtomicBool,
    coalesced: AtomicU64,
}

/// Single-slot coalescing "repaint needed" signal.
///
/// Any number of refresh loops may call [`RedrawBus::request`]; while one
/// signal is pending further requests collapse into it. The render loop is
/// the only consumer.
#[derive(Clone)]
pub struct RedrawBus {
    inner: Arc<RedrawInner>,
}

impl Default for RedrawBus {
    fn default() -> Self {
        Self::new()
    }
}

impl RedrawBus {
    pub fn new() -> Self {
        let (tx, rx) = bounded(1);
        Self {
            inner: Arc::new(RedrawInner {
                tx,
                rx,
                closed: AtomicBool::new(false),
                coalesced: AtomicU64::new(0),
            }),
        }
    }

    /// Ask for a repaint. Never blocks; a no-op once closed.
    pub fn request(&self) {
        if self.is_closed() {
            return;
        }

        match self.inner.tx.try_send(()) {
            Ok(()) => {}
            Err(TrySendError::Full(())) => {
                self.inner.coalesced.fetch_add(1, Ordering::Relaxed);
            }
            Err(TrySendError::Disconnected(())) => {}
        }
    }

    /// Close the bus and wake a blocked consumer so it can observe the close
    pub fn close(&self) {
        if !self.inner.closed.swap(true, Ordering::AcqRel) {
            let _ = self.inner.tx.try_send(());
        }
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Receiver for use in `select!`. Check [`RedrawBus::is_closed`] after a wake.
    pub fn receiver(&self) -> &Receiver<()> {
        &self.inner.rx
    }

    /// Drain the pending signal, if any, without blocking
    pub fn take_pending(&self) -> bool {
        self.inner.rx.try_recv().is_ok() && !self.is_closed()
    }

    /// Number of requests absorbed by an already pending signal
    pub fn coalesced(&self) -> u64 {
        self.inner.coalesced.load(Ordering::Relaxed)
    }

    /// Block and call `repaint` once per drained signal until the bus closes
    pub fn run_consumer<F: FnMut()>(&self, mut repaint: F) {
        // The close wake-up may already have been drained by `take_pending`
        while !self.is_closed() {
            if self.inner.rx.recv().is_err() || self.is_closed() {
                break;
            }
            repaint();
        }
        tracing::trace!("redraw consumer exited");
    }
}
