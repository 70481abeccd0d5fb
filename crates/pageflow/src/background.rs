use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::oracle::LayoutOracle;
use crate::paginate::PaginationEngine;

/// A nudge for the background filler. On-demand callers can also go
/// straight through [`SharedEngine::with`]; the mutex serializes either
/// way, so at most one page advance is ever in flight.
#[derive(Debug, Clone, Copy)]
pub enum FillRequest {
    EnsurePage { index: usize, radius: usize },
    EnsureChar { char_index: usize, radius: usize },
}

/// Shared handle over the engine with single-writer discipline: every
/// mutation goes through one mutex, readers observe an append-only page
/// list.
pub struct SharedEngine<O: LayoutOracle> {
    inner: Arc<Mutex<PaginationEngine<O>>>,
}

impl<O: LayoutOracle> Clone for SharedEngine<O> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<O: LayoutOracle> SharedEngine<O> {
    pub fn new(engine: PaginationEngine<O>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(engine)),
        }
    }

    /// Runs `f` with exclusive access to the engine. Pagination work is
    /// pure CPU-bound measurement, so the lock is only ever held for
    /// bounded computation.
    pub fn with<R>(&self, f: impl FnOnce(&mut PaginationEngine<O>) -> R) -> R {
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    pub fn is_complete(&self) -> bool {
        self.with(|e| e.is_complete())
    }

    pub fn page_count(&self) -> usize {
        self.with(|e| e.page_count())
    }

    pub fn total_characters(&self) -> usize {
        self.with(|e| e.total_characters())
    }
}

const IDLE_TICK: Duration = Duration::from_millis(2);

/// Opportunistic background page filler: services explicit requests first,
/// otherwise idles forward one page per lock acquisition, and stops as soon
/// as the engine completes or the handle is dropped.
pub struct BackgroundPaginator {
    tx: Sender<FillRequest>,
    cancel: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl BackgroundPaginator {
    pub fn spawn<O>(engine: SharedEngine<O>) -> Self
    where
        O: LayoutOracle + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        let cancel = Arc::new(AtomicBool::new(false));
        let worker_cancel = Arc::clone(&cancel);
        let handle = thread::spawn(move || run_fill(engine, rx, worker_cancel));
        Self {
            tx,
            cancel,
            handle: Some(handle),
        }
    }

    /// Best-effort: a request after completion or shutdown is a no-op.
    pub fn request(&self, request: FillRequest) {
        let _ = self.tx.send(request);
    }
}

impl Drop for BackgroundPaginator {
    fn drop(&mut self) {
        self.cancel.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn run_fill<O: LayoutOracle>(
    engine: SharedEngine<O>,
    rx: Receiver<FillRequest>,
    cancel: Arc<AtomicBool>,
) {
    loop {
        if cancel.load(Ordering::Relaxed) {
            break;
        }
        match rx.recv_timeout(IDLE_TICK) {
            Ok(request) => service(&engine, request),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
        // One page per lock acquisition keeps interactive callers from
        // starving behind the idle fill.
        let done = engine.with(|e| {
            e.compute_next_page();
            e.is_complete()
        });
        if done {
            log::debug!("background pagination complete");
            break;
        }
        thread::yield_now();
    }
}

fn service<O: LayoutOracle>(engine: &SharedEngine<O>, request: FillRequest) {
    match request {
        FillRequest::EnsurePage { index, radius } => {
            engine.with(|e| e.ensure_window(index, radius));
        }
        FillRequest::EnsureChar { char_index, radius } => {
            engine.with(|e| {
                e.ensure_page_for_char(char_index, radius);
            });
        }
    }
}
