#![forbid(unsafe_code)]

//! Single-slot scheduler for windowing passes.
//!
//! One named worker thread runs pass bodies strictly sequentially. The
//! submission queue has depth one: a trigger cancels whatever pass is in
//! flight, replaces whatever pass is still queued, and parks the new
//! snapshot for the worker — all under one lock, so a cancellation can
//! never race a submission. A pass that is superseded while queued simply
//! never runs.
//!
//! The completion listener fires on the worker, immediately after the last
//! marshalled mutation of a fully completed pass has returned; cancelled
//! and abandoned passes never notify. Errors out of a pass are logged and
//! the pass is dropped — recovery is a fresh trigger, never a retry.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};

use tracing::{debug, error};

use crate::cache::WindowCache;
use crate::pass::{Pass, PassOutcome};

const SLOT_POISONED: &str = "scheduler slot lock poisoned";
const CACHE_POISONED: &str = "window cache lock poisoned";
const LISTENER_POISONED: &str = "completion listener lock poisoned";

/// Closure invoked after a pass runs to full completion.
pub type CompletionListener = Arc<dyn Fn() + Send + Sync>;

/// Depth-one pass queue plus the in-flight cancellation token.
struct Slot<W> {
    queued: Option<Pass<W>>,
    in_flight: Option<Arc<AtomicBool>>,
    shutdown: bool,
}

struct Shared<W> {
    slot: Mutex<Slot<W>>,
    wake: Condvar,
    cache: Mutex<WindowCache<W>>,
    listener: Mutex<Option<CompletionListener>>,
}

/// Owns the worker thread and the shared widget cache.
///
/// Dropping the scheduler cancels any in-flight pass, wakes the worker,
/// and joins it.
pub struct UpdateScheduler<W: Clone + Send + 'static> {
    shared: Arc<Shared<W>>,
    worker: Option<JoinHandle<()>>,
}

impl<W: Clone + Send + 'static> Default for UpdateScheduler<W> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Clone + Send + 'static> UpdateScheduler<W> {
    /// Spawn the worker and an empty cache.
    #[must_use]
    pub fn new() -> Self {
        let shared = Arc::new(Shared {
            slot: Mutex::new(Slot {
                queued: None,
                in_flight: None,
                shutdown: false,
            }),
            wake: Condvar::new(),
            cache: Mutex::new(WindowCache::new()),
            listener: Mutex::new(None),
        });
        let worker = thread::Builder::new()
            .name("lazyrow-window".into())
            .spawn({
                let shared = Arc::clone(&shared);
                move || worker_loop(&shared)
            })
            .expect("failed to spawn windowing worker");
        Self {
            shared,
            worker: Some(worker),
        }
    }

    /// Cancel the in-flight pass, replace any queued pass, and submit.
    ///
    /// The registered completion listener is snapshotted into the pass at
    /// this moment; later listener changes do not affect it.
    pub fn trigger(&self, mut pass: Pass<W>) {
        let listener = self
            .shared
            .listener
            .lock()
            .expect(LISTENER_POISONED)
            .clone();
        pass.set_listener(listener);
        let mut slot = self.shared.slot.lock().expect(SLOT_POISONED);
        if let Some(token) = &slot.in_flight {
            token.store(true, Ordering::SeqCst);
        }
        if slot.queued.replace(pass).is_some() {
            debug!("queued pass superseded before running");
        }
        drop(slot);
        self.shared.wake.notify_one();
    }

    /// Cancel the in-flight pass and discard any queued one without
    /// submitting a replacement.
    pub fn cancel_in_flight(&self) {
        let mut slot = self.shared.slot.lock().expect(SLOT_POISONED);
        if let Some(token) = &slot.in_flight {
            token.store(true, Ordering::SeqCst);
        }
        slot.queued = None;
    }

    /// Cancel everything and clear the shared cache, as if no pass had
    /// ever run.
    ///
    /// A pass that is mid-mutation finishes that mutation before it
    /// observes the cancellation; its already-memoized handles are cleared
    /// here regardless.
    pub fn reset(&self) {
        self.cancel_in_flight();
        self.shared.cache.lock().expect(CACHE_POISONED).clear();
        debug!("scheduler reset; cache cleared");
    }

    /// Register (or clear) the closure notified on full pass completion.
    pub fn set_completion_listener(&self, listener: Option<CompletionListener>) {
        *self.shared.listener.lock().expect(LISTENER_POISONED) = listener;
    }

    /// Currently cached (index, handle) pairs in ascending index order.
    ///
    /// After any completed pass this is exactly the materialized window.
    #[must_use]
    pub fn cached_widgets(&self) -> Vec<(usize, W)> {
        self.shared
            .cache
            .lock()
            .expect(CACHE_POISONED)
            .sorted_entries()
    }
}

impl<W: Clone + Send + 'static> Drop for UpdateScheduler<W> {
    fn drop(&mut self) {
        {
            let mut slot = self.shared.slot.lock().expect(SLOT_POISONED);
            slot.shutdown = true;
            slot.queued = None;
            if let Some(token) = &slot.in_flight {
                token.store(true, Ordering::SeqCst);
            }
        }
        self.shared.wake.notify_one();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

fn worker_loop<W: Clone + Send>(shared: &Shared<W>) {
    loop {
        let mut pass = {
            let mut slot = shared.slot.lock().expect(SLOT_POISONED);
            loop {
                if slot.shutdown {
                    return;
                }
                if let Some(pass) = slot.queued.take() {
                    slot.in_flight = Some(pass.cancel_token());
                    break pass;
                }
                slot = shared.wake.wait(slot).expect(SLOT_POISONED);
            }
        };

        let token = pass.cancel_token();
        let listener = pass.take_listener();
        let result = pass.run(&shared.cache);
        shared.slot.lock().expect(SLOT_POISONED).in_flight = None;

        match result {
            Ok(PassOutcome::Completed) => {
                if !token.load(Ordering::SeqCst)
                    && let Some(listener) = listener
                {
                    listener();
                }
                debug!("windowing pass completed");
            }
            Ok(PassOutcome::Cancelled) => debug!("windowing pass cancelled"),
            Err(error) => error!(%error, "windowing pass abandoned"),
        }
    }
}
