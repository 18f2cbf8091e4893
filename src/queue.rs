//! Queue & Slot Manager (C6): bounds how many translations run at once and
//! how many more may wait, and estimates a `Retry-After` for callers who
//! get turned away (spec §4.6).

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};

use crate::config::Config;
use crate::error::ServeError;

/// Exponential moving average of completed-translation durations, used to
/// size `Retry-After` on 429/503 responses (spec §4.6, "Retry-After
/// estimation").
#[derive(Debug)]
struct DurationEma {
    value_sec: f64,
    alpha: f64,
}

impl DurationEma {
    fn new(alpha: f64) -> Self {
        DurationEma {
            value_sec: 1.0,
            alpha,
        }
    }

    fn observe(&mut self, sample: Duration) {
        let sample_sec = sample.as_secs_f64();
        self.value_sec = self.alpha * sample_sec + (1.0 - self.alpha) * self.value_sec;
    }
}

/// Holds a translation slot. The slot is released when this value drops;
/// callers should call `record_duration` first so the EMA reflects it.
#[derive(Debug)]
pub struct Slot<'a> {
    queue: &'a Queue,
    _permit: OwnedSemaphorePermit,
}

impl<'a> Slot<'a> {
    pub fn record_duration(&self, duration: Duration) {
        if let Ok(mut ema) = self.queue.ema.try_lock() {
            ema.observe(duration);
        }
    }
}

/// Decrements `waiting` on drop, however the holder is dropped — including
/// cancellation of the `acquire_owned().await` below (e.g. the orchestrator's
/// `tokio::time::timeout` firing mid-wait). Without this, a timed-out caller
/// would leak its reservation in `waiting` forever (spec §5, "no slot is
/// leaked").
struct WaitingGuard<'a> {
    waiting: &'a AtomicUsize,
}

impl<'a> WaitingGuard<'a> {
    fn enter(waiting: &'a AtomicUsize) -> (Self, usize) {
        let position = waiting.fetch_add(1, Ordering::SeqCst) + 1;
        (WaitingGuard { waiting }, position)
    }
}

impl Drop for WaitingGuard<'_> {
    fn drop(&mut self) {
        self.waiting.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Debug)]
pub struct Queue {
    semaphore: Arc<Semaphore>,
    waiting: AtomicUsize,
    enabled: bool,
    max_queue_size: usize,
    ema: Mutex<DurationEma>,
    retry_after_min_sec: f64,
    retry_after_max_sec: f64,
}

impl Queue {
    pub fn new(cfg: &Config, max_inflight: usize) -> Self {
        Queue {
            semaphore: Arc::new(Semaphore::new(max_inflight)),
            waiting: AtomicUsize::new(0),
            enabled: cfg.enable_queue,
            max_queue_size: cfg.max_queue_size,
            ema: Mutex::new(DurationEma::new(cfg.retry_after_alpha)),
            retry_after_min_sec: cfg.retry_after_min_sec,
            retry_after_max_sec: cfg.retry_after_max_sec,
        }
    }

    pub fn inflight_capacity(&self) -> usize {
        self.semaphore.available_permits()
    }

    pub fn queued(&self) -> usize {
        self.waiting.load(Ordering::SeqCst)
    }

    /// Admits the caller to a translation slot, queueing FIFO via the
    /// semaphore's own wait list when one isn't free (spec §4.6). With
    /// `ENABLE_QUEUE=false`, only the slots themselves exist: a caller that
    /// can't get one immediately is turned away rather than queued.
    pub async fn acquire(&self) -> Result<Slot<'_>, ServeError> {
        if !self.enabled {
            return match self.semaphore.clone().try_acquire_owned() {
                Ok(permit) => Ok(Slot {
                    queue: self,
                    _permit: permit,
                }),
                Err(_) => Err(ServeError::ServiceBusy {
                    retry_after_sec: self.estimate_retry_after(1),
                }),
            };
        }

        let (guard, position) = WaitingGuard::enter(&self.waiting);
        if position > self.max_queue_size {
            return Err(ServeError::QueueOverflow {
                retry_after_sec: self.estimate_retry_after(position),
            });
        }

        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .expect("semaphore is never closed");
        drop(guard);
        Ok(Slot {
            queue: self,
            _permit: permit,
        })
    }

    fn estimate_retry_after(&self, queue_position: usize) -> u64 {
        let ema_sec = self
            .ema
            .try_lock()
            .map(|ema| ema.value_sec)
            .unwrap_or(1.0);
        let estimate = ema_sec * queue_position as f64;
        estimate
            .clamp(self.retry_after_min_sec, self.retry_after_max_sec)
            .ceil() as u64
    }
}
