//! The designated context that completions run on.
//!
//! # Design
//! Requests finish on runtime worker tasks, but completions are never called
//! from there. Each finished request sends its completion through a
//! [`Dispatcher`] to the single [`DeliveryLoop`], and the caller drives that
//! loop from whichever task owns the state its completions mutate. Jobs run
//! one at a time in the order they were dispatched.

use std::fmt;

use tokio::sync::mpsc;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Create a connected dispatcher/loop pair.
pub fn delivery_queue() -> (Dispatcher, DeliveryLoop) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Dispatcher { tx }, DeliveryLoop { rx })
}

/// Sending half, held by the provider and every in-flight request.
#[derive(Clone)]
pub struct Dispatcher {
    tx: mpsc::UnboundedSender<Job>,
}

impl Dispatcher {
    pub(crate) fn dispatch(&self, job: impl FnOnce() + Send + 'static) {
        if self.tx.send(Box::new(job)).is_err() {
            tracing::warn!("delivery loop is gone; dropping completion");
        }
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("closed", &self.tx.is_closed())
            .finish()
    }
}

/// Receiving half; runs completions on the task that drives it.
pub struct DeliveryLoop {
    rx: mpsc::UnboundedReceiver<Job>,
}

impl DeliveryLoop {
    /// Run completions until every [`Dispatcher`] has been dropped.
    pub async fn run(mut self) {
        while self.run_one().await {}
    }

    /// Wait for and run one completion. Returns `false` once no dispatcher is left.
    pub async fn run_one(&mut self) -> bool {
        match self.rx.recv().await {
            Some(job) => {
                job();
                true
            }
            None => false,
        }
    }

    /// Run every completion already queued, without waiting. Returns how many ran.
    pub fn run_pending(&mut self) -> usize {
        let mut ran = 0;
        while let Ok(job) = self.rx.try_recv() {
            job();
            ran += 1;
        }
        ran
    }
}

impl fmt::Debug for DeliveryLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeliveryLoop").finish_non_exhaustive()
    }
}
