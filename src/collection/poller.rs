//! The periodic driver that runs a sampler and publishes its snapshots.

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use tokio::{
    sync::mpsc,
    time::{interval_at, Instant, MissedTickBehavior},
};

use super::error::{CollectionError, CollectionResult};
use crate::utils::cancellation_token::CancellationToken;

/// Something that produces one snapshot per poll.
///
/// `sample` is called from a blocking-friendly thread and never concurrently
/// with itself, so implementors can keep cross-poll state in `&mut self`
/// without locking.
pub trait Sampler: Send + 'static {
    type Snapshot: Send + 'static;

    /// A short name for logging.
    fn name(&self) -> &'static str;

    fn sample(&mut self) -> CollectionResult<Self::Snapshot>;
}

/// A sampler and the sending half of its stream, waiting for [`MetricPoller::start`].
type Pending<S> = (S, mpsc::Sender<<S as Sampler>::Snapshot>);

/// Runs a [`Sampler`] on a fixed interval and publishes each successful
/// snapshot.
///
/// A poller is created, started once, and stopped once; stopping is terminal.
/// Snapshots go out on a single-slot channel, so a slow consumer causes
/// snapshots to wait rather than pile up. A failed poll is logged and skipped.
///
/// The stream is not a rendezvous: one snapshot may sit in the slot, so a
/// consumer can read a snapshot that is a tick old, and can still read that
/// one buffered snapshot after [`MetricPoller::stop`] returns.
pub struct MetricPoller<S: Sampler> {
    name: &'static str,
    update_rate: Duration,
    pending: Mutex<Option<Pending<S>>>,
    stopped: Arc<Mutex<bool>>,
    cancellation: Arc<CancellationToken>,
}

impl<S: Sampler> std::fmt::Debug for MetricPoller<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricPoller")
            .field("name", &self.name)
            .field("update_rate", &self.update_rate)
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

impl<S: Sampler> MetricPoller<S> {
    /// Creates a poller and the stream its snapshots are published on. Nothing
    /// runs until [`MetricPoller::start`] is called.
    pub fn new(sampler: S, update_rate: Duration) -> (Self, mpsc::Receiver<S::Snapshot>) {
        let (sender, receiver) = mpsc::channel(1);

        let poller = Self {
            name: sampler.name(),
            update_rate,
            pending: Mutex::new(Some((sampler, sender))),
            stopped: Arc::new(Mutex::new(false)),
            cancellation: Arc::new(CancellationToken::default()),
        };

        (poller, receiver)
    }

    /// Starts polling in the background on the current tokio runtime.
    ///
    /// Calling this on a running or stopped poller does nothing.
    pub fn start(&self) -> CollectionResult<()> {
        if self.is_stopped() {
            log::debug!("Not starting the {} poller, it was already stopped.", self.name);
            return Ok(());
        }

        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|err| CollectionError::General(err.into()))?;

        let Some((sampler, sender)) = self.take_pending() else {
            return Ok(());
        };

        log::debug!("Starting the {} poller.", self.name);
        runtime.spawn(poll_loop(
            sampler,
            sender,
            self.update_rate,
            self.stopped.clone(),
            self.cancellation.clone(),
        ));

        Ok(())
    }

    /// Stops polling. Once this returns, no more snapshots will be published,
    /// and the stream closes once the background task has wound down. A
    /// snapshot already sitting in the slot can still be received.
    ///
    /// This is safe to call more than once.
    pub fn stop(&self) {
        {
            let mut stopped = self.stopped.lock().expect("stop lock should not be poisoned");
            if *stopped {
                return;
            }
            *stopped = true;
        }

        log::debug!("Stopping the {} poller.", self.name);
        self.cancellation.cancel();

        // If we never started, this drops the sender and closes the stream.
        drop(self.take_pending());
    }

    pub fn is_stopped(&self) -> bool {
        *self.stopped.lock().expect("stop lock should not be poisoned")
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    fn take_pending(&self) -> Option<Pending<S>> {
        self.pending
            .lock()
            .expect("pending lock should not be poisoned")
            .take()
    }
}

impl<S: Sampler> Drop for MetricPoller<S> {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn poll_loop<S: Sampler>(
    mut sampler: S, sender: mpsc::Sender<S::Snapshot>, update_rate: Duration,
    stopped: Arc<Mutex<bool>>, cancellation: Arc<CancellationToken>,
) {
    let name = sampler.name();
    let mut ticker = interval_at(Instant::now() + update_rate, update_rate);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancellation.cancelled() => break,
            _ = ticker.tick() => {}
        }

        // Sampling blocks on I/O, so move it off the async workers for the
        // duration of the poll.
        let (returned, result) = match tokio::task::spawn_blocking(move || {
            let result = sampler.sample();
            (sampler, result)
        })
        .await
        {
            Ok(res) => res,
            Err(err) => {
                log::error!("The {name} sampler panicked, stopping the poller: {err}");
                break;
            }
        };
        sampler = returned;

        let snapshot = match result {
            Ok(snapshot) => snapshot,
            Err(err) => {
                log::warn!("Skipping a {name} poll: {err}");
                continue;
            }
        };

        let permit = tokio::select! {
            biased;
            _ = cancellation.cancelled() => break,
            permit = sender.reserve() => match permit {
                Ok(permit) => permit,
                Err(_) => {
                    log::debug!("The {name} stream has no receiver, stopping the poller.");
                    break;
                }
            },
        };

        // Publish under the stop lock, so nothing gets out after stop() returns.
        let is_stopped = stopped.lock().expect("stop lock should not be poisoned");
        if *is_stopped {
            break;
        }
        permit.send(snapshot);
    }

    log::debug!("The {name} poller has exited.");
}
