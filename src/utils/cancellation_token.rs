use tokio::sync::watch;

/// A cancellation token.
///
/// Cancelling is sticky: once cancelled, it stays cancelled.
#[derive(Debug)]
pub struct CancellationToken {
    // Setting this to true marks the token as cancelled.
    state: watch::Sender<bool>,
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self {
            state: watch::Sender::new(false),
        }
    }
}

impl CancellationToken {
    /// Mark the [`CancellationToken`] as cancelled.
    ///
    /// This is idempotent, and once cancelled, will stay cancelled. Sending it
    /// again will not do anything.
    pub fn cancel(&self) {
        self.state.send_if_modified(|cancelled| {
            if *cancelled {
                false
            } else {
                *cancelled = true;
                true
            }
        });
    }

    /// Check the [`CancellationToken`]'s status. Note that this will not block.
    pub fn is_cancelled(&self) -> bool {
        *self.state.borrow()
    }

    /// Waits until the token is cancelled. Returns immediately if it already is.
    pub async fn cancelled(&self) {
        let mut receiver = self.state.subscribe();

        // This can't fail, as we hold the sender.
        let _ = receiver.wait_for(|cancelled| *cancelled).await;
    }
}
