use std::future::Future;
use std::ops::ControlFlow;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{Level, event};

/// A job run on the tokio runtime once per period until cancelled or until it breaks.
///
/// The first run happens one period after spawning. A run that is still in flight when the task
/// is cancelled is dropped at its next await point.
#[derive(Debug)]
pub struct PeriodicTask {
    cancel_token: CancellationToken,
    handle: JoinHandle<()>,
}

impl PeriodicTask {
    pub fn spawn<F, Fut>(period: Duration, cancel_token: CancellationToken, mut job: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ControlFlow<()>> + Send,
    {
        let token = cancel_token.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                let flow = tokio::select! {
                    _ = token.cancelled() => break,
                    flow = job() => flow,
                };
                if flow.is_break() {
                    break;
                }
            }
            event!(Level::DEBUG, "Periodic task stopped");
        });

        PeriodicTask { cancel_token, handle }
    }

    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for PeriodicTask {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}
