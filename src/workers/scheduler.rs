use std::future::Future;
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info};

/// Owner of every background task in the service: encode workers, the
/// retention sweep and delayed file cleanups.
///
/// Tasks are tracked so that [`shutdown`](TaskScheduler::shutdown) can stop
/// them and wait for them to unwind.
#[derive(Clone)]
pub struct TaskScheduler {
    shutdown: CancellationToken,
    tracker: TaskTracker,
}

impl Default for TaskScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskScheduler {
    pub fn new() -> Self {
        Self {
            shutdown: CancellationToken::new(),
            tracker: TaskTracker::new(),
        }
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Runs `task` until it finishes or the scheduler shuts down.
    pub fn spawn<F>(&self, name: &'static str, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let token = self.shutdown.clone();
        self.tracker.spawn(async move {
            tokio::select! {
                _ = token.cancelled() => debug!(task = name, "Task stopped by shutdown"),
                _ = task => {}
            }
        });
    }

    /// Calls `tick` every `period`, starting one period from now.
    pub fn spawn_periodic<F, Fut>(&self, name: &'static str, period: Duration, mut tick: F)
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let period = period.max(Duration::from_millis(1));
        self.spawn(name, async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                tick().await;
            }
        });
    }

    /// Runs `task` once after `delay`.
    pub fn spawn_after<F>(&self, name: &'static str, delay: Duration, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.spawn(name, async move {
            tokio::time::sleep(delay).await;
            task.await;
        });
    }

    /// Stops all tasks and waits until they have been dropped.
    pub async fn shutdown(&self) {
        info!(tasks = self.tracker.len(), "Stopping background tasks");
        self.shutdown.cancel();
        self.tracker.close();
        self.tracker.wait().await;
    }
}
