//! Analytics refresh pipeline
//!
//! Pulls the analytics snapshot right away and then periodically, and publishes the view state
//! derived from it. Polls are numbered with generations as they are issued - a result is applied
//! only if no later poll was issued in the meantime, and only while the run that issued it is
//! still active. Results of superseded polls are dropped on arrival.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info, warn};

mod view;

pub use view::AnalyticsView;

use crate::client::{Client, ErrorKind};
use crate::model::AnalyticsSnapshot;

/// Source of analytics snapshots
pub trait SnapshotSource: Send + Sync + 'static {
    fn snapshot(&self) -> impl Future<Output = Result<AnalyticsSnapshot, ErrorKind>> + Send;
}

impl SnapshotSource for Client {
    fn snapshot(&self) -> impl Future<Output = Result<AnalyticsSnapshot, ErrorKind>> + Send {
        self.analytics()
    }
}

/// What happened to a single poll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// New snapshot published
    Applied,
    /// Failure recorded, previous snapshot kept
    Failed,
    /// Result arrived after a later poll was issued, or was an authorization refusal
    Discarded,
    /// The run that issued the poll is no longer active
    Superseded,
}

/// Issued polls bookkeeping
#[derive(Debug, Default)]
struct Tracker {
    /// Active run, if any
    run: Option<u64>,
    /// Last run number handed out
    runs: u64,
    /// Generation of the most recently issued poll
    issued: u64,
}

struct Shared<S> {
    source: S,
    period: Duration,
    view: watch::Sender<AnalyticsView>,
    tracker: Mutex<Tracker>,
}

/// Scoped refresh run, to be passed back to `AnalyticsPipeline::stop`
///
/// Dropping the handle without stopping still cancels the timer.
#[derive(Debug)]
pub struct PipelineHandle {
    run: u64,
    task: JoinHandle<()>,
}

impl Drop for PipelineHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Analytics refresh pipeline
pub struct AnalyticsPipeline<S> {
    shared: Arc<Shared<S>>,
}

impl<S> Clone for AnalyticsPipeline<S> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<S: SnapshotSource> AnalyticsPipeline<S> {
    pub fn new(source: S, period: Duration) -> Self {
        let (view, _) = watch::channel(AnalyticsView::default());
        Self {
            shared: Arc::new(Shared {
                source,
                period,
                view,
                tracker: Mutex::new(Tracker::default()),
            }),
        }
    }

    /// Subscribes for view updates
    pub fn subscribe(&self) -> watch::Receiver<AnalyticsView> {
        self.shared.view.subscribe()
    }

    /// Current view state
    pub fn view(&self) -> AnalyticsView {
        self.shared.view.borrow().clone()
    }

    /// Starts refreshing - first poll is issued immediately
    ///
    /// Any previously started run is superseded.
    pub async fn start(&self) -> PipelineHandle {
        let run = {
            let mut tracker = self.shared.tracker.lock().await;
            tracker.runs += 1;
            tracker.run = Some(tracker.runs);
            tracker.runs
        };

        let shared = self.shared.clone();
        let task = tokio::spawn(async move { shared.run(run).await });

        info!(run, period = ?self.shared.period, "Analytics refresh started");
        PipelineHandle { run, task }
    }

    /// Stops refreshing
    ///
    /// Once this returns, no result is applied anymore - including polls still in flight.
    pub async fn stop(&self, handle: PipelineHandle) {
        {
            let mut tracker = self.shared.tracker.lock().await;
            if tracker.run == Some(handle.run) {
                tracker.run = None;
            }
        }

        info!(run = handle.run, "Analytics refresh stopped");
        drop(handle);
    }

    /// Issues an extra poll in the active run, outside of the schedule
    pub async fn refresh(&self) -> Outcome {
        let run = self.shared.tracker.lock().await.run;
        match run {
            Some(run) => self.shared.poll(run).await,
            None => Outcome::Superseded,
        }
    }
}

impl<S: SnapshotSource> Shared<S> {
    /// Polls on schedule until the run is superseded
    async fn run(&self, run: u64) {
        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            if self.poll(run).await == Outcome::Superseded {
                debug!(run, "Refresh run superseded");
                break;
            }
        }
    }

    async fn poll(&self, run: u64) -> Outcome {
        let Some(generation) = self.issue(run).await else {
            return Outcome::Superseded;
        };

        debug!(run, generation, "Pulling analytics snapshot");
        let result = self.source.snapshot().await;
        self.apply(run, generation, result).await
    }

    /// Hands out the next generation, if the run is still active
    async fn issue(&self, run: u64) -> Option<u64> {
        let mut tracker = self.tracker.lock().await;
        if tracker.run != Some(run) {
            return None;
        }

        tracker.issued += 1;
        Some(tracker.issued)
    }

    /// Publishes the poll result if it is still the latest one
    ///
    /// The tracker stays locked while publishing, so `stop` cannot interleave.
    async fn apply(
        &self,
        run: u64,
        generation: u64,
        result: Result<AnalyticsSnapshot, ErrorKind>,
    ) -> Outcome {
        let tracker = self.tracker.lock().await;
        if tracker.run != Some(run) {
            debug!(run, generation, "Dropping result of a stopped run");
            return Outcome::Superseded;
        }

        if tracker.issued != generation {
            debug!(
                generation,
                latest = tracker.issued,
                "Dropping result of a superseded poll"
            );
            return Outcome::Discarded;
        }

        match result {
            Ok(snapshot) => {
                debug!(
                    generation,
                    total = snapshot.total_attempts,
                    recent = snapshot.recent_attempts.len(),
                    "Analytics snapshot accepted"
                );
                self.view.send_modify(|view| view.accept(snapshot));
                Outcome::Applied
            }
            Err(err) if err.is_auth() => {
                debug!(%err, "Analytics refused, leaving it to the session gate");
                Outcome::Discarded
            }
            Err(err) => {
                warn!(%err, "Analytics refresh failed, keeping previous snapshot");
                self.view.send_modify(|view| view.fail(err));
                Outcome::Failed
            }
        }
    }
}
