//! Single-worker shot queue.
//!
//! Shots are scored one at a time on a dedicated thread so the caller (a
//! frame display loop, a trigger listener) never blocks on scoring.

use std::collections::VecDeque;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use crate::orchestrator::ScoreResult;
use crate::pipeline::{ShotError, ShotPipeline, ShotRequest};
use crate::QueuePolicy;

/// Outcome of the shot submitted under ticket `id`.
#[derive(Debug)]
pub struct ShotEvent {
    pub id: u64,
    pub outcome: Result<ScoreResult, ShotError>,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SubmitError {
    #[error("shot queue is full ({capacity} pending)")]
    QueueFull { capacity: usize },
    #[error("shot worker has stopped")]
    Stopped,
}

#[derive(Default)]
struct Queue {
    pending: VecDeque<(u64, ShotRequest)>,
    next_id: u64,
    stopping: bool,
}

#[derive(Default)]
struct Shared {
    queue: Mutex<Queue>,
    ready: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Queue> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Owns the scoring thread. Dropping the worker discards pending shots and
/// joins the thread after the in-flight shot finishes.
pub struct ShotWorker {
    shared: Arc<Shared>,
    policy: QueuePolicy,
    events: Sender<ShotEvent>,
    handle: Option<JoinHandle<()>>,
}

impl ShotWorker {
    pub fn spawn(
        pipeline: ShotPipeline,
        policy: QueuePolicy,
    ) -> std::io::Result<(Self, Receiver<ShotEvent>)> {
        let shared = Arc::new(Shared::default());
        let (tx, rx) = mpsc::channel();
        let handle = {
            let shared = Arc::clone(&shared);
            let tx = tx.clone();
            thread::Builder::new()
                .name("shot-worker".into())
                .spawn(move || run(pipeline, &shared, &tx))?
        };
        Ok((
            Self {
                shared,
                policy,
                events: tx,
                handle: Some(handle),
            },
            rx,
        ))
    }

    /// Spawn with the queue policy the pipeline was configured with.
    pub fn start(pipeline: ShotPipeline) -> std::io::Result<(Self, Receiver<ShotEvent>)> {
        let policy = pipeline.context().queue_policy();
        Self::spawn(pipeline, policy)
    }

    pub fn policy(&self) -> QueuePolicy {
        self.policy
    }

    /// Queue a shot; returns its ticket id.
    pub fn submit(&self, request: ShotRequest) -> Result<u64, SubmitError> {
        if self.handle.as_ref().is_none_or(JoinHandle::is_finished) {
            return Err(SubmitError::Stopped);
        }
        let mut queue = self.shared.lock();
        if queue.stopping {
            return Err(SubmitError::Stopped);
        }
        match self.policy {
            QueuePolicy::Bounded { capacity } => {
                if queue.pending.len() >= capacity {
                    log::warn!("rejecting shot: {capacity} already pending");
                    return Err(SubmitError::QueueFull { capacity });
                }
            }
            QueuePolicy::LatestOnly => {
                for (id, _) in queue.pending.drain(..) {
                    log::debug!("shot {id} superseded");
                    let event = ShotEvent {
                        id,
                        outcome: Err(ShotError::Superseded),
                    };
                    if self.events.send(event).is_err() {
                        log::debug!("shot {id}: nobody is listening for results");
                    }
                }
            }
        }
        let id = queue.next_id;
        queue.next_id += 1;
        queue.pending.push_back((id, request));
        drop(queue);
        self.shared.ready.notify_one();
        Ok(id)
    }

    /// Shots waiting behind the one being scored.
    pub fn pending(&self) -> usize {
        self.shared.lock().pending.len()
    }
}

impl Drop for ShotWorker {
    fn drop(&mut self) {
        {
            let mut queue = self.shared.lock();
            queue.stopping = true;
            if !queue.pending.is_empty() {
                log::info!("discarding {} pending shots", queue.pending.len());
                queue.pending.clear();
            }
        }
        self.shared.ready.notify_all();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("shot worker panicked");
            }
        }
    }
}

fn run(pipeline: ShotPipeline, shared: &Shared, events: &Sender<ShotEvent>) {
    loop {
        let (id, request) = {
            let mut queue = shared.lock();
            loop {
                if queue.stopping {
                    return;
                }
                if let Some(next) = queue.pending.pop_front() {
                    break next;
                }
                queue = shared
                    .ready
                    .wait(queue)
                    .unwrap_or_else(PoisonError::into_inner);
            }
        };
        let outcome = pipeline.process_shot(&request);
        match &outcome {
            Ok(r) => log::info!("shot {id}: score {} in {:.2?}", r.score, r.elapsed),
            Err(e) => log::warn!("shot {id} failed: {e}"),
        }
        if events.send(ShotEvent { id, outcome }).is_err() {
            log::debug!("shot {id}: nobody is listening for results");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{PipelineContext, TrainerConfig};
    use image::RgbImage;
    use marksman_detect::ReplayDetector;
    use std::time::{Duration, Instant};

    fn pipeline_with(cfg: &TrainerConfig, delay: Option<Duration>) -> ShotPipeline {
        let mut det = ReplayDetector::new(Vec::new());
        if let Some(d) = delay {
            det = det.with_delay(d);
        }
        let ctx = PipelineContext::from_assets(cfg, Arc::new(det), Vec::new());
        ShotPipeline::new(Arc::new(ctx)).expect("pipeline")
    }

    fn pipeline(delay: Option<Duration>) -> ShotPipeline {
        pipeline_with(&TrainerConfig::default(), delay)
    }

    fn shot() -> ShotRequest {
        ShotRequest::new(RgbImage::new(64, 48))
    }

    fn wait_until_in_flight(worker: &ShotWorker) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while worker.pending() > 0 {
            assert!(Instant::now() < deadline, "worker never picked the shot up");
            thread::sleep(Duration::from_millis(2));
        }
    }

    #[test]
    fn results_arrive_in_submission_order() {
        let (worker, events) =
            ShotWorker::spawn(pipeline(None), QueuePolicy::Bounded { capacity: 4 }).expect("spawn");
        let a = worker.submit(shot()).expect("submit");
        let b = worker.submit(shot()).expect("submit");
        let first = events.recv_timeout(Duration::from_secs(5)).expect("event");
        let second = events.recv_timeout(Duration::from_secs(5)).expect("event");
        assert_eq!((first.id, second.id), (a, b));
        assert_eq!(first.outcome.expect("miss result").score, 0);
    }

    #[test]
    fn start_uses_configured_policy() {
        let (worker, _events) = ShotWorker::start(pipeline(None)).expect("start");
        assert_eq!(worker.policy(), QueuePolicy::Bounded { capacity: 8 });

        let cfg = TrainerConfig {
            queue: QueuePolicy::LatestOnly,
            ..TrainerConfig::default()
        };
        let (worker, _events) = ShotWorker::start(pipeline_with(&cfg, None)).expect("start");
        assert_eq!(worker.policy(), QueuePolicy::LatestOnly);
    }

    #[test]
    fn bounded_queue_rejects_when_full() {
        let cfg = TrainerConfig {
            queue: QueuePolicy::Bounded { capacity: 1 },
            ..TrainerConfig::default()
        };
        let (worker, _events) =
            ShotWorker::start(pipeline_with(&cfg, Some(Duration::from_millis(300)))).expect("start");
        worker.submit(shot()).expect("first");
        wait_until_in_flight(&worker);
        worker.submit(shot()).expect("second waits");
        assert_eq!(
            worker.submit(shot()),
            Err(SubmitError::QueueFull { capacity: 1 })
        );
    }

    #[test]
    fn latest_only_supersedes_pending_shots() {
        let (worker, events) = ShotWorker::spawn(
            pipeline(Some(Duration::from_millis(200))),
            QueuePolicy::LatestOnly,
        )
        .expect("spawn");
        let first = worker.submit(shot()).expect("submit");
        wait_until_in_flight(&worker);
        let replaced = worker.submit(shot()).expect("submit");
        let latest = worker.submit(shot()).expect("submit");

        let mut got = Vec::new();
        for _ in 0..3 {
            got.push(events.recv_timeout(Duration::from_secs(5)).expect("event"));
        }
        let outcome = |id: u64| {
            got.iter()
                .find(|e| e.id == id)
                .map(|e| e.outcome.as_ref().map(|r| r.score).map_err(Clone::clone))
        };
        assert_eq!(outcome(replaced), Some(Err(ShotError::Superseded)));
        assert_eq!(outcome(first), Some(Ok(0)));
        assert_eq!(outcome(latest), Some(Ok(0)));
    }

    #[test]
    fn drop_joins_and_closes_events() {
        let (worker, events) =
            ShotWorker::spawn(pipeline(None), QueuePolicy::default()).expect("spawn");
        drop(worker);
        assert!(events.recv_timeout(Duration::from_secs(5)).is_err());
    }
}
