use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use image::RgbImage;

use crate::{DetectError, Detection, Detector};

struct Job {
    frame: RgbImage,
    confidence_threshold: f32,
    reply: Sender<Result<Vec<Detection>, DetectError>>,
}

/// Clears the in-flight flag when a job ends, including by panic.
struct InFlight(Arc<AtomicBool>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Bounds the latency of another detector.
///
/// Inference runs on one long-lived `marksman-detect` thread. A call that
/// does not get its result within the timeout returns
/// [`DetectError::Timeout`]; the stalled inference keeps the thread and every
/// call made before it finishes fails at once with [`DetectError::Busy`].
/// At most one inference and one frame are ever held.
pub struct DeadlineDetector {
    inner: Arc<dyn Detector>,
    timeout: Duration,
    in_flight: Arc<AtomicBool>,
    jobs: Mutex<Option<Sender<Job>>>,
}

impl DeadlineDetector {
    pub fn new(inner: Arc<dyn Detector>, timeout: Duration) -> Self {
        Self {
            inner,
            timeout,
            in_flight: Arc::new(AtomicBool::new(false)),
            jobs: Mutex::new(None),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// `true` while an inference, timed out or not, is still running.
    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    fn spawn_worker(&self) -> Result<Sender<Job>, DetectError> {
        let (tx, rx) = mpsc::channel();
        let inner = Arc::clone(&self.inner);
        let in_flight = Arc::clone(&self.in_flight);
        thread::Builder::new()
            .name("marksman-detect".into())
            .spawn(move || serve(inner.as_ref(), &in_flight, rx))
            .map_err(|e| DetectError::Inference(format!("cannot spawn inference thread: {e}")))?;
        Ok(tx)
    }

    /// Hand `job` to the inference thread, starting a new one when the
    /// previous thread is gone.
    fn submit(&self, job: Job) -> Result<(), DetectError> {
        let mut jobs = self.jobs.lock().unwrap_or_else(PoisonError::into_inner);
        let job = match jobs.as_ref() {
            Some(tx) => match tx.send(job) {
                Ok(()) => return Ok(()),
                Err(mpsc::SendError(job)) => {
                    log::warn!("{} inference thread exited; restarting", self.inner.name());
                    job
                }
            },
            None => job,
        };
        let tx = self.spawn_worker()?;
        tx.send(job)
            .map_err(|_| DetectError::Inference("inference thread exited".to_string()))?;
        *jobs = Some(tx);
        Ok(())
    }
}

fn serve(inner: &dyn Detector, in_flight: &Arc<AtomicBool>, jobs: Receiver<Job>) {
    for job in jobs {
        let guard = InFlight(Arc::clone(in_flight));
        let result = inner.detect(&job.frame, job.confidence_threshold);
        drop(guard);
        // The caller stopped waiting when the deadline passed.
        if job.reply.send(result).is_err() {
            log::debug!("{}: late inference result discarded", inner.name());
        }
    }
}

impl Detector for DeadlineDetector {
    fn detect(
        &self,
        image: &RgbImage,
        confidence_threshold: f32,
    ) -> Result<Vec<Detection>, DetectError> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            log::warn!("{}: previous inference still running", self.inner.name());
            return Err(DetectError::Busy);
        }

        let (reply, rx) = mpsc::channel();
        let job = Job {
            frame: image.clone(),
            confidence_threshold,
            reply,
        };
        if let Err(e) = self.submit(job) {
            self.in_flight.store(false, Ordering::SeqCst);
            return Err(e);
        }

        match rx.recv_timeout(self.timeout) {
            Ok(result) => result,
            Err(mpsc::RecvTimeoutError::Timeout) => {
                log::warn!(
                    "{} inference exceeded {:?}",
                    self.inner.name(),
                    self.timeout
                );
                Err(DetectError::Timeout {
                    timeout: self.timeout,
                })
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                // The thread is unwinding; the next call starts a fresh one.
                *self.jobs.lock().unwrap_or_else(PoisonError::into_inner) = None;
                Err(DetectError::Inference(
                    "inference thread panicked".to_string(),
                ))
            }
        }
    }

    /// Warm-up is expected to be slow and runs without the deadline.
    fn warm_up(&self) -> Result<(), DetectError> {
        self.inner.warm_up()
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BoundingBox, ReplayDetector};
    use std::sync::atomic::AtomicUsize;
    use std::time::Instant;

    fn one() -> Vec<Detection> {
        vec![Detection::new(
            "bia_so_4",
            0.8,
            BoundingBox::new(0.0, 0.0, 5.0, 5.0),
        )]
    }

    /// Sleeps, and records how many inferences overlap.
    #[derive(Default)]
    struct Stalling {
        delay: Duration,
        running: AtomicUsize,
        peak: AtomicUsize,
        calls: AtomicUsize,
    }

    impl Detector for Stalling {
        fn detect(&self, _image: &RgbImage, _threshold: f32) -> Result<Vec<Detection>, DetectError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            thread::sleep(self.delay);
            self.running.fetch_sub(1, Ordering::SeqCst);
            Ok(Vec::new())
        }
    }

    struct Panicking;

    impl Detector for Panicking {
        fn detect(&self, image: &RgbImage, _threshold: f32) -> Result<Vec<Detection>, DetectError> {
            if image.width() == 1 {
                panic!("model crashed");
            }
            Ok(Vec::new())
        }
    }

    fn wait_idle(det: &DeadlineDetector) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while det.is_busy() {
            assert!(Instant::now() < deadline, "inference never finished");
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn fast_inner_passes_through() {
        let det = DeadlineDetector::new(
            Arc::new(ReplayDetector::new(one())),
            Duration::from_secs(5),
        );
        let out = det.detect(&RgbImage::new(8, 8), 0.1).expect("in time");
        assert_eq!(out, one());
        let again = det.detect(&RgbImage::new(8, 8), 0.1).expect("in time");
        assert_eq!(again, one());
    }

    #[test]
    fn slow_inner_times_out() {
        let timeout = Duration::from_millis(20);
        let det = DeadlineDetector::new(
            Arc::new(ReplayDetector::new(one()).with_delay(Duration::from_millis(500))),
            timeout,
        );
        let err = det.detect(&RgbImage::new(8, 8), 0.1).unwrap_err();
        assert_eq!(err, DetectError::Timeout { timeout });
    }

    #[test]
    fn stalled_model_holds_one_inference_at_most() {
        let inner = Arc::new(Stalling {
            delay: Duration::from_millis(300),
            ..Stalling::default()
        });
        let det = DeadlineDetector::new(inner.clone(), Duration::from_millis(5));
        let frame = RgbImage::new(8, 8);

        assert!(matches!(
            det.detect(&frame, 0.1),
            Err(DetectError::Timeout { .. })
        ));
        for _ in 0..50 {
            assert_eq!(det.detect(&frame, 0.1), Err(DetectError::Busy));
        }
        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);
        assert_eq!(inner.peak.load(Ordering::SeqCst), 1);

        wait_idle(&det);
        assert!(matches!(
            det.detect(&frame, 0.1),
            Err(DetectError::Timeout { .. })
        ));
        assert_eq!(inner.calls.load(Ordering::SeqCst), 2);
        assert_eq!(inner.peak.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn panicking_model_is_reported_and_replaced() {
        let det = DeadlineDetector::new(Arc::new(Panicking), Duration::from_secs(5));
        let err = det.detect(&RgbImage::new(1, 1), 0.1).unwrap_err();
        assert!(matches!(err, DetectError::Inference(_)), "{err:?}");
        wait_idle(&det);
        assert_eq!(det.detect(&RgbImage::new(8, 8), 0.1), Ok(Vec::new()));
    }

    #[test]
    fn warm_up_ignores_deadline() {
        let inner = Arc::new(ReplayDetector::new(one()).with_delay(Duration::from_millis(50)));
        let det = DeadlineDetector::new(inner.clone(), Duration::from_millis(1));
        det.warm_up().expect("warm-up is not bounded");
        assert_eq!(inner.calls(), 1);
    }
}
