use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{interval_at, timeout, Instant, MissedTickBehavior};

use super::error::TrackingError;
use super::proximity::ProximityTracker;
use super::sink::FixSink;
use super::source::LocationSource;
use super::types::TrackedFix;
use crate::config::TrackingConfig;
use crate::events::{AppEvent, EventBus};
use crate::settings::TrackingSettings;

/// Shortest flush period the worker will run with.
pub const MIN_FLUSH_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug)]
struct WorkerHandle {
    stop_tx: oneshot::Sender<()>,
    join: JoinHandle<()>,
}

/// Owns the proximity tracker and the background task that feeds it fixes
/// and periodically flushes committed ones to a [`FixSink`].
pub struct TrackingService {
    settings: TrackingSettings,
    flush_interval: Duration,
    write_timeout: Duration,
    sink: Arc<dyn FixSink>,
    events: Option<EventBus>,
    tracker: Arc<StdMutex<ProximityTracker>>,
    worker: Option<WorkerHandle>,
}

impl TrackingService {
    pub fn new(settings: TrackingSettings, config: &TrackingConfig, sink: Arc<dyn FixSink>) -> Self {
        Self {
            tracker: Arc::new(StdMutex::new(ProximityTracker::new(&settings))),
            settings,
            flush_interval: config.flush_interval.max(MIN_FLUSH_INTERVAL),
            write_timeout: config.sink_timeout,
            sink,
            events: None,
            worker: None,
        }
    }

    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    /// Committed fixes waiting for the next flush.
    pub fn pending(&self) -> usize {
        self.tracker.lock().unwrap().pending()
    }

    pub fn start(&mut self, source: &mut dyn LocationSource) -> Result<(), TrackingError> {
        if self.worker.is_some() {
            return Err(TrackingError::AlreadyRunning);
        }
        if !self.settings.enabled {
            return Err(TrackingError::Disabled);
        }

        let fixes = source.watch()?;
        let tracker = self.tracker.clone();
        let sink = self.sink.clone();
        let flush_interval = self.flush_interval;
        let write_timeout = self.write_timeout;
        let (stop_tx, stop_rx) = oneshot::channel();

        let join = tokio::spawn(async move {
            run_tracking_loop(tracker, sink, fixes, flush_interval, write_timeout, stop_rx).await;
        });
        self.worker = Some(WorkerHandle { stop_tx, join });

        log::info!(
            "Tracking started for {:?} (flush every {})",
            self.settings.employee_id,
            humantime::format_duration(flush_interval)
        );
        self.publish(true);
        Ok(())
    }

    /// Stops the flush timer and releases the location watch. Fixes still
    /// queued stay in the tracker; see [`flush_now`](Self::flush_now).
    /// A write in progress is abandoned and its batch dropped.
    pub async fn stop(&mut self) {
        if let Some(worker) = self.worker.take() {
            let _ = worker.stop_tx.send(());
            log_worker_exit(worker.join.await);
            log::info!("Tracking stopped");
            self.publish(false);
        }
    }

    /// Waits for the worker to end by itself, which it does once the location
    /// watch closes and the last batch is flushed.
    pub async fn join(&mut self) {
        if let Some(WorkerHandle { stop_tx, join }) = self.worker.take() {
            // Dropping the sender would read as a stop request.
            log_worker_exit(join.await);
            drop(stop_tx);
            self.publish(false);
        }
    }

    /// Flushes the queue immediately. Returns the number of records handed
    /// to the sink.
    pub async fn flush_now(&self) -> usize {
        flush_queue(&self.tracker, self.sink.as_ref(), self.write_timeout).await
    }

    fn publish(&self, enabled: bool) {
        if let Some(events) = &self.events {
            events.publish(AppEvent::TrackingStateChanged { enabled });
        }
    }
}

fn log_worker_exit(result: Result<(), JoinError>) {
    if let Err(e) = result {
        log::error!("Tracking worker failed: {}", e);
    }
}

/// Drains the tracker and writes the batch to `sink`. A write that fails or
/// outlasts `write_timeout` is logged and the batch dropped. Fixes committed
/// while the write is in flight wait for the next flush.
pub async fn flush_queue(
    tracker: &StdMutex<ProximityTracker>,
    sink: &dyn FixSink,
    write_timeout: Duration,
) -> usize {
    let batch = tracker.lock().unwrap().drain();
    if batch.is_empty() {
        return 0;
    }

    match timeout(write_timeout, sink.write_batch(&batch)).await {
        Ok(Ok(())) => log::debug!("Flushed {} tracked fixes", batch.len()),
        Ok(Err(e)) => log::error!("Dropping {} tracked fixes: {}", batch.len(), e),
        Err(_) => log::error!(
            "Dropping {} tracked fixes: sink did not answer within {}",
            batch.len(),
            humantime::format_duration(write_timeout)
        ),
    }
    batch.len()
}

async fn run_tracking_loop(
    tracker: Arc<StdMutex<ProximityTracker>>,
    sink: Arc<dyn FixSink>,
    mut fixes: mpsc::Receiver<TrackedFix>,
    flush_interval: Duration,
    write_timeout: Duration,
    mut stop_rx: oneshot::Receiver<()>,
) {
    let mut ticker = interval_at(Instant::now() + flush_interval, flush_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        let should_stop = tokio::select! {
            _ = &mut stop_rx => true,
            _ = ticker.tick() => {
                tokio::select! {
                    _ = flush_queue(&tracker, sink.as_ref(), write_timeout) => false,
                    _ = &mut stop_rx => true,
                }
            }
            fix = fixes.recv() => match fix {
                Some(fix) => {
                    tracker.lock().unwrap().offer(&fix, fix.timestamp_ms);
                    false
                }
                None => {
                    log::info!("Location watch ended");
                    flush_queue(&tracker, sink.as_ref(), write_timeout).await;
                    true
                }
            },
        };
        if should_stop {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::Topic;
    use crate::tracking::{ChannelLocationSource, SinkError, TrackedRecord};
    use crate::BoxFuture;

    #[derive(Default)]
    struct RecordingSink {
        batches: StdMutex<Vec<Vec<TrackedRecord>>>,
    }

    impl FixSink for RecordingSink {
        fn write_batch<'a>(
            &'a self,
            batch: &'a [TrackedRecord],
        ) -> BoxFuture<'a, Result<(), SinkError>> {
            self.batches.lock().unwrap().push(batch.to_vec());
            Box::pin(async { Ok(()) })
        }
    }

    struct FailingSink;

    impl FixSink for FailingSink {
        fn write_batch<'a>(
            &'a self,
            _batch: &'a [TrackedRecord],
        ) -> BoxFuture<'a, Result<(), SinkError>> {
            Box::pin(async { Err(SinkError::Status(500)) })
        }
    }

    /// Records each batch as the write starts, then takes `delay` to finish.
    struct SlowSink {
        delay: Duration,
        batches: StdMutex<Vec<Vec<TrackedRecord>>>,
    }

    impl FixSink for SlowSink {
        fn write_batch<'a>(
            &'a self,
            batch: &'a [TrackedRecord],
        ) -> BoxFuture<'a, Result<(), SinkError>> {
            self.batches.lock().unwrap().push(batch.to_vec());
            Box::pin(async move {
                tokio::time::sleep(self.delay).await;
                Ok(())
            })
        }
    }

    /// Never answers.
    struct HungSink;

    impl FixSink for HungSink {
        fn write_batch<'a>(
            &'a self,
            _batch: &'a [TrackedRecord],
        ) -> BoxFuture<'a, Result<(), SinkError>> {
            Box::pin(std::future::pending())
        }
    }

    const T0: i64 = 1_700_000_000_000;

    fn enabled() -> TrackingSettings {
        TrackingSettings {
            enabled: true,
            employee_id: "emp-3".into(),
            ..TrackingSettings::default()
        }
    }

    fn config(flush_ms: u64) -> TrackingConfig {
        TrackingConfig {
            sink_url: None,
            flush_interval: Duration::from_millis(flush_ms),
            sink_timeout: Duration::from_secs(60),
        }
    }

    fn fix(lat: f64, timestamp_ms: i64) -> TrackedFix {
        TrackedFix {
            lat,
            lon: -74.0,
            accuracy: 4.0,
            heading: None,
            speed: None,
            timestamp_ms,
        }
    }

    #[tokio::test]
    async fn throttles_and_flushes_periodically() {
        let sink = Arc::new(RecordingSink::default());
        let mut service = TrackingService::new(enabled(), &config(50), sink.clone());
        let (tx, mut source) = ChannelLocationSource::new(16);
        service.start(&mut source).unwrap();
        assert!(service.is_running());

        // 0.0001° of latitude is about 11 m; 0.001° about 111 m.
        tx.send(fix(40.7, T0)).await.unwrap();
        tx.send(fix(40.7001, T0 + 2_000)).await.unwrap();
        tx.send(fix(40.7001, T0 + 4_000)).await.unwrap();
        tx.send(fix(40.701, T0 + 6_000)).await.unwrap();

        tokio::time::sleep(Duration::from_millis(200)).await;
        service.stop().await;

        let batches = sink.batches.lock().unwrap();
        let records: Vec<_> = batches.iter().flatten().collect();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].lat, 40.7);
        assert_eq!(records[1].lat, 40.701);
        assert!(records.iter().all(|r| r.employee_id == "emp-3"));
        assert_eq!(service.pending(), 0);
    }

    #[tokio::test]
    async fn closed_watch_flushes_remaining() {
        let sink = Arc::new(RecordingSink::default());
        let mut service = TrackingService::new(enabled(), &config(60_000), sink.clone());
        let (tx, mut source) = ChannelLocationSource::new(4);
        service.start(&mut source).unwrap();

        tx.send(fix(40.7, T0)).await.unwrap();
        tx.send(fix(40.71, T0 + 1_000)).await.unwrap();
        drop(tx);
        service.join().await;

        assert!(!service.is_running());
        let batches = sink.batches.lock().unwrap();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 2);
    }

    #[tokio::test]
    async fn failed_flush_drops_batch() {
        let mut service = TrackingService::new(enabled(), &config(60_000), Arc::new(FailingSink));
        service.tracker.lock().unwrap().offer(&fix(40.7, T0), T0);

        assert_eq!(service.flush_now().await, 1);
        assert_eq!(service.pending(), 0);
        assert_eq!(service.flush_now().await, 0);
    }

    #[tokio::test]
    async fn zero_flush_interval_is_clamped() {
        let sink = Arc::new(RecordingSink::default());
        let config = TrackingConfig {
            flush_interval: Duration::ZERO,
            ..config(0)
        };
        let mut service = TrackingService::new(enabled(), &config, sink.clone());
        let (tx, mut source) = ChannelLocationSource::new(4);
        service.start(&mut source).unwrap();

        tx.send(fix(40.7, T0)).await.unwrap();
        drop(tx);
        service.join().await;

        assert!(!service.is_running());
        let batches = sink.batches.lock().unwrap();
        assert_eq!(batches.iter().map(Vec::len).sum::<usize>(), 1);
    }

    #[tokio::test]
    async fn stop_does_not_wait_for_a_hung_sink() {
        let mut service = TrackingService::new(enabled(), &config(20), Arc::new(HungSink));
        let (tx, mut source) = ChannelLocationSource::new(4);
        service.start(&mut source).unwrap();

        tx.send(fix(40.7, T0)).await.unwrap();
        // Long enough for a tick to start a write that never finishes.
        tokio::time::sleep(Duration::from_millis(80)).await;

        let stopped = tokio::time::timeout(Duration::from_secs(2), service.stop()).await;
        assert!(stopped.is_ok());
        assert!(!service.is_running());
    }

    #[tokio::test]
    async fn write_timeout_drops_batch() {
        let config = TrackingConfig {
            sink_timeout: Duration::from_millis(50),
            ..config(60_000)
        };
        let service = TrackingService::new(enabled(), &config, Arc::new(HungSink));
        service.tracker.lock().unwrap().offer(&fix(40.7, T0), T0);

        let flushed = tokio::time::timeout(Duration::from_secs(2), service.flush_now()).await;
        assert_eq!(flushed.ok(), Some(1));
        assert_eq!(service.pending(), 0);
    }

    #[tokio::test]
    async fn fixes_offered_during_a_write_go_in_the_next_batch() {
        let tracker = Arc::new(StdMutex::new(ProximityTracker::new(&enabled())));
        let sink = Arc::new(SlowSink {
            delay: Duration::from_millis(100),
            batches: StdMutex::new(Vec::new()),
        });
        tracker.lock().unwrap().offer(&fix(40.7, T0), T0);

        let first = tokio::spawn({
            let tracker = tracker.clone();
            let sink = sink.clone();
            async move { flush_queue(&tracker, sink.as_ref(), Duration::from_secs(5)).await }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(sink.batches.lock().unwrap().len(), 1);

        {
            let mut tracker = tracker.lock().unwrap();
            assert!(tracker.offer(&fix(40.71, T0 + 60_000), T0 + 60_000));
            assert!(tracker.offer(&fix(40.72, T0 + 120_000), T0 + 120_000));
            assert_eq!(tracker.pending(), 2);
        }

        assert_eq!(first.await.unwrap(), 1);
        assert_eq!(flush_queue(&tracker, sink.as_ref(), Duration::from_secs(5)).await, 2);

        let batches = sink.batches.lock().unwrap();
        let lats: Vec<Vec<f64>> = batches
            .iter()
            .map(|batch| batch.iter().map(|r| r.lat).collect())
            .collect();
        assert_eq!(lats, vec![vec![40.7], vec![40.71, 40.72]]);
        assert_eq!(tracker.lock().unwrap().pending(), 0);
    }

    #[tokio::test]
    async fn disabled_settings_do_not_start() {
        let mut service = TrackingService::new(
            TrackingSettings::default(),
            &config(1_000),
            Arc::new(RecordingSink::default()),
        );
        let (_tx, mut source) = ChannelLocationSource::new(1);
        assert_eq!(service.start(&mut source), Err(TrackingError::Disabled));
        assert!(!service.is_running());
    }

    #[tokio::test]
    async fn unavailable_geolocation_does_not_start() {
        let mut service =
            TrackingService::new(enabled(), &config(1_000), Arc::new(RecordingSink::default()));
        let mut source = ChannelLocationSource::unavailable();
        assert_eq!(
            service.start(&mut source),
            Err(TrackingError::GeolocationUnavailable)
        );
        assert!(!service.is_running());
    }

    #[tokio::test]
    async fn lifecycle_events_and_double_start() {
        let bus = EventBus::new();
        let mut tracking = bus.subscribe(Topic::Tracking);
        let mut service =
            TrackingService::new(enabled(), &config(1_000), Arc::new(RecordingSink::default()))
                .with_events(bus);

        service.stop().await;
        assert_eq!(tracking.try_recv(), None);

        let (_tx, mut source) = ChannelLocationSource::new(1);
        service.start(&mut source).unwrap();
        let (_tx2, mut other) = ChannelLocationSource::new(1);
        assert_eq!(service.start(&mut other), Err(TrackingError::AlreadyRunning));

        service.stop().await;
        service.stop().await;
        assert_eq!(
            tracking.try_recv(),
            Some(AppEvent::TrackingStateChanged { enabled: true })
        );
        assert_eq!(
            tracking.try_recv(),
            Some(AppEvent::TrackingStateChanged { enabled: false })
        );
        assert_eq!(tracking.try_recv(), None);
    }
}
