use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::oneshot;

use super::client::DetectionService;
use super::error::DetectionError;
use super::types::{DetectOptions, DetectionResult};
use crate::events::{AppEvent, EventBus};
use crate::geometry::BoundingBox;

#[derive(Debug, Default)]
struct SessionState {
    generation: u64,
    inflight: Option<oneshot::Sender<()>>,
    current: Option<Arc<DetectionResult>>,
}

/// Clears the in-flight marker when a detection ends, however it ends,
/// unless a newer request has taken the slot.
struct InflightGuard<'a> {
    state: &'a StdMutex<SessionState>,
    generation: u64,
}

impl Drop for InflightGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut locked) = self.state.lock() {
            if locked.generation == self.generation {
                locked.inflight = None;
            }
        }
    }
}

/// Detection state for one map view.
///
/// At most one request is in flight: starting a new one aborts the previous,
/// whose caller receives [`DetectionError::Superseded`]. The stored result is
/// only ever replaced by a successful detection.
pub struct DetectionSession {
    service: Arc<dyn DetectionService>,
    events: Option<EventBus>,
    state: StdMutex<SessionState>,
}

impl DetectionSession {
    pub fn new(service: Arc<dyn DetectionService>) -> Self {
        Self {
            service,
            events: None,
            state: StdMutex::new(SessionState::default()),
        }
    }

    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    pub fn current(&self) -> Option<Arc<DetectionResult>> {
        self.state.lock().unwrap().current.clone()
    }

    pub fn is_detecting(&self) -> bool {
        self.state.lock().unwrap().inflight.is_some()
    }

    pub async fn detect(
        &self,
        bbox: BoundingBox,
        options: &DetectOptions,
    ) -> Result<Arc<DetectionResult>, DetectionError> {
        if bbox.is_degenerate() {
            return Err(DetectionError::InvalidSelection);
        }

        let (stop_tx, stop_rx) = oneshot::channel();
        let generation = {
            let mut locked = self.state.lock().unwrap();
            locked.generation += 1;
            if let Some(previous) = locked.inflight.replace(stop_tx) {
                log::debug!("Aborting previous detection");
                let _ = previous.send(());
            }
            locked.generation
        };
        let _guard = InflightGuard {
            state: &self.state,
            generation,
        };

        let outcome = tokio::select! {
            result = self.service.detect(bbox, options) => result,
            _ = stop_rx => Err(DetectionError::Cancelled),
        };

        let mut locked = self.state.lock().unwrap();
        if locked.generation != generation {
            log::debug!("Discarding result of superseded detection #{}", generation);
            return Err(DetectionError::Superseded);
        }
        locked.inflight = None;

        let result = Arc::new(outcome?);
        locked.current = Some(result.clone());
        drop(locked);

        if let Some(events) = &self.events {
            events.publish(AppEvent::DetectionCompleted {
                count: result.count,
            });
        }
        Ok(result)
    }

    /// Aborts the in-flight detection, if any. Its caller gets `Cancelled`.
    pub fn cancel(&self) {
        if let Some(inflight) = self.state.lock().unwrap().inflight.take() {
            let _ = inflight.send(());
        }
    }

    /// Drops the stored result and aborts anything in flight.
    pub fn clear(&self) {
        let mut locked = self.state.lock().unwrap();
        locked.generation += 1;
        if let Some(inflight) = locked.inflight.take() {
            let _ = inflight.send(());
        }
        locked.current = None;
    }
}
