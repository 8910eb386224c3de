//! Interactive start-point picking
//!
//! `begin` arms a single click listener on the map view. The first click ends
//! the cycle: the listener is removed, the clicked feature is resolved to the
//! identifier the trace service expects, and the result is stored as the
//! start point. Arming again replaces any listener still waiting, and a cycle
//! replaced mid-resolution discards its result.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::mode::TraceModeSelector;
use crate::error::{TraceError, TraceResult};
use crate::map::{ClickSubscription, MapClick, MapPoint, MapView, SpatialReference};
use crate::models::FeatureId;
use crate::service::TraceService;
use crate::shell::HostShell;

/// How a pick cycle ended
#[derive(Debug, Clone, PartialEq)]
pub enum PickOutcome {
    /// The start point was stored
    Resolved {
        global_id: FeatureId,
        /// Click location in the service's spatial reference
        location: MapPoint,
    },
    /// Nothing under the click
    Missed,
    /// The pick failed; the message was shown to the user
    Failed(TraceError),
    /// A newer pick or a teardown replaced this one
    Superseded,
}

struct ArmedPick {
    cycle: u64,
    subscription: Box<dyn ClickSubscription>,
}

pub struct StartPointPicker {
    view: Arc<dyn MapView>,
    service: Arc<dyn TraceService>,
    selector: Arc<Mutex<TraceModeSelector>>,
    shell: Arc<dyn HostShell>,
    working_reference: SpatialReference,
    armed: Mutex<Option<ArmedPick>>,
    cycle: AtomicU64,
}

impl StartPointPicker {
    pub fn new(
        view: Arc<dyn MapView>,
        service: Arc<dyn TraceService>,
        selector: Arc<Mutex<TraceModeSelector>>,
        shell: Arc<dyn HostShell>,
        working_reference: SpatialReference,
    ) -> Self {
        Self {
            view,
            service,
            selector,
            shell,
            working_reference,
            armed: Mutex::new(None),
            cycle: AtomicU64::new(0),
        }
    }

    pub fn is_armed(&self) -> bool {
        self.armed.lock().unwrap().is_some()
    }

    /// Arm the click listener, replacing one that is still waiting.
    ///
    /// The returned task completes when the cycle ends; dropping it does not
    /// cancel the pick.
    pub fn begin(self: &Arc<Self>) -> JoinHandle<PickOutcome> {
        let cycle = self.cycle.fetch_add(1, Ordering::SeqCst) + 1;
        let (tx, rx) = mpsc::unbounded_channel();

        {
            let mut armed = self.armed.lock().unwrap();
            if let Some(previous) = armed.take() {
                tracing::debug!("Replacing armed pick cycle {}", previous.cycle);
                previous.subscription.remove();
            }
            *armed = Some(ArmedPick {
                cycle,
                subscription: self.view.on_click(tx),
            });
        }
        tracing::debug!("Start-point pick cycle {} armed", cycle);

        let picker = Arc::clone(self);
        tokio::spawn(async move { picker.run_cycle(cycle, rx).await })
    }

    /// Disarm without waiting for a click
    pub fn cancel(&self) {
        self.cycle.fetch_add(1, Ordering::SeqCst);
        if let Some(armed) = self.armed.lock().unwrap().take() {
            armed.subscription.remove();
        }
    }

    async fn run_cycle(&self, cycle: u64, mut clicks: mpsc::UnboundedReceiver<MapClick>) -> PickOutcome {
        let Some(click) = clicks.recv().await else {
            // Listener removed before any click arrived
            return PickOutcome::Superseded;
        };

        if !self.disarm(cycle) {
            return PickOutcome::Superseded;
        }

        let outcome = self.resolve(click).await;
        if !self.is_current(cycle) {
            tracing::debug!("Discarding result of superseded pick cycle {}", cycle);
            return PickOutcome::Superseded;
        }

        match outcome {
            Ok(Some((global_id, location))) => {
                tracing::debug!("Start point resolved to {}", global_id);
                self.selector
                    .lock()
                    .unwrap()
                    .set_resolved_start_point(&global_id);
                PickOutcome::Resolved {
                    global_id,
                    location,
                }
            }
            Ok(None) => {
                tracing::debug!("Pick at {:?} hit no feature", click.screen);
                PickOutcome::Missed
            }
            Err(e) => {
                tracing::warn!("Start-point pick failed: {}", e);
                self.shell.alert(&e.to_string());
                PickOutcome::Failed(e)
            }
        }
    }

    /// Remove this cycle's listener; false when another cycle owns the slot
    fn disarm(&self, cycle: u64) -> bool {
        let mut armed = self.armed.lock().unwrap();
        match armed.take() {
            Some(pick) if pick.cycle == cycle => {
                pick.subscription.remove();
                true
            }
            other => {
                *armed = other;
                false
            }
        }
    }

    fn is_current(&self, cycle: u64) -> bool {
        self.cycle.load(Ordering::SeqCst) == cycle
    }

    async fn resolve(&self, click: MapClick) -> TraceResult<Option<(FeatureId, MapPoint)>> {
        let hits = self
            .view
            .hit_test(click.screen)
            .await
            .map_err(|e| TraceError::Map(format!("{:#}", e)))?;

        let Some(hit) = hits.into_iter().next() else {
            return Ok(None);
        };

        let location = self
            .view
            .project(click.map_point, self.working_reference)
            .await
            .map_err(|e| TraceError::Projection(format!("{:#}", e)))?;

        let global_id = self
            .service
            .resolve_global_id(&hit.layer_id, hit.feature.object_id)
            .await?;

        Ok(Some((global_id, location)))
    }
}
