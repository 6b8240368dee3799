//! Shared, lock-guarded state the controller task owns and that any future
//! display/RPC surface can read a snapshot of without touching the
//! controller's internals. The graphical display itself is out of scope;
//! this is the seam it would attach to.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::controller::{Controller, ControllerState};
use crate::counters::DropCounters;
use crate::mount::MountLike;
use crate::target::fusion::FusionHandle;

#[derive(Debug, Clone, Copy)]
pub struct ControllerSnapshot {
    pub state: ControllerState,
}

/// Cloneable handle around the controller, shared between the controller
/// task's tick loop and anything else that needs to read state or issue a
/// target/bias/gains change (a future display, or a test harness).
#[derive(Clone)]
pub struct SharedState {
    controller: Arc<Mutex<Controller>>,
}

impl SharedState {
    pub fn new(controller: Controller) -> Self {
        SharedState {
            controller: Arc::new(Mutex::new(controller)),
        }
    }

    pub async fn snapshot(&self) -> ControllerSnapshot {
        let controller = self.controller.lock().await;
        ControllerSnapshot {
            state: controller.state(),
        }
    }

    pub async fn select_target(&self, target_id: Option<String>) {
        let mut controller = self.controller.lock().await;
        controller.set_target(target_id);
    }

    pub async fn set_alignment(&self, alignment: crate::alignment::AlignmentOffset) {
        let mut controller = self.controller.lock().await;
        controller.set_alignment(alignment);
    }

    pub async fn set_bias(&self, bias_az: f64, bias_el: f64) {
        let mut controller = self.controller.lock().await;
        controller.set_bias(bias_az, bias_el);
    }

    pub async fn set_gains(&self, gains: crate::config::GainsConfig) {
        let mut controller = self.controller.lock().await;
        controller.set_gains(gains);
    }

    /// Runs one controller tick against the current mount and target state.
    /// The tracker's tick loop is the sole regular caller; exposed on
    /// `SharedState` (rather than requiring the caller to reach inside the
    /// lock itself) so every access to the controller goes through the same
    /// mutex.
    pub async fn tick(
        &self,
        now: DateTime<Utc>,
        fusion: &FusionHandle,
        mount: &mut dyn MountLike,
        counters: &DropCounters,
    ) {
        let mut controller = self.controller.lock().await;
        controller.tick(now, fusion, mount, counters).await;
    }

    pub(crate) fn controller(&self) -> Arc<Mutex<Controller>> {
        self.controller.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MountMode;

    fn controller() -> Controller {
        Controller::new(
            crate::config::GainsConfig { kp: 1.0, ki: 0.1, kd: 0.1 },
            4.0,
            5.0,
            MountMode::AltAz,
            38.0,
            -77.0,
        )
    }

    #[tokio::test]
    async fn select_target_updates_the_snapshot_state() {
        let shared = SharedState::new(controller());
        assert_eq!(shared.snapshot().await.state, ControllerState::Idle);

        shared.select_target(Some("T1".to_string())).await;
        assert_eq!(shared.snapshot().await.state, ControllerState::Slewing);
    }
}
