//! Start level tracker — records and announces the system start level.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use hubcore_domain::event::Event;

use crate::event_bus::EventBus;
use crate::ports::StartLevelService;

/// [`StartLevelService`] fed by the runtime as it boots.
///
/// Every change is posted as a start-level event on the bus.
pub struct StartLevelTracker {
    level: AtomicU32,
    bus: Arc<EventBus>,
}

impl StartLevelTracker {
    #[must_use]
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self {
            level: AtomicU32::new(0),
            bus,
        }
    }

    /// Record `level`; posts an event unless the level is unchanged.
    pub fn set_start_level(&self, level: u32) {
        let previous = self.level.swap(level, Ordering::SeqCst);
        if previous == level {
            return;
        }
        tracing::info!(from = previous, to = level, "start level changed");
        self.bus.post(&Event::startlevel(level));
    }
}

impl StartLevelService for StartLevelTracker {
    fn start_level(&self) -> u32 {
        self.level.load(Ordering::SeqCst)
    }
}
