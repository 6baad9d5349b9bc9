//! Shared handler state.

use std::sync::Arc;

use structura_core::JobService;
use structura_events::EventBus;
use structura_telemetry::Metrics;

pub(crate) struct ApiState {
    pub(crate) jobs: Arc<dyn JobService>,
    pub(crate) events: EventBus,
    pub(crate) telemetry: Metrics,
}

impl ApiState {
    pub(crate) const fn new(
        jobs: Arc<dyn JobService>,
        events: EventBus,
        telemetry: Metrics,
    ) -> Self {
        Self {
            jobs,
            events,
            telemetry,
        }
    }
}
