//! Shared helpers for the end-to-end scenarios.

use ghmirror_core::ingest::{EventProcessor, Gateway};
use ghmirror_core::testing::TestHarness;
use ghmirror_core::DeliveryId;

/// The pipeline under test: gateway + processor over one harness.
pub struct Pipeline {
    pub harness: TestHarness,
    pub gateway: Gateway,
    pub processor: EventProcessor,
}

impl Pipeline {
    pub fn new() -> Self {
        let harness = TestHarness::new();
        let gateway = Gateway::new(harness.services.clone());
        let processor = EventProcessor::new(harness.services.clone());
        Self {
            harness,
            gateway,
            processor,
        }
    }

    pub fn delivery(id: &str) -> DeliveryId {
        DeliveryId::new(id).expect("valid delivery id")
    }

    /// Intake one signed delivery and run processing to quiescence.
    pub async fn deliver(&self, delivery_id: &str, event_name: &str, payload: String) {
        self.gateway
            .intake(Self::delivery(delivery_id), event_name, payload, true)
            .await
            .expect("intake");
        self.harness.run_processing(&self.processor).await;
    }
}
