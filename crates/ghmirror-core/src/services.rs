//! Request-scoped service bundle.
//!
//! Every handler receives a [`Services`] value carrying the store, the
//! scheduler, the GitHub client, the token resolver, the clock, and the
//! configuration. No process globals; test doubles slot in per field.

use crate::config::MirrorConfig;
use crate::store::MetadataStore;
use crate::Timestamp;
use ghmirror_github::{GithubApi, TokenResolver};
use ghmirror_store::Scheduler;
use std::sync::{Arc, Mutex};

/// Time source; injected so tests can pin the clock.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Wall clock.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}

/// Settable clock for tests.
pub struct ManualClock {
    millis: Mutex<i64>,
}

impl ManualClock {
    pub fn at(millis: i64) -> Self {
        Self {
            millis: Mutex::new(millis),
        }
    }

    pub fn set(&self, millis: i64) {
        *self.millis.lock().expect("clock lock poisoned") = millis;
    }

    pub fn advance(&self, delta_millis: i64) {
        *self.millis.lock().expect("clock lock poisoned") += delta_millis;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        Timestamp::from_millis(*self.millis.lock().expect("clock lock poisoned"))
    }
}

/// The dependency bundle threaded through the pipeline.
#[derive(Clone)]
pub struct Services {
    pub store: Arc<dyn MetadataStore>,
    pub scheduler: Arc<dyn Scheduler>,
    pub github: Arc<dyn GithubApi>,
    pub tokens: Arc<dyn TokenResolver>,
    pub clock: Arc<dyn Clock>,
    pub config: MirrorConfig,
}

impl Services {
    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }
}
