//! Environment for the admission reducer.

use crate::environment::Clock;
use std::sync::Arc;

/// Environment dependencies for request admission
#[derive(Clone)]
pub struct AdmissionEnvironment {
    /// Clock for submission timestamps
    pub clock: Arc<dyn Clock>,
}

impl AdmissionEnvironment {
    /// Creates a new `AdmissionEnvironment`
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }
}
