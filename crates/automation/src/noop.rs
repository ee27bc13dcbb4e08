use crate::{AutomationError, AutomationHost, AutomationSession, DocumentFamily};

/// Host used when no backend is configured. It never becomes available.
#[derive(Debug, Default)]
pub struct NoopHost;

impl AutomationHost for NoopHost {
    fn name(&self) -> &str {
        "none"
    }

    fn probe(&self) -> Result<(), AutomationError> {
        Err(AutomationError::Unavailable(
            "no document automation backend configured".into(),
        ))
    }

    fn acquire(
        &self,
        family: DocumentFamily,
    ) -> Result<Box<dyn AutomationSession>, AutomationError> {
        Err(AutomationError::Unavailable(format!(
            "no {family} backend configured"
        )))
    }
}
