//! Call-order guard shared by engine implementations.

use crate::engine::ConversionStep;
use crate::error::{EngineError, EngineResult};

/// Tracks progress through the fixed engine call sequence.
#[derive(Debug, Default, Clone)]
pub struct EngineProtocol {
    last: Option<ConversionStep>,
    models: Vec<String>,
}

impl EngineProtocol {
    /// Fresh guard expecting `initialize`.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            last: None,
            models: Vec::new(),
        }
    }

    /// Step the guard expects next, `None` once compilation ran.
    #[must_use]
    pub const fn expected(&self) -> Option<ConversionStep> {
        match self.last {
            None => Some(ConversionStep::Initialize),
            Some(step) => step.next(),
        }
    }

    /// Last step that was entered.
    #[must_use]
    pub const fn last(&self) -> Option<ConversionStep> {
        self.last
    }

    /// Whether `compile` has been entered.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.last == Some(ConversionStep::Compile)
    }

    /// Enter `step`, failing unless it is the expected one.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::OutOfSequence`] for any other step.
    pub fn enter(&mut self, step: ConversionStep) -> EngineResult<()> {
        let expected = self.expected();
        if expected != Some(step) {
            return Err(EngineError::OutOfSequence {
                expected,
                actual: step,
            });
        }
        self.last = Some(step);
        Ok(())
    }

    /// Record a model key registered during `add_model`.
    pub fn register_model(&mut self, key: &str) {
        if !self.models.iter().any(|existing| existing == key) {
            self.models.push(key.to_string());
        }
    }

    /// Ensure `key` was registered earlier.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UnknownModel`] for unregistered keys.
    pub fn require_model(&self, key: &str) -> EngineResult<()> {
        if self.models.iter().any(|existing| existing == key) {
            Ok(())
        } else {
            Err(EngineError::UnknownModel {
                key: key.to_string(),
            })
        }
    }
}
