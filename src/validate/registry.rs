use std::cmp::Reverse;

use super::generic::GenericValidator;
use super::traits::LinkValidator;
use super::udemy::UdemyValidator;

/// Registry of link validators, highest priority first.
pub struct ValidatorRegistry {
    validators: Vec<Box<dyn LinkValidator>>,
}

impl ValidatorRegistry {
    /// Create a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            validators: Vec::new(),
        }
    }

    /// The production set: Udemy plus the generic fallback.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(UdemyValidator::new()));
        registry.register(Box::new(GenericValidator::new()));
        registry
    }

    /// Register a validator.
    pub fn register(&mut self, validator: Box<dyn LinkValidator>) {
        self.validators.push(validator);
        self.validators.sort_by_key(|v| Reverse(v.priority()));
    }

    /// Find the best validator for a URL.
    #[must_use]
    pub fn find(&self, url: &str) -> Option<&dyn LinkValidator> {
        self.validators
            .iter()
            .find(|v| v.can_handle(url))
            .map(AsRef::as_ref)
    }
}

impl Default for ValidatorRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
