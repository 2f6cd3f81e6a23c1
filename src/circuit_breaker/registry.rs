//! Per-destination breaker registry.

use crate::circuit_breaker::breaker::CircuitBreaker;
use crate::circuit_breaker::config::CircuitBreakerConfig;
use crate::circuit_breaker::state::BreakerSnapshot;
use crate::core::{ArcClock, TokioClock};

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

/// A lazily populated map from destination key to circuit breaker.
///
/// Each destination (normally a hostname) gets its own breaker, created on
/// first use from the registry's template configuration. Entries live until
/// explicitly removed.
///
/// The registry is an ordinary value, not a global: construct one per
/// application (or per test) and pass it where it is needed, wrapped in an
/// [`Arc`] when shared across tasks.
///
/// # Example
///
/// ```rust
/// use callguard::circuit_breaker::{BreakerRegistry, CircuitBreakerConfig};
///
/// let registry = BreakerRegistry::new(CircuitBreakerConfig::default());
///
/// let breaker = registry.get_or_create("api.example.com");
/// assert!(breaker.state().is_closed());
/// ```
pub struct BreakerRegistry {
    /// Breakers by destination key.
    breakers: RwLock<HashMap<String, Arc<CircuitBreaker>>>,
    /// Template configuration stamped onto new breakers.
    template: CircuitBreakerConfig,
    /// Time source handed to new breakers.
    clock: ArcClock,
}

impl BreakerRegistry {
    /// Creates a registry whose breakers use `template` as their config.
    pub fn new(template: CircuitBreakerConfig) -> Self {
        Self {
            breakers: RwLock::new(HashMap::new()),
            template,
            clock: Arc::new(TokioClock),
        }
    }

    /// Creates a registry with the default breaker configuration.
    pub fn with_defaults() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }

    /// Replaces the time source handed to new breakers.
    pub fn with_clock(mut self, clock: ArcClock) -> Self {
        self.clock = clock;
        self
    }

    /// Returns the breaker for `destination`, creating it if absent.
    pub fn get_or_create(&self, destination: &str) -> Arc<CircuitBreaker> {
        {
            let breakers = self
                .breakers
                .read()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if let Some(breaker) = breakers.get(destination) {
                return Arc::clone(breaker);
            }
        }

        let mut breakers = self
            .breakers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        // A writer may have raced us between the read and write locks
        if let Some(breaker) = breakers.get(destination) {
            return Arc::clone(breaker);
        }

        tracing::debug!(destination = %destination, "Creating circuit breaker");
        let breaker = Arc::new(
            CircuitBreaker::new(destination, self.template.clone())
                .with_clock(Arc::clone(&self.clock)),
        );
        breakers.insert(destination.to_string(), Arc::clone(&breaker));
        breaker
    }

    /// Returns the breaker for `destination` if one exists.
    pub fn get(&self, destination: &str) -> Option<Arc<CircuitBreaker>> {
        self.breakers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(destination)
            .map(Arc::clone)
    }

    /// Removes and returns the breaker for `destination`.
    ///
    /// The breaker itself keeps working for anyone still holding its `Arc`;
    /// the registry just stops handing it out.
    pub fn remove(&self, destination: &str) -> Option<Arc<CircuitBreaker>> {
        self.breakers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(destination)
    }

    /// Returns the number of registered destinations.
    pub fn len(&self) -> usize {
        self.breakers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    /// Returns `true` if no breakers have been created yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the registered destination keys.
    pub fn destinations(&self) -> Vec<String> {
        self.breakers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .keys()
            .cloned()
            .collect()
    }

    /// Returns a snapshot of every registered breaker, for monitoring.
    pub fn snapshot(&self) -> Vec<BreakerSnapshot> {
        self.breakers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .values()
            .map(|breaker| breaker.snapshot())
            .collect()
    }

    /// Returns a reference to the template configuration.
    pub fn template(&self) -> &CircuitBreakerConfig {
        &self.template
    }
}

impl Default for BreakerRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl fmt::Debug for BreakerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BreakerRegistry")
            .field("destinations", &self.len())
            .field("template", &self.template)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lazy_creation() {
        let registry = BreakerRegistry::with_defaults();
        assert!(registry.is_empty());
        assert!(registry.get("api.example.com").is_none());

        let breaker = registry.get_or_create("api.example.com");
        assert_eq!(breaker.destination(), "api.example.com");
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_same_instance_returned() {
        let registry = BreakerRegistry::with_defaults();

        let first = registry.get_or_create("api.example.com");
        first.force_open();

        let second = registry.get_or_create("api.example.com");
        assert!(second.state().is_open());
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_registries_are_isolated() {
        let a = BreakerRegistry::with_defaults();
        let b = BreakerRegistry::with_defaults();

        a.get_or_create("api.example.com").force_open();

        assert!(b.get_or_create("api.example.com").state().is_closed());
    }

    #[test]
    fn test_remove() {
        let registry = BreakerRegistry::with_defaults();
        registry.get_or_create("api.example.com");

        let removed = registry.remove("api.example.com");
        assert!(removed.is_some());
        assert!(registry.is_empty());
        assert!(registry.remove("api.example.com").is_none());
    }

    #[test]
    fn test_template_applied() {
        let template = CircuitBreakerConfig::strict();
        let registry = BreakerRegistry::new(template);

        let breaker = registry.get_or_create("api.example.com");
        assert_eq!(breaker.config().failure_threshold, 3);
    }

    #[test]
    fn test_snapshot_covers_all_destinations() {
        let registry = BreakerRegistry::with_defaults();
        registry.get_or_create("a.example.com");
        registry.get_or_create("b.example.com").force_open();

        let mut snapshots = registry.snapshot();
        snapshots.sort_by(|x, y| x.destination.cmp(&y.destination));

        assert_eq!(snapshots.len(), 2);
        assert_eq!(snapshots[0].state, "closed");
        assert_eq!(snapshots[1].state, "open");
    }
}
