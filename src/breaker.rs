use std::sync::RwLock;

use tracing::warn;

/// Health of an external dependency, owned by the tool that wraps it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BreakerState {
    /// Required configuration was never supplied. The real call is never
    /// attempted; invocations short-circuit to the tool's fallback.
    Unconfigured { missing: String },
    /// The dependency may be called.
    Available,
    /// A call failed. The dependency stays disabled for the remainder of the
    /// process and invocations short-circuit to the fallback.
    Disabled { reason: String },
}

/// One-way circuit breaker for a tool's external dependency.
///
/// The first failure transitions `Available -> Disabled` permanently; there
/// is no automatic re-probe. This trades a small chance of writing off a
/// transient-only failure against never repeatedly stalling on a dead
/// backend.
pub struct Breaker {
    dependency: String,
    state: RwLock<BreakerState>,
}

impl Breaker {
    pub fn available(dependency: impl Into<String>) -> Self {
        Self {
            dependency: dependency.into(),
            state: RwLock::new(BreakerState::Available),
        }
    }

    /// A breaker whose dependency was never configured, naming what's missing.
    pub fn unconfigured(dependency: impl Into<String>, missing: impl Into<String>) -> Self {
        Self {
            dependency: dependency.into(),
            state: RwLock::new(BreakerState::Unconfigured {
                missing: missing.into(),
            }),
        }
    }

    pub fn dependency(&self) -> &str {
        &self.dependency
    }

    pub fn state(&self) -> BreakerState {
        self.state.read().expect("breaker state lock poisoned").clone()
    }

    pub fn is_available(&self) -> bool {
        matches!(self.state(), BreakerState::Available)
    }

    /// Record a dependency failure. Only an `Available` breaker trips; an
    /// `Unconfigured` or already-`Disabled` one keeps its original state so
    /// the first diagnosis is never overwritten.
    pub fn trip(&self, reason: impl Into<String>) {
        let mut state = self.state.write().expect("breaker state lock poisoned");
        if matches!(*state, BreakerState::Available) {
            let reason = reason.into();
            warn!(
                dependency = %self.dependency,
                %reason,
                "dependency disabled for the remainder of the process"
            );
            *state = BreakerState::Disabled { reason };
        }
    }
}

impl std::fmt::Debug for Breaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Breaker")
            .field("dependency", &self.dependency)
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trips_once_and_stays_disabled() {
        let breaker = Breaker::available("maps");
        assert!(breaker.is_available());

        breaker.trip("connection refused");
        assert_eq!(
            breaker.state(),
            BreakerState::Disabled {
                reason: "connection refused".into()
            }
        );

        // A later failure must not rewrite the original reason.
        breaker.trip("timed out");
        assert_eq!(
            breaker.state(),
            BreakerState::Disabled {
                reason: "connection refused".into()
            }
        );
    }

    #[test]
    fn unconfigured_never_becomes_disabled() {
        let breaker = Breaker::unconfigured("mail", "EMAIL_ADDRESS");
        breaker.trip("should not apply");
        assert_eq!(
            breaker.state(),
            BreakerState::Unconfigured {
                missing: "EMAIL_ADDRESS".into()
            }
        );
        assert!(!breaker.is_available());
    }
}
