//! Reclassification of transport failures.
//!
//! A resolver tags its answer explicitly: [`Resolution::Unresolved`] keeps the
//! original failure (the caller sees `ProviderError::NetworkFailure`), while
//! [`Resolution::Reclassified`] replaces it with a domain error (the caller
//! sees `ProviderError::ResolvedFailure`). Resolvers are pure functions of
//! their input and must not perform I/O.

use crate::error::{BoxError, TransportError};

/// Outcome of resolving a transport failure.
#[derive(Debug)]
pub enum Resolution {
    Unresolved,
    Reclassified(BoxError),
}

impl Resolution {
    pub fn reclassify(error: impl Into<BoxError>) -> Self {
        Resolution::Reclassified(error.into())
    }
}

pub trait ErrorResolver: Send + Sync {
    fn resolve(&self, error: &TransportError) -> Resolution;
}

/// Leaves every failure unresolved.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityErrorResolver;

impl ErrorResolver for IdentityErrorResolver {
    fn resolve(&self, _error: &TransportError) -> Resolution {
        Resolution::Unresolved
    }
}

impl<F> ErrorResolver for F
where
    F: Fn(&TransportError) -> Resolution + Send + Sync,
{
    fn resolve(&self, error: &TransportError) -> Resolution {
        self(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("unauthenticated")]
    struct Unauthenticated;

    #[test]
    fn identity_never_reclassifies() {
        let resolution = IdentityErrorResolver.resolve(&TransportError::Status {
            status: 401,
            body: None,
        });
        assert!(matches!(resolution, Resolution::Unresolved));
    }

    #[test]
    fn closure_resolver_reclassifies_selected_statuses() {
        let resolver = |error: &TransportError| match error.status() {
            Some(401) => Resolution::reclassify(Unauthenticated),
            _ => Resolution::Unresolved,
        };
        let Resolution::Reclassified(error) = resolver.resolve(&TransportError::Status {
            status: 401,
            body: None,
        }) else {
            panic!("expected reclassification");
        };
        assert!(error.is::<Unauthenticated>());
        assert!(matches!(resolver.resolve(&TransportError::Timeout), Resolution::Unresolved));
    }
}
