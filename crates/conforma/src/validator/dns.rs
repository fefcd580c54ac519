//! MX record lookups for the `emailMx` validator
//!
//! [`MxResolver`] is the seam; [`SystemResolver`] (cargo feature `dns`) asks
//! the system's configured name servers through hickory. [`StaticResolver`]
//! answers from a fixed table and suits tests and offline deployments.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::ValidatorFault;

/// Looks up the mail exchangers of a domain.
#[async_trait]
pub trait MxResolver: Send + Sync {
    /// Returns the exchanger host names, best preference first.
    ///
    /// A domain without MX records yields an empty list, not an error.
    async fn lookup_mx(&self, domain: &str) -> Result<Vec<String>, ValidatorFault>;
}

/// The resolver used by [`ValidatorRegistry::new`](super::ValidatorRegistry::new).
pub fn default_resolver() -> Arc<dyn MxResolver> {
    #[cfg(feature = "dns")]
    {
        Arc::new(SystemResolver::new())
    }
    #[cfg(not(feature = "dns"))]
    {
        Arc::new(StaticResolver::new())
    }
}

// ============================================================================
// SYSTEM RESOLVER
// ============================================================================

#[cfg(feature = "dns")]
pub use system::SystemResolver;

#[cfg(feature = "dns")]
mod system {
    use std::sync::OnceLock;

    use async_trait::async_trait;
    use hickory_resolver::TokioAsyncResolver;
    use hickory_resolver::config::{ResolverConfig, ResolverOpts};
    use hickory_resolver::error::ResolveErrorKind;

    use super::MxResolver;
    use crate::error::ValidatorFault;

    /// Resolver backed by the system DNS configuration.
    ///
    /// The underlying client is created on first use, inside the caller's
    /// Tokio runtime. Without a readable system configuration it falls back
    /// to hickory's default upstreams.
    #[derive(Default)]
    pub struct SystemResolver {
        inner: OnceLock<TokioAsyncResolver>,
    }

    impl SystemResolver {
        /// Creates a resolver; no I/O happens until the first lookup.
        pub fn new() -> Self {
            Self::default()
        }

        fn resolver(&self) -> &TokioAsyncResolver {
            self.inner.get_or_init(|| {
                TokioAsyncResolver::tokio_from_system_conf().unwrap_or_else(|e| {
                    tracing::debug!(error = %e, "system DNS configuration unavailable, using defaults");
                    TokioAsyncResolver::tokio(ResolverConfig::default(), ResolverOpts::default())
                })
            })
        }
    }

    impl std::fmt::Debug for SystemResolver {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("SystemResolver")
                .field("initialized", &self.inner.get().is_some())
                .finish()
        }
    }

    #[async_trait]
    impl MxResolver for SystemResolver {
        async fn lookup_mx(&self, domain: &str) -> Result<Vec<String>, ValidatorFault> {
            match self.resolver().mx_lookup(domain).await {
                Ok(lookup) => {
                    let mut records: Vec<_> = lookup
                        .iter()
                        .map(|mx| (mx.preference(), mx.exchange().to_utf8()))
                        .collect();
                    records.sort_by_key(|(preference, _)| *preference);
                    Ok(records.into_iter().map(|(_, host)| host).collect())
                }
                Err(e) if matches!(e.kind(), ResolveErrorKind::NoRecordsFound { .. }) => Ok(Vec::new()),
                Err(e) => Err(ValidatorFault::Resolve {
                    domain: domain.to_string(),
                    reason: e.to_string(),
                }),
            }
        }
    }
}

// ============================================================================
// STATIC RESOLVER
// ============================================================================

/// Resolver answering from a fixed table.
///
/// Domains missing from the table fail with [`ValidatorFault::Resolve`].
///
/// # Examples
///
/// ```
/// use conforma::validator::dns::{MxResolver, StaticResolver};
///
/// let resolver = StaticResolver::new().with_domain("example.com", ["mx.example.com"]);
/// let hosts = futures::executor::block_on(resolver.lookup_mx("example.com")).unwrap();
/// assert_eq!(hosts, vec!["mx.example.com".to_string()]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct StaticResolver {
    domains: HashMap<String, Vec<String>>,
}

impl StaticResolver {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the exchangers of `domain`; an empty list means "no MX records".
    #[must_use = "builder methods must be chained or built"]
    pub fn with_domain<I, S>(mut self, domain: impl Into<String>, hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.domains.insert(
            domain.into().to_ascii_lowercase(),
            hosts.into_iter().map(Into::into).collect(),
        );
        self
    }
}

#[async_trait]
impl MxResolver for StaticResolver {
    async fn lookup_mx(&self, domain: &str) -> Result<Vec<String>, ValidatorFault> {
        self.domains
            .get(&domain.to_ascii_lowercase())
            .cloned()
            .ok_or_else(|| ValidatorFault::Resolve {
                domain: domain.to_string(),
                reason: "domain not in table".to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_lookup_is_case_insensitive() {
        let resolver = StaticResolver::new().with_domain("Example.COM", ["mx.example.com"]);
        assert_eq!(
            resolver.lookup_mx("example.com").await.unwrap(),
            vec!["mx.example.com".to_string()]
        );
    }

    #[tokio::test]
    async fn unknown_domain_is_a_fault() {
        let err = StaticResolver::new().lookup_mx("nowhere.test").await.unwrap_err();
        assert_eq!(err.code(), "validator.fault.resolve");
    }
}
