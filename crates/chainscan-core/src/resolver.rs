//! Mapping from chain-level account aliases to the host's tracking keys.

use std::collections::HashMap;

/// Resolves a chain alias (account name) to an opaque tracking key.
///
/// Supplied by the host system; returning `None` means the alias is not watched.
pub trait AccountResolver: Send + Sync {
    fn resolve(&self, alias: &str) -> Option<String>;
}

impl AccountResolver for HashMap<String, String> {
    fn resolve(&self, alias: &str) -> Option<String> {
        self.get(alias).cloned()
    }
}

impl<F> AccountResolver for F
where
    F: Fn(&str) -> Option<String> + Send + Sync,
{
    fn resolve(&self, alias: &str) -> Option<String> {
        self(alias)
    }
}

/// Resolver that watches every alias under its own name.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdentityResolver;

impl AccountResolver for IdentityResolver {
    fn resolve(&self, alias: &str) -> Option<String> {
        Some(alias.to_string())
    }
}
