//! Persona store clients
//!
//! A store answers "which persona is called X?". Lookups distinguish three
//! outcomes: a persona was found, nothing matched (resolved to the sentinel
//! default persona), or the store could not be queried (no result at all, so
//! callers leave the current persona in place).

mod notion;
mod roster;

use async_trait::async_trait;

pub use notion::NotionStore;
pub use roster::StaticStore;

use crate::Result;
use crate::persona::Persona;

/// Read-only source of persona records
#[async_trait]
pub trait PersonaStore: Send + Sync {
    /// Store name for logs
    fn name(&self) -> &'static str;

    /// Find the persona best matching `name`
    ///
    /// Returns `Ok(None)` when nothing matches.
    ///
    /// # Errors
    ///
    /// Returns error if the store cannot be queried
    async fn find(&self, name: &str) -> Result<Option<Persona>>;

    /// List the names of every persona in the store
    ///
    /// # Errors
    ///
    /// Returns error if the store cannot be queried
    async fn list_names(&self) -> Result<Vec<String>>;
}

/// Look up a persona, resolving "not found" to the default persona
///
/// Returns `None` only when the store itself failed; the error is logged.
pub async fn get_persona(store: &dyn PersonaStore, name: &str) -> Option<Persona> {
    match store.find(name).await {
        Ok(Some(persona)) => {
            tracing::debug!(store = store.name(), query = name, persona = %persona.name, "persona found");
            Some(persona)
        }
        Ok(None) => {
            tracing::info!(store = store.name(), query = name, "persona not found, using default");
            Some(Persona::default_assistant())
        }
        Err(e) => {
            tracing::error!(store = store.name(), query = name, error = ?e, "persona lookup failed");
            None
        }
    }
}

/// List persona names, logging failures and returning an empty list
pub async fn list_personas(store: &dyn PersonaStore) -> Vec<String> {
    match store.list_names().await {
        Ok(names) => names,
        Err(e) => {
            tracing::error!(store = store.name(), error = %e, "failed to list personas");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    struct BrokenStore;

    #[async_trait]
    impl PersonaStore for BrokenStore {
        fn name(&self) -> &'static str {
            "broken"
        }

        async fn find(&self, _name: &str) -> Result<Option<Persona>> {
            Err(Error::PersonaStore("connection refused".to_string()))
        }

        async fn list_names(&self) -> Result<Vec<String>> {
            Err(Error::PersonaStore("connection refused".to_string()))
        }
    }

    #[tokio::test]
    async fn unknown_name_resolves_to_default() {
        let store = StaticStore::builtin();
        let persona = get_persona(&store, "Unknown Name").await;
        assert_eq!(persona, Some(Persona::default_assistant()));
    }

    #[tokio::test]
    async fn known_name_is_returned() {
        let store = StaticStore::builtin();
        let persona = get_persona(&store, "Boomer Dad").await.expect("persona");
        assert_eq!(persona.name, "Boomer Dad");
        assert!(!persona.backstory.is_empty());
    }

    #[tokio::test]
    async fn transport_failure_is_absent() {
        assert_eq!(get_persona(&BrokenStore, "Boomer Dad").await, None);
        assert!(list_personas(&BrokenStore).await.is_empty());
    }
}
