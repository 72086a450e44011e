//! In-memory persona roster

use std::path::Path;

use async_trait::async_trait;

use super::PersonaStore;
use crate::persona::Persona;
use crate::{Error, Result};

/// Roster compiled into the binary for running without a persona database
const BUILTIN_ROSTER: &str = include_str!("../../personas/roster.json");

/// Persona store backed by a fixed list
#[derive(Debug, Clone, Default)]
pub struct StaticStore {
    personas: Vec<Persona>,
}

impl StaticStore {
    /// Create a store from a list of personas
    #[must_use]
    pub const fn new(personas: Vec<Persona>) -> Self {
        Self { personas }
    }

    /// Store holding the built-in roster
    ///
    /// # Panics
    ///
    /// Panics if the embedded roster is not valid JSON
    #[must_use]
    pub fn builtin() -> Self {
        Self::from_json(BUILTIN_ROSTER).expect("embedded roster is valid JSON")
    }

    /// Parse a JSON array of personas
    ///
    /// # Errors
    ///
    /// Returns error if the JSON is not an array of personas
    pub fn from_json(json: &str) -> Result<Self> {
        let personas: Vec<Persona> = serde_json::from_str(json)?;
        Ok(Self::new(personas))
    }

    /// Load a JSON roster file
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or parsed
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let store = Self::from_json(&content).map_err(|e| {
            Error::Config(format!("failed to parse roster {}: {e}", path.display()))
        })?;

        tracing::info!(path = %path.display(), personas = store.personas.len(), "loaded persona roster");
        Ok(store)
    }

    /// Personas in roster order
    #[must_use]
    pub fn personas(&self) -> &[Persona] {
        &self.personas
    }
}

#[async_trait]
impl PersonaStore for StaticStore {
    fn name(&self) -> &'static str {
        "roster"
    }

    /// Case-insensitive match: the stored name contains the query, or the
    /// query contains the stored name ("Boomer Dad Please")
    async fn find(&self, name: &str) -> Result<Option<Persona>> {
        let query = name.trim().to_lowercase();
        if query.is_empty() {
            return Ok(None);
        }

        let found = self.personas.iter().find(|p| {
            let stored = p.name.trim().to_lowercase();
            !stored.is_empty() && (stored.contains(&query) || query.contains(&stored))
        });

        Ok(found.cloned())
    }

    async fn list_names(&self) -> Result<Vec<String>> {
        Ok(self.personas.iter().map(|p| p.name.clone()).collect())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn builtin_roster_has_advertised_personas() {
        let store = StaticStore::builtin();
        let names: Vec<&str> = store.personas().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, crate::persona::ADVERTISED_PERSONAS);
    }

    #[tokio::test]
    async fn find_is_case_insensitive() {
        let store = StaticStore::builtin();

        let persona = store.find("The Vc Bro").await.unwrap().expect("match");
        assert_eq!(persona.name, "The VC Bro");

        let persona = store.find("boomer dad please").await.unwrap().expect("match");
        assert_eq!(persona.name, "Boomer Dad");

        assert!(store.find("Grandpa").await.unwrap().is_none());
        assert!(store.find("   ").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn unnamed_entries_never_match() {
        let mut nameless = Persona::default_assistant();
        nameless.name = String::new();
        let store = StaticStore::new(vec![nameless]);

        assert!(store.find("Boomer Dad").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn loads_roster_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"name": "Grumpy Landlord", "backstory": "Owns six buildings.", "voice_id": "abc"}}]"#
        )
        .unwrap();

        let store = StaticStore::from_file(file.path()).unwrap();
        assert_eq!(store.list_names().await.unwrap(), vec!["Grumpy Landlord"]);

        let persona = store.find("grumpy landlord").await.unwrap().unwrap();
        assert_eq!(persona.backstory, "Owns six buildings.");
        assert!(persona.roast_style.is_empty());
    }

    #[test]
    fn rejects_malformed_roster() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"name": "not a list"}}"#).unwrap();

        assert!(matches!(StaticStore::from_file(file.path()), Err(Error::Config(_))));
    }
}
