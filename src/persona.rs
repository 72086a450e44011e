//! Persona records
//!
//! A persona is a named role-play identity with a backstory, a roast style
//! and an associated synthesis voice. Personas are read-only here: they are
//! sourced on demand from a [`PersonaStore`](crate::store::PersonaStore).

use serde::{Deserialize, Serialize};

/// Name of the sentinel default persona
pub const DEFAULT_PERSONA_NAME: &str = "Helpful Assistant";

/// Voice used when a persona has no voice of its own
pub const DEFAULT_VOICE_ID: &str = "9626c31c-bec5-4cca-baa8-f8ba9e84c8bc";

/// Personas advertised to the user in the base instructions and greeting
pub const ADVERTISED_PERSONAS: &[&str] = &[
    "Boomer Dad",
    "Gen Z Intern",
    "The VC Bro",
    "Stressed Mom",
    "The Engineer",
];

/// A role-play identity
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Persona {
    /// Display name, also the lookup key
    pub name: String,

    /// Who this persona is
    #[serde(default)]
    pub backstory: String,

    /// How this persona critiques ideas
    #[serde(default)]
    pub roast_style: String,

    /// Free-text description of how the voice should sound
    #[serde(default)]
    pub voice_vibe: String,

    /// Synthesis voice identifier (empty when unset)
    #[serde(default)]
    pub voice_id: String,
}

impl Persona {
    /// The sentinel default persona
    #[must_use]
    pub fn default_assistant() -> Self {
        Self {
            name: DEFAULT_PERSONA_NAME.to_string(),
            backstory: "A friendly and helpful AI assistant.".to_string(),
            roast_style: "Supportive and encouraging.".to_string(),
            voice_vibe: "Neutral".to_string(),
            voice_id: String::new(),
        }
    }

    /// Whether this is the sentinel default persona
    #[must_use]
    pub fn is_default(&self) -> bool {
        self.name == DEFAULT_PERSONA_NAME
    }

    /// Voice to synthesize with, falling back when the persona has none
    #[must_use]
    pub fn voice_or<'a>(&'a self, fallback: &'a str) -> &'a str {
        let voice = self.voice_id.trim();
        if voice.is_empty() { fallback } else { voice }
    }
}

impl Default for Persona {
    fn default() -> Self {
        Self::default_assistant()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_persona_is_sentinel() {
        let persona = Persona::default();
        assert!(persona.is_default());
        assert_eq!(persona.voice_vibe, "Neutral");
        assert!(persona.voice_id.is_empty());
    }

    #[test]
    fn voice_falls_back_when_blank() {
        let mut persona = Persona::default_assistant();
        assert_eq!(persona.voice_or(DEFAULT_VOICE_ID), DEFAULT_VOICE_ID);

        persona.voice_id = "   ".to_string();
        assert_eq!(persona.voice_or(DEFAULT_VOICE_ID), DEFAULT_VOICE_ID);

        persona.voice_id = "a0e99841-438c-4a64-b679-ae501e7d6091".to_string();
        assert_eq!(
            persona.voice_or(DEFAULT_VOICE_ID),
            "a0e99841-438c-4a64-b679-ae501e7d6091"
        );
    }

    #[test]
    fn missing_fields_deserialize_empty() {
        let persona: Persona = serde_json::from_str(r#"{"name": "Boomer Dad"}"#).unwrap();
        assert_eq!(persona.name, "Boomer Dad");
        assert!(persona.backstory.is_empty());
        assert!(!persona.is_default());
    }
}
