//! Utterance classification
//!
//! Decides whether a finalized transcript asks for a persona switch and, if
//! so, which persona. Explicit phrases ("talk to X", "switch to X", ...) win;
//! otherwise a fixed alias table catches bare persona mentions, including a
//! few common speech-to-text mishearings.

use std::sync::LazyLock;

use regex::Regex;

/// Switch phrases, tried in order. The capture runs up to a period, a comma
/// or the end of the transcript, ignoring one trailing newline.
static SWITCH_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"talk to (.*?)(?:\.|,|\n?\z)",
        r"switch to (.*?)(?:\.|,|\n?\z)",
        r"change to (.*?)(?:\.|,|\n?\z)",
        r"let me talk to (.*?)(?:\.|,|\n?\z)",
    ]
    .into_iter()
    .map(|p| Regex::new(p).expect("valid switch pattern"))
    .collect()
});

/// Substring aliases mapped to canonical persona names. Order matters: the
/// first alias contained in the transcript wins.
pub const DEFAULT_ALIASES: &[(&str, &str)] = &[
    ("boomer dad", "Boomer Dad"),
    ("boomer", "Boomer Dad"),
    ("gen z intern", "Gen Z Intern"),
    ("gen z", "Gen Z Intern"),
    ("genz", "Gen Z Intern"),
    ("vc bro", "The VC Bro"),
    // mishearings
    ("vc pro", "The VC Bro"),
    ("vb bro", "The VC Bro"),
    ("stressed mom", "Stressed Mom"),
    ("mom", "Stressed Mom"),
    ("engineer", "The Engineer"),
];

/// Classifies finalized transcripts into persona switch requests
#[derive(Debug, Clone)]
pub struct UtteranceClassifier {
    aliases: Vec<(String, String)>,
}

impl UtteranceClassifier {
    /// Create a classifier with the built-in alias table
    #[must_use]
    pub fn new() -> Self {
        Self::with_aliases(DEFAULT_ALIASES.iter().copied())
    }

    /// Create a classifier with a custom alias table
    ///
    /// Aliases are lower-cased; their order is kept.
    pub fn with_aliases<I, A, N>(aliases: I) -> Self
    where
        I: IntoIterator<Item = (A, N)>,
        A: AsRef<str>,
        N: Into<String>,
    {
        let aliases = aliases
            .into_iter()
            .map(|(alias, name)| (alias.as_ref().to_lowercase(), name.into()))
            .collect();

        Self { aliases }
    }

    /// The alias table in match order
    #[must_use]
    pub fn aliases(&self) -> &[(String, String)] {
        &self.aliases
    }

    /// Return the persona name a transcript asks for, if any
    #[must_use]
    pub fn classify(&self, transcript: &str) -> Option<String> {
        let text = transcript.to_lowercase();

        if let Some(name) = explicit_request(&text) {
            tracing::debug!(persona = %name, "explicit switch phrase");
            return Some(name);
        }

        let (alias, name) = self
            .aliases
            .iter()
            .find(|(alias, _)| text.contains(alias.as_str()))?;

        tracing::debug!(alias = %alias, persona = %name, "persona alias mentioned");
        Some(name.clone())
    }
}

impl Default for UtteranceClassifier {
    fn default() -> Self {
        Self::new()
    }
}

/// Classify with the built-in alias table
#[must_use]
pub fn classify(transcript: &str) -> Option<String> {
    UtteranceClassifier::new().classify(transcript)
}

/// Apply the switch phrases to lower-cased text
///
/// Only the first matching phrase is considered. An empty capture means no
/// explicit request.
fn explicit_request(text: &str) -> Option<String> {
    let captured = SWITCH_PATTERNS
        .iter()
        .find_map(|pattern| pattern.captures(text))
        .and_then(|caps| caps.get(1))?
        .as_str()
        .trim();

    if captured.is_empty() {
        None
    } else {
        Some(title_case(captured))
    }
}

/// Upper-case every letter that follows a non-letter, lower-case the rest
#[must_use]
pub fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut prev_is_letter = false;

    for c in text.chars() {
        if c.is_alphabetic() {
            if prev_is_letter {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            prev_is_letter = true;
        } else {
            out.push(c);
            prev_is_letter = false;
        }
    }

    out
}
