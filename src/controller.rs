//! Persona switching on a live session
//!
//! The controller owns the current [`PersonaState`] and the handle of the
//! running session. A switch fetches the persona, publishes a new snapshot
//! and pushes its instructions and voice into the session. Concurrent
//! switches race; the last one to complete is the one observed.

use std::sync::{Arc, PoisonError, RwLock};

use crate::persona::Persona;
use crate::prompt;
use crate::session::AgentSession;
use crate::store::{PersonaStore, get_persona};

/// Immutable snapshot of the active persona
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersonaState {
    /// Active persona, `None` until one is applied
    pub persona: Option<Persona>,

    /// System instructions for the session
    pub instructions: String,

    /// Synthesis voice for the session
    pub voice_id: String,

    /// Publication counter, incremented on every published snapshot
    pub revision: u64,
}

impl PersonaState {
    /// State before any persona is applied
    #[must_use]
    pub fn initial(default_voice: &str) -> Self {
        Self {
            persona: None,
            instructions: prompt::base_instructions(),
            voice_id: default_voice.to_string(),
            revision: 0,
        }
    }

    /// Snapshot for a persona; an empty voice id resolves to `default_voice`
    ///
    /// The revision is assigned when the snapshot is published.
    #[must_use]
    pub fn apply(persona: Persona, default_voice: &str) -> Self {
        Self {
            instructions: prompt::persona_instructions(&persona),
            voice_id: persona.voice_or(default_voice).to_string(),
            persona: Some(persona),
            revision: 0,
        }
    }
}

/// Applies persona switches to the live session
pub struct SessionController {
    store: Arc<dyn PersonaStore>,
    default_voice_id: String,
    state: RwLock<Arc<PersonaState>>,
    session: RwLock<Option<Arc<dyn AgentSession>>>,
}

impl SessionController {
    #[must_use]
    pub fn new(store: Arc<dyn PersonaStore>, default_voice_id: impl Into<String>) -> Self {
        let default_voice_id = default_voice_id.into();

        Self {
            store,
            state: RwLock::new(Arc::new(PersonaState::initial(&default_voice_id))),
            default_voice_id,
            session: RwLock::new(None),
        }
    }

    /// Attach the running session switches are applied to
    pub fn attach_session(&self, session: Arc<dyn AgentSession>) {
        *self.session.write().unwrap_or_else(PoisonError::into_inner) = Some(session);
    }

    /// Current persona snapshot
    #[must_use]
    pub fn current(&self) -> Arc<PersonaState> {
        Arc::clone(&self.state.read().unwrap_or_else(PoisonError::into_inner))
    }

    fn session(&self) -> Option<Arc<dyn AgentSession>> {
        self.session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Apply the configured starting persona
    ///
    /// Role-play instructions are applied only for a non-default persona.
    /// The voice is left alone. Returns `None` if the store failed, in which
    /// case the base instructions stay.
    pub async fn initialize_persona(&self, name: &str) -> Option<Persona> {
        let persona = get_persona(self.store.as_ref(), name).await?;

        if persona.is_default() {
            tracing::info!("starting with default persona");
            return Some(persona);
        }

        let session = self.session();
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);

        let next = PersonaState {
            persona: Some(persona.clone()),
            instructions: prompt::persona_instructions(&persona),
            voice_id: state.voice_id.clone(),
            revision: state.revision + 1,
        };
        if let Some(session) = session {
            session.set_instructions(next.instructions.clone());
        }
        *state = Arc::new(next);

        tracing::info!(persona = %persona.name, "initial persona applied");
        Some(persona)
    }

    /// Switch the live session to the persona called `name`
    ///
    /// Returns `None` without touching the session if the store could not
    /// be queried. A name with no match switches to the default persona. A
    /// rejected voice is logged and the switch still applies.
    pub async fn switch_persona(&self, name: &str) -> Option<Persona> {
        let persona = get_persona(self.store.as_ref(), name).await?;
        let mut next = PersonaState::apply(persona.clone(), &self.default_voice_id);

        let session = self.session();
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        next.revision = state.revision + 1;

        // Session updates happen under the state lock so the session never
        // disagrees with the published snapshot
        if let Some(session) = session {
            session.set_instructions(next.instructions.clone());

            if let Err(e) = session.update_voice(&next.voice_id) {
                tracing::error!(persona = %persona.name, voice = %next.voice_id, error = ?e, "failed to update voice");
            }
        }

        tracing::info!(persona = %persona.name, revision = next.revision, "switched persona");
        *state = Arc::new(next);

        Some(persona)
    }
}
