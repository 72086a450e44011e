//! Conversation loop
//!
//! Joins a room, starts the session, applies the starting persona, greets
//! the user and then dispatches every finalized transcript to its own task:
//! switch requests go to the [`SessionController`], everything else is
//! answered by the session.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::{JoinError, JoinSet};

use crate::Result;
use crate::classifier::UtteranceClassifier;
use crate::controller::SessionController;
use crate::persona::DEFAULT_PERSONA_NAME;
use crate::prompt;
use crate::session::{AgentSession, ReplyOptions, Room, SessionEvent, TranscriptionEvent};

/// Default wait for in-flight handlers once the room closes
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Lifecycle of one conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationState {
    Connecting,
    SessionStarting,
    Greeting,
    Listening,
    SwitchingPersona,
    Closed,
}

/// Work shared with spawned handler tasks
struct Dispatcher {
    controller: Arc<SessionController>,
    session: Arc<dyn AgentSession>,
    classifier: UtteranceClassifier,
    state: Arc<watch::Sender<ConversationState>>,
    switching: AtomicUsize,
}

impl Dispatcher {
    async fn greet(&self) -> Result<()> {
        self.session
            .generate_reply(ReplyOptions::interruptible(prompt::greeting_instructions()))
            .await
    }

    async fn handle(&self, transcript: String) -> Result<()> {
        match self.classifier.classify(&transcript) {
            Some(name) => {
                tracing::info!(persona = %name, "persona switch requested");
                self.session.user_spoke(&transcript).await;
                self.begin_switch();
                let result = self.switch(&name).await;
                self.end_switch();
                result
            }
            None => self.session.reply_to_user(&transcript).await,
        }
    }

    /// Apply a persona and introduce it; the caller brackets this with
    /// [`Self::begin_switch`] and [`Self::end_switch`]
    async fn switch(&self, name: &str) -> Result<()> {
        match self.controller.switch_persona(name).await {
            Some(persona) if !persona.is_default() => {
                let intro = prompt::introduction_instructions(&persona);
                self.session
                    .generate_reply(ReplyOptions::interruptible(intro))
                    .await
            }
            Some(_) => Ok(()),
            None => {
                tracing::warn!(persona = name, "persona unavailable, keeping current");
                Ok(())
            }
        }
    }

    fn begin_switch(&self) {
        self.state.send_if_modified(|state| {
            let first = self.switching.fetch_add(1, Ordering::SeqCst) == 0;
            if first && *state == ConversationState::Listening {
                *state = ConversationState::SwitchingPersona;
                return true;
            }
            false
        });
    }

    fn end_switch(&self) {
        self.state.send_if_modified(|state| {
            let last = self.switching.fetch_sub(1, Ordering::SeqCst) == 1;
            if last && *state == ConversationState::SwitchingPersona {
                *state = ConversationState::Listening;
                return true;
            }
            false
        });
    }

    fn set_state(&self, next: ConversationState) {
        tracing::debug!(state = ?next, "conversation state");
        self.state.send_replace(next);
    }
}

/// Drives one conversation from connect to close
pub struct ConversationLoop {
    controller: Arc<SessionController>,
    session: Arc<dyn AgentSession>,
    classifier: UtteranceClassifier,
    initial_persona: String,
    shutdown_grace: Duration,
    state: Arc<watch::Sender<ConversationState>>,
}

impl ConversationLoop {
    #[must_use]
    pub fn new(controller: Arc<SessionController>, session: Arc<dyn AgentSession>) -> Self {
        let (state, _) = watch::channel(ConversationState::Connecting);

        Self {
            controller,
            session,
            classifier: UtteranceClassifier::new(),
            initial_persona: DEFAULT_PERSONA_NAME.to_string(),
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
            state: Arc::new(state),
        }
    }

    /// Persona applied right after the session starts
    #[must_use]
    pub fn with_initial_persona(mut self, name: impl Into<String>) -> Self {
        self.initial_persona = name.into();
        self
    }

    /// Classifier used for switch requests
    #[must_use]
    pub fn with_classifier(mut self, classifier: UtteranceClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    /// How long in-flight handlers may run after the room closes
    #[must_use]
    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    /// Watch the conversation state
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ConversationState> {
        self.state.subscribe()
    }

    /// Run the conversation until the room closes
    ///
    /// Handler failures are logged and never end the loop.
    ///
    /// # Errors
    ///
    /// Returns error if the room cannot be joined or the session cannot start
    pub async fn run(&self, room: &mut dyn Room) -> Result<()> {
        let dispatcher = Arc::new(Dispatcher {
            controller: Arc::clone(&self.controller),
            session: Arc::clone(&self.session),
            classifier: self.classifier.clone(),
            state: Arc::clone(&self.state),
            switching: AtomicUsize::new(0),
        });

        dispatcher.set_state(ConversationState::Connecting);
        let mut events = room.connect().await?;

        dispatcher.set_state(ConversationState::SessionStarting);
        dispatcher.session.start().await?;
        dispatcher
            .controller
            .attach_session(Arc::clone(&dispatcher.session));
        dispatcher
            .controller
            .initialize_persona(&self.initial_persona)
            .await;

        let mut tasks = JoinSet::new();

        dispatcher.set_state(ConversationState::Greeting);
        let greeter = Arc::clone(&dispatcher);
        tasks.spawn(async move { greeter.greet().await });

        dispatcher.set_state(ConversationState::Listening);
        tracing::info!("listening for transcripts");

        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(SessionEvent::UserInputTranscribed(event)) => {
                        dispatch(&dispatcher, event, &mut tasks);
                    }
                    Some(SessionEvent::Closed) | None => {
                        tracing::info!("room closed");
                        break;
                    }
                },
                Some(outcome) = tasks.join_next() => log_outcome(outcome),
            }
        }

        self.drain(tasks).await;
        dispatcher.set_state(ConversationState::Closed);
        Ok(())
    }

    /// Wait for in-flight handlers, aborting whatever outlives the grace period
    async fn drain(&self, mut tasks: JoinSet<Result<()>>) {
        let finished = tokio::time::timeout(self.shutdown_grace, async {
            while let Some(outcome) = tasks.join_next().await {
                log_outcome(outcome);
            }
        })
        .await;

        if finished.is_err() {
            tracing::warn!(pending = tasks.len(), "aborting handlers after grace period");
            tasks.abort_all();
            while let Some(outcome) = tasks.join_next().await {
                log_outcome(outcome);
            }
        }
    }
}

/// Spawn a handler for a finalized transcript
fn dispatch(
    dispatcher: &Arc<Dispatcher>,
    event: TranscriptionEvent,
    tasks: &mut JoinSet<Result<()>>,
) {
    if !event.is_final {
        tracing::trace!(transcript = %event.transcript, "ignoring interim transcript");
        return;
    }
    if event.transcript.trim().is_empty() {
        return;
    }

    tracing::debug!(transcript = %event.transcript, "user said");
    let dispatcher = Arc::clone(dispatcher);
    tasks.spawn(async move { dispatcher.handle(event.transcript).await });
}

fn log_outcome(outcome: std::result::Result<Result<()>, JoinError>) {
    match outcome {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::error!(error = %e, "transcript handler failed"),
        Err(e) if e.is_panic() => tracing::error!(error = %e, "transcript handler panicked"),
        Err(_) => tracing::debug!("transcript handler aborted"),
    }
}
