//! Live conversation sessions
//!
//! A [`Room`] delivers transcription events; an [`AgentSession`] is the
//! running speech pipeline whose instructions and voice can be changed while
//! it runs.

mod local;
mod room;

use async_trait::async_trait;
use tokio::sync::mpsc;

pub use local::{LocalSession, SpokenReply};
pub use room::{ChannelRoom, ConsoleRoom};

use crate::Result;

/// A speech-to-text result for one user utterance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptionEvent {
    /// Transcribed text
    pub transcript: String,

    /// Whether the transcription is complete (not interim)
    pub is_final: bool,
}

impl TranscriptionEvent {
    /// A finalized transcript
    #[must_use]
    pub fn final_transcript(transcript: impl Into<String>) -> Self {
        Self {
            transcript: transcript.into(),
            is_final: true,
        }
    }

    /// An interim transcript
    #[must_use]
    pub fn interim(transcript: impl Into<String>) -> Self {
        Self {
            transcript: transcript.into(),
            is_final: false,
        }
    }
}

/// Events raised by a room
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// `user_input_transcribed`
    UserInputTranscribed(TranscriptionEvent),

    /// The room was closed by the platform
    Closed,
}

/// One-off reply request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyOptions {
    /// Instructions for this reply only, on top of the session instructions
    pub instructions: String,

    /// Whether new user speech may cut the reply short
    pub allow_interruptions: bool,
}

impl ReplyOptions {
    /// Interruptible reply with one-off instructions
    #[must_use]
    pub fn interruptible(instructions: impl Into<String>) -> Self {
        Self {
            instructions: instructions.into(),
            allow_interruptions: true,
        }
    }
}

/// Transport a conversation takes place in
#[async_trait]
pub trait Room: Send {
    /// Join the room and return its event stream
    ///
    /// The stream ending is equivalent to [`SessionEvent::Closed`].
    ///
    /// # Errors
    ///
    /// Returns error if the room cannot be joined
    async fn connect(&mut self) -> Result<mpsc::Receiver<SessionEvent>>;
}

/// A running speech pipeline (STT → LLM → TTS)
#[async_trait]
pub trait AgentSession: Send + Sync {
    /// Start the pipeline
    ///
    /// # Errors
    ///
    /// Returns error if the pipeline cannot start
    async fn start(&self) -> Result<()>;

    /// Current system instructions
    fn instructions(&self) -> String;

    /// Replace the system instructions; the next model turn uses them
    fn set_instructions(&self, instructions: String);

    /// Reconfigure the synthesis voice on the running pipeline
    ///
    /// # Errors
    ///
    /// Returns error if the synthesizer rejects the voice
    fn update_voice(&self, voice_id: &str) -> Result<()>;

    /// Generate and speak a reply guided by one-off instructions
    ///
    /// # Errors
    ///
    /// Returns error if generation or synthesis fails
    async fn generate_reply(&self, options: ReplyOptions) -> Result<()>;

    /// Record a finalized user utterance without answering it
    ///
    /// Cuts off any interruptible reply in flight.
    async fn user_spoke(&self, transcript: &str);

    /// Answer a finalized user utterance under the current instructions
    ///
    /// The utterance is recorded as by [`AgentSession::user_spoke`] first.
    ///
    /// # Errors
    ///
    /// Returns error if generation or synthesis fails
    async fn reply_to_user(&self, transcript: &str) -> Result<()>;
}
