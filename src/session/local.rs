//! Session running the reply pipeline in-process
//!
//! Replies come from a [`ChatModel`]; when a synthesizer is attached each
//! reply is also rendered to audio with the current voice. Spoken replies
//! are published on a channel for the caller to display or forward.

use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify, mpsc};

use super::{AgentSession, ReplyOptions};
use crate::llm::{ChatMessage, ChatModel, Role};
use crate::voice::TextToSpeech;
use crate::Result;

/// Cue sent when the model must speak without a pending user turn
const TURN_CUE: &str = "(It's your turn to speak.)";

/// A reply the session spoke
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpokenReply {
    /// Reply text
    pub text: String,

    /// Voice the reply was spoken with
    pub voice_id: String,

    /// Size of the synthesized audio, if a synthesizer is attached
    pub audio_bytes: Option<usize>,
}

/// In-process [`AgentSession`]
pub struct LocalSession {
    chat: Arc<dyn ChatModel>,
    tts: Option<Arc<TextToSpeech>>,
    instructions: RwLock<String>,
    voice: RwLock<String>,
    history: Mutex<Vec<ChatMessage>>,
    interrupt: Notify,
    output: mpsc::UnboundedSender<SpokenReply>,
}

impl LocalSession {
    /// Create a session and the receiver its spoken replies are sent to
    pub fn new(
        chat: Arc<dyn ChatModel>,
        tts: Option<Arc<TextToSpeech>>,
        instructions: String,
        voice_id: String,
    ) -> (Self, mpsc::UnboundedReceiver<SpokenReply>) {
        let (output, replies) = mpsc::unbounded_channel();
        let voice = tts.as_ref().map_or(voice_id, |t| t.voice());

        let session = Self {
            chat,
            tts,
            instructions: RwLock::new(instructions),
            voice: RwLock::new(voice),
            history: Mutex::new(Vec::new()),
            interrupt: Notify::new(),
            output,
        };

        (session, replies)
    }

    /// Voice replies are currently spoken with
    #[must_use]
    pub fn voice_id(&self) -> String {
        self.voice.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Conversation so far
    pub async fn history(&self) -> Vec<ChatMessage> {
        self.history.lock().await.clone()
    }

    /// Generate a reply to the recorded history and speak it
    async fn respond(&self, one_off: Option<&str>) -> Result<()> {
        let mut system = self.instructions();
        if let Some(extra) = one_off {
            system.push_str("\n\nFor this reply only: ");
            system.push_str(extra);
        }

        let mut messages = self.history().await;
        if messages.last().is_none_or(|m| m.role != Role::User) {
            messages.push(ChatMessage::user(TURN_CUE));
        }

        let reply = self.chat.complete(&system, &messages).await?;
        self.history
            .lock()
            .await
            .push(ChatMessage::assistant(reply.clone()));

        self.speak(reply).await
    }

    /// Synthesize (if possible) and publish a reply
    async fn speak(&self, text: String) -> Result<()> {
        let voice_id = self.voice_id();

        let audio_bytes = match &self.tts {
            Some(tts) => match tts.synthesize(&text).await {
                Ok(audio) => Some(audio.len()),
                Err(e) => {
                    tracing::warn!(error = %e, "speech synthesis failed, sending text only");
                    None
                }
            },
            None => None,
        };

        tracing::debug!(voice = %voice_id, ?audio_bytes, "speaking reply");

        // Receiver gone means nobody is listening anymore
        let _ = self.output.send(SpokenReply {
            text,
            voice_id,
            audio_bytes,
        });
        Ok(())
    }
}

#[async_trait]
impl AgentSession for LocalSession {
    async fn start(&self) -> Result<()> {
        tracing::info!(
            voice = %self.voice_id(),
            tts = self.tts.is_some(),
            "local session started"
        );
        Ok(())
    }

    fn instructions(&self) -> String {
        self.instructions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set_instructions(&self, instructions: String) {
        *self
            .instructions
            .write()
            .unwrap_or_else(PoisonError::into_inner) = instructions;
    }

    fn update_voice(&self, voice_id: &str) -> Result<()> {
        let applied = match &self.tts {
            Some(tts) => {
                tts.update_voice(voice_id)?;
                tts.voice()
            }
            None => voice_id.to_string(),
        };

        *self.voice.write().unwrap_or_else(PoisonError::into_inner) = applied;
        Ok(())
    }

    async fn generate_reply(&self, options: ReplyOptions) -> Result<()> {
        let interrupted = self.interrupt.notified();
        let reply = self.respond(Some(&options.instructions));

        if !options.allow_interruptions {
            return reply.await;
        }

        tokio::select! {
            result = reply => result,
            () = interrupted => {
                tracing::info!("reply interrupted by user speech");
                Ok(())
            }
        }
    }

    async fn user_spoke(&self, transcript: &str) {
        self.interrupt.notify_waiters();

        self.history
            .lock()
            .await
            .push(ChatMessage::user(transcript));
    }

    async fn reply_to_user(&self, transcript: &str) -> Result<()> {
        self.user_spoke(transcript).await;
        self.respond(None).await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::persona::DEFAULT_VOICE_ID;

    /// Echoes the system prompt's first line, optionally after a delay
    struct EchoModel {
        delay: Duration,
    }

    #[async_trait]
    impl ChatModel for EchoModel {
        async fn complete(&self, system: &str, messages: &[ChatMessage]) -> Result<String> {
            tokio::time::sleep(self.delay).await;
            let last = messages.last().map(|m| m.content.as_str()).unwrap_or_default();
            Ok(format!("{} | {last}", system.lines().next().unwrap_or_default()))
        }
    }

    fn session(delay: Duration) -> (LocalSession, mpsc::UnboundedReceiver<SpokenReply>) {
        LocalSession::new(
            Arc::new(EchoModel { delay }),
            None,
            "You are Toast.".to_string(),
            DEFAULT_VOICE_ID.to_string(),
        )
    }

    #[tokio::test]
    async fn replies_use_current_instructions() {
        let (session, mut replies) = session(Duration::ZERO);

        session.reply_to_user("hello").await.unwrap();
        assert_eq!(replies.recv().await.unwrap().text, "You are Toast. | hello");

        session.set_instructions("You are Boomer Dad.".to_string());
        session.reply_to_user("hi again").await.unwrap();

        let reply = replies.recv().await.unwrap();
        assert_eq!(reply.text, "You are Boomer Dad. | hi again");
        assert_eq!(reply.voice_id, DEFAULT_VOICE_ID);
        assert_eq!(reply.audio_bytes, None);

        let history = session.history().await;
        assert_eq!(history.len(), 4);
        assert_eq!(history[0], ChatMessage::user("hello"));
    }

    #[tokio::test]
    async fn generate_reply_without_user_turn() {
        let (session, mut replies) = session(Duration::ZERO);

        session
            .generate_reply(ReplyOptions::interruptible("Greet the user."))
            .await
            .unwrap();

        let reply = replies.recv().await.unwrap();
        assert_eq!(reply.text, format!("You are Toast. | {TURN_CUE}"));
        assert_eq!(session.history().await, vec![ChatMessage::assistant(reply.text)]);
    }

    #[tokio::test]
    async fn user_speech_interrupts_reply() {
        let (session, mut replies) = session(Duration::from_millis(200));
        let session = Arc::new(session);

        let speaking = {
            let session = Arc::clone(&session);
            tokio::spawn(async move {
                session
                    .generate_reply(ReplyOptions::interruptible("Introduce yourself."))
                    .await
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        session.reply_to_user("wait").await.unwrap();
        speaking.await.unwrap().unwrap();

        // Only the answer to "wait" was spoken
        assert_eq!(replies.recv().await.unwrap().text, "You are Toast. | wait");
        assert!(replies.try_recv().is_err());
    }

    #[tokio::test]
    async fn recorded_speech_interrupts_without_answer() {
        let (session, mut replies) = session(Duration::from_millis(200));
        let session = Arc::new(session);

        let speaking = {
            let session = Arc::clone(&session);
            tokio::spawn(async move {
                session
                    .generate_reply(ReplyOptions::interruptible("Introduce yourself."))
                    .await
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        session.user_spoke("talk to boomer dad").await;
        speaking.await.unwrap().unwrap();

        assert!(replies.try_recv().is_err());
        assert_eq!(
            session.history().await,
            vec![ChatMessage::user("talk to boomer dad")]
        );
    }

    #[test]
    fn voice_without_synthesizer_is_recorded() {
        let (session, _replies) = session(Duration::ZERO);
        session.update_voice("anything").unwrap();
        assert_eq!(session.voice_id(), "anything");
    }
}
