//! Shared test utilities
#![allow(dead_code)]

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use tokio::net::TcpListener;
use toast_gateway::persona::Persona;
use toast_gateway::session::{AgentSession, ReplyOptions};
use toast_gateway::{Error, Result, StaticStore};

/// Voice the test roster gives Stressed Mom
pub const MOM_VOICE: &str = "a0e99841-438c-4a64-b679-ae501e7d6091";

/// A call made on a [`RecordingSession`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Generate {
        instructions: String,
        allow_interruptions: bool,
    },
    Reply {
        transcript: String,
        /// Session instructions in effect when the reply was requested
        instructions: String,
    },
}

/// Session that records what it was asked to do
#[derive(Default)]
pub struct RecordingSession {
    instructions: Mutex<String>,
    voices: Mutex<Vec<String>>,
    calls: Mutex<Vec<Call>>,
    heard: Mutex<Vec<String>>,
    started: Mutex<bool>,
    failing_transcript: Option<String>,
    reply_delay: Duration,
    generate_delay: Duration,
}

impl RecordingSession {
    /// Session whose reply to `transcript` fails
    pub fn failing_on(transcript: &str) -> Self {
        Self {
            failing_transcript: Some(transcript.to_string()),
            ..Self::default()
        }
    }

    /// Session whose replies take `delay`
    pub fn with_reply_delay(delay: Duration) -> Self {
        Self {
            reply_delay: delay,
            ..Self::default()
        }
    }

    /// Session whose generated replies take `delay`
    pub fn with_generate_delay(delay: Duration) -> Self {
        Self {
            generate_delay: delay,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn voices(&self) -> Vec<String> {
        self.voices.lock().unwrap().clone()
    }

    /// Utterances recorded without an answer
    pub fn heard(&self) -> Vec<String> {
        self.heard.lock().unwrap().clone()
    }

    pub fn started(&self) -> bool {
        *self.started.lock().unwrap()
    }

    pub fn replies(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Reply { transcript, .. } => Some(transcript),
                Call::Generate { .. } => None,
            })
            .collect()
    }
}

#[async_trait]
impl AgentSession for RecordingSession {
    async fn start(&self) -> Result<()> {
        *self.started.lock().unwrap() = true;
        Ok(())
    }

    fn instructions(&self) -> String {
        self.instructions.lock().unwrap().clone()
    }

    fn set_instructions(&self, instructions: String) {
        *self.instructions.lock().unwrap() = instructions;
    }

    fn update_voice(&self, voice_id: &str) -> Result<()> {
        self.voices.lock().unwrap().push(voice_id.to_string());
        Ok(())
    }

    async fn generate_reply(&self, options: ReplyOptions) -> Result<()> {
        self.calls.lock().unwrap().push(Call::Generate {
            instructions: options.instructions,
            allow_interruptions: options.allow_interruptions,
        });
        tokio::time::sleep(self.generate_delay).await;
        Ok(())
    }

    async fn user_spoke(&self, transcript: &str) {
        self.heard.lock().unwrap().push(transcript.to_string());
    }

    async fn reply_to_user(&self, transcript: &str) -> Result<()> {
        let instructions = self.instructions();
        tokio::time::sleep(self.reply_delay).await;

        if self.failing_transcript.as_deref() == Some(transcript) {
            return Err(Error::Llm("model overloaded".to_string()));
        }

        self.calls.lock().unwrap().push(Call::Reply {
            transcript: transcript.to_string(),
            instructions,
        });
        Ok(())
    }
}

/// Roster with two personas
pub fn roster() -> StaticStore {
    StaticStore::new(vec![
        Persona {
            name: "Boomer Dad".to_string(),
            backstory: "Retired accountant who prints his emails.".to_string(),
            roast_style: "Asks where the manual is.".to_string(),
            voice_vibe: "Gruff".to_string(),
            voice_id: String::new(),
        },
        Persona {
            name: "Stressed Mom".to_string(),
            backstory: "Runs a household of five on four hours of sleep.".to_string(),
            roast_style: "Has exactly ten seconds for your onboarding.".to_string(),
            voice_vibe: "Hurried".to_string(),
            voice_id: MOM_VOICE.to_string(),
        },
    ])
}

/// Serve a router on an ephemeral local port and return its base URL
pub async fn spawn_server(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind test server");
    let addr = listener.local_addr().expect("local addr");

    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("test server failed");
    });

    format!("http://{addr}")
}

/// Poll `check` until it holds or two seconds pass
pub async fn eventually(mut check: impl FnMut() -> bool) {
    for _ in 0..200 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not met in time");
}
