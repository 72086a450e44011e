//! Toast Gateway - Voice persona switching for user testing conversations
//!
//! This library provides the core functionality for the Toast gateway:
//! - Persona lookup (Notion database or a static roster)
//! - Switch request detection in finalized transcripts
//! - Live instruction and voice switching on a running session
//! - Conversation loop and LiveKit room token API
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                    Transports                        │
//! │      Console  │  Channel  │  LiveKit room token     │
//! └────────────────────┬────────────────────────────────┘
//!                      │ transcripts
//! ┌────────────────────▼────────────────────────────────┐
//! │                 Conversation Loop                    │
//! │   Classifier  │  Session Controller  │  Prompts     │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │                External Services                     │
//! │   Notion  │  Anthropic  │  Cartesia  │  LiveKit     │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod agent;
pub mod api;
pub mod classifier;
pub mod config;
pub mod controller;
pub mod error;
pub mod livekit;
pub mod llm;
pub mod persona;
pub mod prompt;
pub mod session;
pub mod store;
pub mod voice;

pub use agent::{ConversationLoop, ConversationState};
pub use classifier::{UtteranceClassifier, classify};
pub use config::Config;
pub use controller::{PersonaState, SessionController};
pub use error::{Error, Result};
pub use livekit::{RoomToken, RoomTokenIssuer};
pub use llm::{AnthropicChat, ChatMessage, ChatModel};
pub use persona::Persona;
pub use session::{AgentSession, LocalSession, Room, SessionEvent, TranscriptionEvent};
pub use store::{NotionStore, PersonaStore, StaticStore, get_persona};
pub use voice::TextToSpeech;
