//! Voice processing module
//!
//! Speech synthesis with a live voice switch. Speech recognition happens
//! upstream of this crate; transcripts arrive as session events.

mod tts;

pub use tts::TextToSpeech;
