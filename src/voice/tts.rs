//! Text-to-speech (TTS) processing

use std::sync::{PoisonError, RwLock};

use serde::Serialize;
use uuid::Uuid;

use crate::{Error, Result};

const CARTESIA_API_URL: &str = "https://api.cartesia.ai/tts/bytes";
const CARTESIA_VERSION: &str = "2024-06-10";

/// Synthesizes speech from text with a voice that can change mid-session
pub struct TextToSpeech {
    client: reqwest::Client,
    api_key: String,
    model: String,
    voice: RwLock<String>,
    api_url: String,
}

impl TextToSpeech {
    /// Create a new TTS instance using `Cartesia`
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing or the voice id is invalid
    pub fn new_cartesia(api_key: String, model: String, voice_id: &str) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::Config("Cartesia API key required for TTS".to_string()));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            model,
            voice: RwLock::new(parse_voice_id(voice_id)?),
            api_url: CARTESIA_API_URL.to_string(),
        })
    }

    /// Point the client at a different synthesis endpoint
    #[must_use]
    pub fn with_api_url(mut self, api_url: String) -> Self {
        self.api_url = api_url;
        self
    }

    /// Voice currently used for synthesis
    #[must_use]
    pub fn voice(&self) -> String {
        self.voice
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Switch the synthesis voice; applies to the next utterance
    ///
    /// # Errors
    ///
    /// Returns error if the voice id is not a valid voice identifier. The
    /// current voice is kept in that case.
    pub fn update_voice(&self, voice_id: &str) -> Result<()> {
        let voice = parse_voice_id(voice_id)?;
        let mut current = self.voice.write().unwrap_or_else(PoisonError::into_inner);

        tracing::info!(from = %current, to = %voice, "tts voice updated");
        *current = voice;
        Ok(())
    }

    /// Synthesize text to speech
    ///
    /// # Returns
    ///
    /// Audio bytes (MP3 format)
    ///
    /// # Errors
    ///
    /// Returns error if synthesis fails
    pub async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        #[derive(Serialize)]
        struct CartesiaRequest<'a> {
            model_id: &'a str,
            transcript: &'a str,
            voice: VoiceSpec<'a>,
            output_format: OutputFormat,
        }

        #[derive(Serialize)]
        struct VoiceSpec<'a> {
            mode: &'static str,
            id: &'a str,
        }

        #[derive(Serialize)]
        struct OutputFormat {
            container: &'static str,
            sample_rate: u32,
            bit_rate: u32,
        }

        let voice = self.voice();
        let request = CartesiaRequest {
            model_id: &self.model,
            transcript: text,
            voice: VoiceSpec {
                mode: "id",
                id: &voice,
            },
            output_format: OutputFormat {
                container: "mp3",
                sample_rate: 44_100,
                bit_rate: 128_000,
            },
        };

        let response = self
            .client
            .post(&self.api_url)
            .header("X-API-Key", &self.api_key)
            .header("Cartesia-Version", CARTESIA_VERSION)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Tts(format!("Cartesia TTS error {status}: {body}")));
        }

        let audio = response.bytes().await?;
        Ok(audio.to_vec())
    }
}

/// Cartesia voice ids are UUIDs; normalize to the hyphenated lowercase form
fn parse_voice_id(voice_id: &str) -> Result<String> {
    Uuid::parse_str(voice_id.trim())
        .map(|id| id.hyphenated().to_string())
        .map_err(|e| Error::Tts(format!("invalid voice id {voice_id:?}: {e}")))
}
