//! Configuration management for the Toast gateway
//!
//! Everything is read from the environment. A `.env.local` file in the
//! working directory is loaded first, without overriding variables that are
//! already set.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::persona::{DEFAULT_PERSONA_NAME, DEFAULT_VOICE_ID};

/// Local environment file loaded at startup
pub const ENV_FILE: &str = ".env.local";

const DEFAULT_NOTION_BASE_URL: &str = "https://api.notion.com/v1";
const DEFAULT_LLM_MODEL: &str = "claude-3-haiku-20240307";
const DEFAULT_LLM_MAX_TOKENS: u32 = 256;
const DEFAULT_TTS_MODEL: &str = "sonic-2";
const DEFAULT_API_PORT: u16 = 3000;
const DEFAULT_SHUTDOWN_GRACE_SECS: u64 = 5;

/// Toast gateway configuration
#[derive(Debug)]
pub struct Config {
    /// Persona fetched right after the session starts
    pub initial_persona: String,

    /// Notion persona database (None when `NOTION_API_KEY` is unset)
    pub notion: Option<NotionConfig>,

    /// JSON persona roster used when Notion is not configured
    pub personas_file: Option<PathBuf>,

    /// Language model configuration
    pub llm: LlmConfig,

    /// Speech synthesis configuration
    pub voice: VoiceConfig,

    /// LiveKit credentials (None unless url, key and secret are all set)
    pub livekit: Option<LiveKitConfig>,

    /// HTTP API server configuration
    pub api_server: ApiServerConfig,

    /// How long the conversation loop waits for in-flight handlers on close
    pub shutdown_grace: Duration,
}

/// Notion persona database
#[derive(Debug)]
pub struct NotionConfig {
    /// Integration token
    pub api_key: SecretString,

    /// Database holding persona pages
    pub database_id: Option<String>,

    /// API base URL
    pub base_url: String,
}

/// Language model configuration
#[derive(Debug)]
pub struct LlmConfig {
    /// `Anthropic` API key
    pub api_key: Option<SecretString>,

    /// Model identifier
    pub model: String,

    /// Max tokens per reply
    pub max_tokens: u32,
}

/// Speech synthesis configuration
#[derive(Debug)]
pub struct VoiceConfig {
    /// `Cartesia` API key
    pub api_key: Option<SecretString>,

    /// TTS model identifier
    pub model: String,

    /// Voice used when a persona carries none
    pub default_voice_id: String,
}

/// LiveKit server credentials
#[derive(Debug)]
pub struct LiveKitConfig {
    /// WebSocket URL of the LiveKit server (`wss://...`)
    pub url: String,

    /// API key (token issuer)
    pub api_key: String,

    /// API secret (token signing key)
    pub api_secret: SecretString,
}

impl LiveKitConfig {
    /// HTTP(S) endpoint for server API calls
    #[must_use]
    pub fn http_url(&self) -> String {
        let url = self.url.trim_end_matches('/');
        if let Some(rest) = url.strip_prefix("wss://") {
            format!("https://{rest}")
        } else if let Some(rest) = url.strip_prefix("ws://") {
            format!("http://{rest}")
        } else {
            url.to_string()
        }
    }
}

/// HTTP API server configuration
#[derive(Debug, Clone)]
pub struct ApiServerConfig {
    /// Port to listen on
    pub port: u16,
}

impl Config {
    /// Load `.env.local` (if present) and read configuration from the environment
    #[must_use]
    pub fn load() -> Self {
        match dotenvy::from_filename(ENV_FILE) {
            Ok(path) => tracing::debug!(path = %path.display(), "loaded environment file"),
            Err(e) if e.not_found() => tracing::debug!(file = ENV_FILE, "no environment file"),
            Err(e) => tracing::warn!(file = ENV_FILE, error = %e, "failed to load environment file"),
        }

        Self::from_env()
    }

    /// Read configuration from the process environment
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup
    pub fn from_vars<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let notion = var("NOTION_API_KEY").map(|key| NotionConfig {
            api_key: SecretString::from(key),
            database_id: var("NOTION_DATABASE_ID"),
            base_url: var("NOTION_BASE_URL")
                .unwrap_or_else(|| DEFAULT_NOTION_BASE_URL.to_string()),
        });

        let llm = LlmConfig {
            api_key: var("ANTHROPIC_API_KEY").map(SecretString::from),
            model: var("TOAST_LLM_MODEL").unwrap_or_else(|| DEFAULT_LLM_MODEL.to_string()),
            max_tokens: parse_or(
                "TOAST_LLM_MAX_TOKENS",
                var("TOAST_LLM_MAX_TOKENS"),
                DEFAULT_LLM_MAX_TOKENS,
            ),
        };

        let voice = VoiceConfig {
            api_key: var("CARTESIA_API_KEY").map(SecretString::from),
            model: var("TOAST_TTS_MODEL").unwrap_or_else(|| DEFAULT_TTS_MODEL.to_string()),
            default_voice_id: var("TOAST_DEFAULT_VOICE_ID")
                .unwrap_or_else(|| DEFAULT_VOICE_ID.to_string()),
        };

        let livekit = match (
            var("LIVEKIT_URL").or_else(|| var("NEXT_PUBLIC_LIVEKIT_URL")),
            var("LIVEKIT_API_KEY"),
            var("LIVEKIT_API_SECRET"),
        ) {
            (Some(url), Some(api_key), Some(secret)) => Some(LiveKitConfig {
                url,
                api_key,
                api_secret: SecretString::from(secret),
            }),
            _ => None,
        };

        let api_server = ApiServerConfig {
            port: parse_or("TOAST_API_PORT", var("TOAST_API_PORT"), DEFAULT_API_PORT),
        };

        let shutdown_grace = Duration::from_secs(parse_or(
            "TOAST_SHUTDOWN_GRACE_SECS",
            var("TOAST_SHUTDOWN_GRACE_SECS"),
            DEFAULT_SHUTDOWN_GRACE_SECS,
        ));

        Self {
            initial_persona: var("TOAST_PERSONA")
                .unwrap_or_else(|| DEFAULT_PERSONA_NAME.to_string()),
            notion,
            personas_file: var("TOAST_PERSONAS_FILE").map(PathBuf::from),
            llm,
            voice,
            livekit,
            api_server,
            shutdown_grace,
        }
    }
}

/// Parse a numeric variable, warning and falling back on bad input
fn parse_or<T>(key: &str, value: Option<String>, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    match value {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, "invalid numeric setting, using default");
            default
        }),
        None => default,
    }
}
