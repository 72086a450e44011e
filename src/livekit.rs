//! LiveKit room setup and participant access tokens
//!
//! Tokens are HS256 JWTs signed with the API secret, issued by the API key,
//! carrying a `video` grant. Room creation goes through the server's
//! `RoomService` Twirp endpoint, authorized by a short-lived admin token.

use std::time::Duration;

use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::config::LiveKitConfig;
use crate::{Error, Result};

/// Lifetime of participant tokens
pub const PARTICIPANT_TOKEN_TTL: Duration = Duration::from_secs(60 * 60);

/// Seconds an empty room is kept before the server closes it
pub const ROOM_EMPTY_TIMEOUT_SECS: u32 = 60;

const ADMIN_TOKEN_TTL: Duration = Duration::from_secs(10 * 60);
const CREATE_ROOM_PATH: &str = "/twirp/livekit.RoomService/CreateRoom";

/// Permissions carried by a token
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoGrant {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_create: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_join: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub can_publish: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub can_subscribe: Option<bool>,
}

impl VideoGrant {
    /// Join `room` with publish and subscribe rights
    #[must_use]
    pub fn participant(room: &str) -> Self {
        Self {
            room: Some(room.to_string()),
            room_join: Some(true),
            can_publish: Some(true),
            can_subscribe: Some(true),
            ..Self::default()
        }
    }

    /// Create rooms
    #[must_use]
    pub fn room_admin() -> Self {
        Self {
            room_create: Some(true),
            ..Self::default()
        }
    }
}

/// Access token claims
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// API key
    pub iss: String,

    /// Participant identity
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub sub: String,

    pub nbf: i64,
    pub exp: i64,
    pub video: VideoGrant,
}

/// A freshly set up room and the token to join it
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomToken {
    pub access_token: String,
    pub room_name: String,
}

/// Creates rooms and signs access tokens
pub struct RoomTokenIssuer {
    client: reqwest::Client,
    http_url: String,
    api_key: String,
    api_secret: SecretString,
}

impl std::fmt::Debug for RoomTokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoomTokenIssuer")
            .field("http_url", &self.http_url)
            .field("api_key", &self.api_key)
            .finish_non_exhaustive()
    }
}

impl RoomTokenIssuer {
    #[must_use]
    pub fn new(http_url: String, api_key: String, api_secret: SecretString) -> Self {
        Self {
            client: reqwest::Client::new(),
            http_url: http_url.trim_end_matches('/').to_string(),
            api_key,
            api_secret,
        }
    }

    #[must_use]
    pub fn from_config(config: &LiveKitConfig) -> Self {
        Self::new(
            config.http_url(),
            config.api_key.clone(),
            SecretString::from(config.api_secret.expose_secret().to_string()),
        )
    }

    /// Sign a token for `identity` carrying `grant`
    ///
    /// # Errors
    ///
    /// Returns error if signing fails
    pub fn sign(&self, identity: &str, grant: VideoGrant, ttl: Duration) -> Result<String> {
        let now = Utc::now().timestamp();
        let ttl = i64::try_from(ttl.as_secs())
            .map_err(|_| Error::Token(format!("token lifetime too long: {ttl:?}")))?;

        let claims = Claims {
            iss: self.api_key.clone(),
            sub: identity.to_string(),
            nbf: now,
            exp: now + ttl,
            video: grant,
        };

        let key = EncodingKey::from_secret(self.api_secret.expose_secret().as_bytes());
        Ok(jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &key)?)
    }

    /// Verify a token signed with this issuer's secret
    ///
    /// # Errors
    ///
    /// Returns error if the signature, issuer or lifetime is invalid
    pub fn verify(&self, token: &str) -> Result<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.api_key]);
        validation.validate_nbf = true;

        let key = DecodingKey::from_secret(self.api_secret.expose_secret().as_bytes());
        Ok(jsonwebtoken::decode::<Claims>(token, &key, &validation)?.claims)
    }

    /// Create a room on the server
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the server rejects it
    pub async fn create_room(&self, name: &str, empty_timeout_secs: u32) -> Result<()> {
        #[derive(Serialize)]
        struct CreateRoomRequest<'a> {
            name: &'a str,
            empty_timeout: u32,
        }

        let token = self.sign("", VideoGrant::room_admin(), ADMIN_TOKEN_TTL)?;
        let response = self
            .client
            .post(format!("{}{CREATE_ROOM_PATH}", self.http_url))
            .bearer_auth(token)
            .json(&CreateRoomRequest {
                name,
                empty_timeout: empty_timeout_secs,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Token(format!("CreateRoom failed {status}: {body}")));
        }

        tracing::info!(room = name, "room created");
        Ok(())
    }

    /// Create a fresh room and a participant token for it
    ///
    /// # Errors
    ///
    /// Returns error if the room cannot be created or the token signed
    pub async fn issue(&self) -> Result<RoomToken> {
        let millis = Utc::now().timestamp_millis();
        let room_name = format!("toast-room-{millis}");
        let identity = format!("user-{millis}");

        self.create_room(&room_name, ROOM_EMPTY_TIMEOUT_SECS).await?;
        let access_token = self.sign(
            &identity,
            VideoGrant::participant(&room_name),
            PARTICIPANT_TOKEN_TTL,
        )?;

        tracing::debug!(room = %room_name, identity = %identity, "participant token issued");
        Ok(RoomToken {
            access_token,
            room_name,
        })
    }
}
