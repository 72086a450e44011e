use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use secrecy::ExposeSecret;
use tracing_subscriber::EnvFilter;

use toast_gateway::api::{ApiServer, ApiState};
use toast_gateway::session::{ConsoleRoom, LocalSession, SpokenReply};
use toast_gateway::store::list_personas;
use toast_gateway::{
    AnthropicChat, Config, ConversationLoop, NotionStore, PersonaStore, RoomTokenIssuer,
    SessionController, StaticStore, TextToSpeech, UtteranceClassifier, get_persona, prompt,
};

/// Toast - User testing simulator with switchable voice personas
#[derive(Parser)]
#[command(name = "toast", version, about)]
struct Cli {
    /// Persona to start with (e.g., "Boomer Dad")
    #[arg(short, long, env = "TOAST_PERSONA")]
    persona: Option<String>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Talk to Toast on the console (one utterance per line, `~` marks interim)
    Chat,
    /// Serve the room token API
    Serve {
        /// Port to listen on
        #[arg(long, env = "TOAST_API_PORT")]
        port: Option<u16>,
    },
    /// Show which persona an utterance would switch to
    Classify {
        /// Transcribed utterance
        text: String,
    },
    /// Look up a persona in the configured store
    Persona {
        /// Persona name
        name: String,
    },
    /// List personas in the configured store
    Personas,
    /// Create a room and print a participant token
    Token,
    /// Synthesize a line of speech to an MP3 file
    TestTts {
        /// Text to speak
        #[arg(default_value = "Hi, I'm Toast! Who do you want to talk to?")]
        text: String,
        /// Voice to use (defaults to the configured default voice)
        #[arg(long)]
        voice: Option<String>,
        /// Output file
        #[arg(short, long, default_value = "toast-tts.mp3")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,toast_gateway=info",
        1 => "info,toast_gateway=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = Config::load();
    if let Some(persona) = cli.persona {
        config.initial_persona = persona;
    }
    tracing::debug!(?config, "loaded configuration");

    match cli.command.unwrap_or(Command::Chat) {
        Command::Chat => chat(config).await,
        Command::Serve { port } => serve(config, port).await,
        Command::Classify { text } => {
            match UtteranceClassifier::new().classify(&text) {
                Some(name) => println!("switch to: {name}"),
                None => println!("no switch request"),
            }
            Ok(())
        }
        Command::Persona { name } => show_persona(&config, &name).await,
        Command::Personas => {
            let store = persona_store(&config)?;
            for name in list_personas(store.as_ref()).await {
                println!("{name}");
            }
            Ok(())
        }
        Command::Token => issue_token(&config).await,
        Command::TestTts {
            text,
            voice,
            output,
        } => test_tts(&config, &text, voice.as_deref(), &output).await,
    }
}

/// Pick the persona store: Notion when configured, else a roster file, else
/// the built-in roster
fn persona_store(config: &Config) -> anyhow::Result<Arc<dyn PersonaStore>> {
    if let Some(notion) = &config.notion {
        tracing::info!(database = ?notion.database_id, "using Notion persona store");
        return Ok(Arc::new(NotionStore::from_config(notion)?));
    }

    if let Some(path) = &config.personas_file {
        tracing::info!(path = %path.display(), "using persona roster file");
        return Ok(Arc::new(StaticStore::from_file(path)?));
    }

    tracing::info!("using built-in persona roster");
    Ok(Arc::new(StaticStore::builtin()))
}

/// Speech synthesizer, if `Cartesia` is configured
fn synthesizer(config: &Config) -> anyhow::Result<Option<Arc<TextToSpeech>>> {
    let Some(key) = &config.voice.api_key else {
        tracing::info!("CARTESIA_API_KEY not set, replies will be text only");
        return Ok(None);
    };

    let tts = TextToSpeech::new_cartesia(
        key.expose_secret().to_string(),
        config.voice.model.clone(),
        &config.voice.default_voice_id,
    )?;
    Ok(Some(Arc::new(tts)))
}

/// Run a conversation on the console
async fn chat(config: Config) -> anyhow::Result<()> {
    let store = persona_store(&config)?;

    let key = config
        .llm
        .api_key
        .as_ref()
        .context("ANTHROPIC_API_KEY is required for chat")?;
    let chat_model = AnthropicChat::new(
        key.expose_secret().to_string(),
        config.llm.model.clone(),
        config.llm.max_tokens,
    )?;

    let (session, replies) = LocalSession::new(
        Arc::new(chat_model),
        synthesizer(&config)?,
        prompt::base_instructions(),
        config.voice.default_voice_id.clone(),
    );

    let controller = Arc::new(SessionController::new(
        store,
        config.voice.default_voice_id.clone(),
    ));
    tokio::spawn(print_replies(Arc::clone(&controller), replies));

    let conversation = ConversationLoop::new(controller, Arc::new(session))
        .with_initial_persona(config.initial_persona.clone())
        .with_shutdown_grace(config.shutdown_grace);

    tracing::info!(persona = %config.initial_persona, "toast ready - type to talk, Ctrl-D to leave");

    let mut room = ConsoleRoom::new();
    tokio::select! {
        result = conversation.run(&mut room) => result?,
        _ = tokio::signal::ctrl_c() => tracing::info!("shutdown requested"),
    }

    Ok(())
}

/// Print spoken replies under the active persona's name
async fn print_replies(
    controller: Arc<SessionController>,
    mut replies: tokio::sync::mpsc::UnboundedReceiver<SpokenReply>,
) {
    while let Some(reply) = replies.recv().await {
        let state = controller.current();
        let speaker = state.persona.as_ref().map_or("Toast", |p| p.name.as_str());

        match reply.audio_bytes {
            Some(bytes) => println!("{speaker}: {} [{bytes} bytes audio]", reply.text),
            None => println!("{speaker}: {}", reply.text),
        }
    }
}

/// Serve the room token API until interrupted
async fn serve(config: Config, port: Option<u16>) -> anyhow::Result<()> {
    let state = ApiState {
        livekit: config
            .livekit
            .as_ref()
            .map(|lk| Arc::new(RoomTokenIssuer::from_config(lk))),
    };

    ApiServer::new(state, port.unwrap_or(config.api_server.port))
        .run()
        .await?;
    Ok(())
}

async fn show_persona(config: &Config, name: &str) -> anyhow::Result<()> {
    let store = persona_store(config)?;

    let persona = get_persona(store.as_ref(), name)
        .await
        .with_context(|| format!("persona store unavailable while looking up {name:?}"))?;

    println!("{}", serde_json::to_string_pretty(&persona)?);
    Ok(())
}

async fn issue_token(config: &Config) -> anyhow::Result<()> {
    let livekit = config
        .livekit
        .as_ref()
        .context("LIVEKIT_URL, LIVEKIT_API_KEY and LIVEKIT_API_SECRET are required")?;

    let token = RoomTokenIssuer::from_config(livekit).issue().await?;
    println!("{}", serde_json::to_string_pretty(&token)?);
    Ok(())
}

/// Test TTS output
async fn test_tts(
    config: &Config,
    text: &str,
    voice: Option<&str>,
    output: &std::path::Path,
) -> anyhow::Result<()> {
    let tts = synthesizer(config)?.context("CARTESIA_API_KEY is required for TTS")?;
    if let Some(voice) = voice {
        tts.update_voice(voice)?;
    }

    println!("Synthesizing with voice {}...", tts.voice());
    let audio = tts.synthesize(text).await?;
    tokio::fs::write(output, &audio).await?;

    println!("Wrote {} bytes to {}", audio.len(), output.display());
    Ok(())
}
