//! Wakeline CLI
//!
//! Manage provider keys and local memory, and run a text-driven voice
//! session from the terminal: typed lines stand in for transcripts.

use clap::{Parser, Subcommand};
use futures_util::StreamExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing_subscriber::EnvFilter;
use wakeline::{
    build_live_agent,
    memory::DEFAULT_QUERY_LIMIT,
    open_memory_store,
    security::{self, SecurityPolicy},
    wakeword::strip_wake_phrases,
    AgentError, AgentResult, AgentSettings, CredentialProvider, CredentialStore,
    DefaultSecurityPolicy, InMemoryMemoryStore, KeychainStore,
    LocalMemoryStore, LogObserver, MemoryQueryContext, SecureCredentialStore,
    SecureKeyValueStore, VoiceSessionOrchestrator, WakeWordModel,
};

/// Wakeline: hands-free voice agent sessions
#[derive(Parser)]
#[command(name = "wakeline")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Data directory (default: platform data dir)
    #[arg(long, env = "WAKELINE_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Settings file (JSON, missing fields take defaults)
    #[arg(short, long, env = "WAKELINE_CONFIG")]
    config: Option<PathBuf>,

    /// Keep secrets in memory instead of the OS keychain
    #[arg(long)]
    ephemeral: bool,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage provider API keys
    Keys {
        #[command(subcommand)]
        action: KeysCommand,
    },

    /// Inspect or clear conversation memory
    Memory {
        #[command(subcommand)]
        action: MemoryCommand,
    },

    /// Print the runtime risk report
    Risk,

    /// Talk to the agent; each line is one turn
    Chat {
        /// Wake-word model to arm
        #[arg(long, default_value = "jarvis-en")]
        wake_model: String,

        /// Wait for a typed wake phrase before opening the conversation
        #[arg(long)]
        wait_for_wake: bool,
    },

    /// Synthesize speech into an audio file
    Speak {
        /// Text to speak
        text: String,

        /// Output file
        #[arg(short, long)]
        out: PathBuf,

        /// Voice id (default: configured voice)
        #[arg(long)]
        voice: Option<String>,
    },
}

#[derive(Subcommand)]
enum KeysCommand {
    /// Store a key (read from stdin when omitted)
    Set {
        /// openai | elevenlabs
        provider: CredentialProvider,
        /// API key
        key: Option<String>,
    },

    /// Show which keys are stored
    Status,

    /// Delete a stored key
    Remove {
        /// openai | elevenlabs
        provider: CredentialProvider,
    },
}

#[derive(Subcommand)]
enum MemoryCommand {
    /// List saved summaries, newest first
    List {
        /// Only records mentioning this keyword (repeatable)
        #[arg(short, long)]
        keyword: Vec<String>,

        /// Maximum number of records
        #[arg(short, long, default_value_t = DEFAULT_QUERY_LIMIT)]
        limit: usize,
    },

    /// Delete every saved summary
    Purge,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose {
        "wakeline=debug"
    } else {
        "wakeline=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run(cli).await {
        eprintln!("Error: {}", err.user_message());
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> AgentResult<()> {
    let mut settings = match &cli.config {
        Some(path) => AgentSettings::load(path)?,
        None => AgentSettings::default(),
    };
    if let Some(dir) = cli.data_dir {
        settings.data_dir = dir;
    }
    let ctx = Context::new(settings, cli.ephemeral).await?;

    match cli.command {
        Commands::Keys { action } => match action {
            KeysCommand::Set { provider, key } => cmd_keys_set(&ctx, provider, key).await,
            KeysCommand::Status => cmd_keys_status(&ctx).await,
            KeysCommand::Remove { provider } => cmd_keys_remove(&ctx, provider).await,
        },
        Commands::Memory { action } => match action {
            MemoryCommand::List { keyword, limit } => cmd_memory_list(&ctx, keyword, limit).await,
            MemoryCommand::Purge => cmd_memory_purge(&ctx).await,
        },
        Commands::Risk => cmd_risk(),
        Commands::Chat {
            wake_model,
            wait_for_wake,
        } => cmd_chat(&ctx, &wake_model, wait_for_wake).await,
        Commands::Speak { text, out, voice } => cmd_speak(&ctx, &text, &out, voice).await,
    }
}

/// Stores chosen for this invocation
struct Context {
    settings: AgentSettings,
    credentials: Arc<SecureCredentialStore>,
    memory: Arc<dyn LocalMemoryStore>,
}

impl Context {
    async fn new(settings: AgentSettings, ephemeral: bool) -> AgentResult<Self> {
        if ephemeral {
            let credentials = Arc::new(SecureCredentialStore::in_memory());
            seed_from_env(&credentials).await?;
            return Ok(Context {
                settings,
                credentials,
                memory: Arc::new(InMemoryMemoryStore::new()),
            });
        }

        let key_tier: Arc<dyn SecureKeyValueStore> =
            Arc::new(KeychainStore::new(&settings.memory_key_service));
        let credential_tier: Arc<dyn SecureKeyValueStore> =
            Arc::new(KeychainStore::new(&settings.credential_service));
        Ok(Context {
            memory: Arc::new(open_memory_store(&settings, key_tier)),
            credentials: Arc::new(SecureCredentialStore::new(credential_tier)),
            settings,
        })
    }

    fn agent(&self, settings: &AgentSettings) -> AgentResult<VoiceSessionOrchestrator> {
        build_live_agent(
            settings,
            self.credentials.clone(),
            self.memory.clone(),
            Arc::new(LogObserver),
        )
    }
}

/// Ephemeral runs have no stored keys; take them from the environment
async fn seed_from_env(credentials: &SecureCredentialStore) -> AgentResult<()> {
    for (provider, var) in [
        (CredentialProvider::OpenAi, "OPENAI_API_KEY"),
        (CredentialProvider::ElevenLabs, "ELEVENLABS_API_KEY"),
    ] {
        if let Ok(value) = std::env::var(var) {
            if !value.trim().is_empty() {
                credentials.set_key(provider, &value).await?;
            }
        }
    }
    Ok(())
}

async fn cmd_keys_set(
    ctx: &Context,
    provider: CredentialProvider,
    key: Option<String>,
) -> AgentResult<()> {
    let key = match key {
        Some(key) => key,
        None => {
            eprint!("Paste the {} API key: ", provider);
            let mut lines = stdin_lines();
            lines
                .next_line()
                .await
                .map_err(|e| AgentError::Other(format!("Failed to read stdin: {}", e)))?
                .unwrap_or_default()
        }
    };

    ctx.credentials.set_key(provider, &key).await?;
    println!("Stored {} key.", provider);

    let stored = ctx.credentials.get_key(provider).await?.unwrap_or_default();
    if !security::validate_api_key_format(provider, &stored) {
        println!("Warning: the key format looks invalid for {}.", provider);
    }
    Ok(())
}

async fn cmd_keys_status(ctx: &Context) -> AgentResult<()> {
    for provider in CredentialProvider::ALL {
        let status = match ctx.credentials.get_key(provider).await? {
            None => "missing".to_string(),
            Some(key) if security::validate_api_key_format(provider, &key) => {
                format!("stored (fingerprint {})", security::fingerprint(&key))
            }
            Some(_) => "stored, format looks invalid".to_string(),
        };
        println!("{:<12} {}", provider, status);
    }
    Ok(())
}

async fn cmd_keys_remove(ctx: &Context, provider: CredentialProvider) -> AgentResult<()> {
    ctx.credentials.remove_key(provider).await?;
    println!("Removed {} key.", provider);
    Ok(())
}

async fn cmd_memory_list(ctx: &Context, keywords: Vec<String>, limit: usize) -> AgentResult<()> {
    let records = ctx
        .memory
        .query(&MemoryQueryContext::new(keywords, limit))
        .await?;

    if records.is_empty() {
        println!("No memories.");
        return Ok(());
    }
    for record in records {
        let tags = if record.tags.is_empty() {
            String::new()
        } else {
            format!("  [{}]", record.tags.join(", "))
        };
        println!(
            "{}  {}{}",
            record.created_at.format("%Y-%m-%d %H:%M"),
            record.summary,
            tags
        );
    }
    Ok(())
}

async fn cmd_memory_purge(ctx: &Context) -> AgentResult<()> {
    ctx.memory.delete_all().await?;
    println!("Memory cleared.");
    Ok(())
}

fn cmd_risk() -> AgentResult<()> {
    let report = DefaultSecurityPolicy::default().runtime_risk_check();
    let json = serde_json::to_string_pretty(&report)
        .map_err(|e| AgentError::Other(format!("Failed to encode report: {}", e)))?;
    println!("{}", json);
    if report.should_degrade_capabilities() {
        println!("Arming is disabled in this environment.");
    }
    Ok(())
}

async fn cmd_chat(ctx: &Context, wake_model: &str, wait_for_wake: bool) -> AgentResult<()> {
    let model = WakeWordModel::find(wake_model)
        .ok_or_else(|| AgentError::ModelNotFound(wake_model.to_string()))?;

    // The CLI opens conversations itself so the wake line can carry a request
    let mut settings = ctx.settings.clone();
    settings.session.auto_begin_conversation_on_wake_word = false;
    let agent = ctx.agent(&settings)?;
    agent.arm(wake_model).await?;

    let mut lines = stdin_lines();
    let result = chat_loop(&agent, &model, wait_for_wake, &mut lines).await;
    agent.disarm().await;
    result
}

async fn chat_loop(
    agent: &VoiceSessionOrchestrator,
    model: &WakeWordModel,
    wait_for_wake: bool,
    lines: &mut Lines<BufReader<Stdin>>,
) -> AgentResult<()> {
    println!("Commands: /end [summary] closes the conversation, /quit exits.");

    loop {
        let opening = if wait_for_wake {
            println!(
                "Listening for '{}'...",
                model.trigger_phrases.first().map(String::as_str).unwrap_or("")
            );
            match wait_for_wake_phrase(agent, model, lines).await? {
                Some(rest) => rest,
                None => return Ok(()),
            }
        } else {
            String::new()
        };

        let session_id = agent.begin_conversation().await?;
        println!("Conversation {} started.", session_id);
        if !opening.is_empty() {
            reply(agent, &opening).await?;
        }

        loop {
            let Some(line) = read_line(lines).await? else {
                return Ok(());
            };
            let line = line.trim();

            if line == "/quit" {
                return Ok(());
            }
            if let Some(rest) = line.strip_prefix("/end") {
                let summary = rest.trim();
                agent
                    .end_conversation(Some(summary).filter(|s| !s.is_empty()), &[])
                    .await?;
                println!("Conversation ended.");
                break;
            }
            if !line.is_empty() {
                reply(agent, line).await?;
            }
        }

        if !wait_for_wake {
            return Ok(());
        }
    }
}

/// Feed lines to the wake-word engine until one matches; returns what
/// followed the wake phrase
async fn wait_for_wake_phrase(
    agent: &VoiceSessionOrchestrator,
    model: &WakeWordModel,
    lines: &mut Lines<BufReader<Stdin>>,
) -> AgentResult<Option<String>> {
    loop {
        let Some(line) = read_line(lines).await? else {
            return Ok(None);
        };
        if line.trim() == "/quit" {
            return Ok(None);
        }
        if agent.ingest_transcript(&line).await.is_some() {
            return Ok(Some(strip_wake_phrases(&line, model)));
        }
    }
}

async fn reply(agent: &VoiceSessionOrchestrator, text: &str) -> AgentResult<()> {
    match agent.send_text(text).await {
        Ok(response) => {
            println!("{}", response.text);
            Ok(())
        }
        Err(err) if err.is_credential_problem() => Err(err),
        Err(err) => {
            eprintln!("Error: {}", err.user_message());
            Ok(())
        }
    }
}

async fn cmd_speak(ctx: &Context, text: &str, out: &Path, voice: Option<String>) -> AgentResult<()> {
    let mut settings = ctx.settings.clone();
    if let Some(voice) = voice {
        settings.session.voice_id = voice;
    }
    let agent = ctx.agent(&settings)?;

    let mut audio = Vec::new();
    let mut chunks = agent.synthesize(text);
    while let Some(chunk) = chunks.next().await {
        audio.extend_from_slice(&chunk?);
    }

    tokio::fs::write(out, &audio).await.map_err(|e| {
        AgentError::Other(format!("Failed to write {}: {}", out.display(), e))
    })?;
    println!("Wrote {} bytes to {}", audio.len(), out.display());
    Ok(())
}

fn stdin_lines() -> Lines<BufReader<Stdin>> {
    BufReader::new(tokio::io::stdin()).lines()
}

/// Next stdin line, or `None` on EOF / Ctrl-C
async fn read_line(lines: &mut Lines<BufReader<Stdin>>) -> AgentResult<Option<String>> {
    tokio::select! {
        line = lines.next_line() => {
            line.map_err(|e| AgentError::Other(format!("Failed to read stdin: {}", e)))
        }
        _ = tokio::signal::ctrl_c() => Ok(None),
    }
}
