// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]

use anyhow::{Context, Result, anyhow};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{Shell, generate};
use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError, error, info};
use std::io::{Read, Write};
use std::sync::Arc;

use cookloc::app_config::{self, Config, TranslationProvider};
use cookloc::database::models::{EntityType, NewTranslationEvent};
use cookloc::database::repository::EventRef;
use cookloc::events::{self, BatchRunner, Trigger};
use cookloc::translator::{LlmTranslator, Translator};
use cookloc::{ContentStore, DatabaseConnection, Repository};

/// CLI Wrapper for TranslationProvider to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliTranslationProvider {
    Ollama,
    OpenAI,
    Anthropic,
}

impl From<CliTranslationProvider> for TranslationProvider {
    fn from(cli_provider: CliTranslationProvider) -> Self {
        match cli_provider {
            CliTranslationProvider::Ollama => TranslationProvider::Ollama,
            CliTranslationProvider::OpenAI => TranslationProvider::OpenAI,
            CliTranslationProvider::Anthropic => TranslationProvider::Anthropic,
        }
    }
}

/// CLI Wrapper for LogLevel to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for app_config::LogLevel {
    fn from(cli_level: CliLogLevel) -> Self {
        match cli_level {
            CliLogLevel::Error => app_config::LogLevel::Error,
            CliLogLevel::Warn => app_config::LogLevel::Warn,
            CliLogLevel::Info => app_config::LogLevel::Info,
            CliLogLevel::Debug => app_config::LogLevel::Debug,
            CliLogLevel::Trace => app_config::LogLevel::Trace,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Process a batch of eligible events (scheduled run)
    Run {
        /// Maximum number of events to claim (defaults to worker.batch_size)
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Process specific events by numeric id or public id
    Process {
        /// Event references
        #[arg(value_name = "EVENT", required = true)]
        refs: Vec<String>,
    },

    /// Process a queue message body ('-' or nothing reads stdin)
    HandleMessage {
        /// JSON payload
        #[arg(value_name = "PAYLOAD")]
        payload: Option<String>,
    },

    /// Queue a new translation event
    Enqueue {
        /// recipe, recipe_step, recipe_ingredient or log_post
        #[arg(short, long)]
        entity_type: String,

        /// Id of the entity row
        #[arg(short = 'i', long)]
        entity_id: i64,

        /// Locale the content is written in
        #[arg(short, long)]
        source: String,

        /// Locales to translate into (comma separated)
        #[arg(short, long, value_delimiter = ',', required = true)]
        targets: Vec<String>,
    },

    /// Show queue counts and exhausted events
    Stats,

    /// Send a short request to the configured provider
    Check,

    /// Put a failed event back in the queue with a fresh retry budget
    Requeue {
        /// Event id or public id
        #[arg(value_name = "EVENT")]
        event: String,
    },

    /// Generate shell completions for cookloc
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// cookloc - recipe content translation worker
///
/// Claims translation events from the queue, translates the locales each
/// event still misses with an LLM provider, and records the outcome.
#[derive(Parser, Debug)]
#[command(name = "cookloc")]
#[command(version)]
#[command(about = "Translation event worker for recipes and cooking logs")]
#[command(long_about = "cookloc processes queued translation events for recipes, recipe steps,
recipe ingredients and cooking log posts.

EXAMPLES:
    cookloc run                                  # Scheduled run over eligible events
    cookloc run --limit 50                       # Larger batch
    cookloc process 42 0f8fad5b-d9cb-469f-a165-70867728950e
    echo '{\"event_id\": 42}' | cookloc handle-message
    cookloc enqueue -e recipe -i 7 -s ko -t en,ja,zh-CN
    cookloc stats                                # Queue counts per status
    cookloc check                                # Provider reachable and key accepted
    cookloc requeue 42                           # Retry an exhausted event
    cookloc completions bash > cookloc.bash

CONFIGURATION:
    Configuration is stored in cookloc.json by default. If the file doesn't
    exist, a default one is created. The provider API key can also be given
    through the COOKLOC_API_KEY environment variable.")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long = "config", global = true, default_value = "cookloc.json")]
    config_path: String,

    /// Set logging level
    #[arg(short, long, global = true, value_enum)]
    log_level: Option<CliLogLevel>,

    /// Translation provider to use
    #[arg(short, long, global = true, value_enum)]
    provider: Option<CliTranslationProvider>,

    /// Model name to use for translation
    #[arg(short, long, global = true)]
    model: Option<String>,

    /// API key for hosted providers
    #[arg(long, global = true, env = "COOKLOC_API_KEY", hide_env_values = true)]
    api_key: Option<String>,
}

// @struct: Custom logger implementation, filtered by the global max level
struct CustomLogger;

impl CustomLogger {
    // @initializes: Global logger
    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        log::set_boxed_logger(Box::new(CustomLogger))?;
        log::set_max_level(level);
        Ok(())
    }

    // @returns: ANSI color and tag for a level
    fn style_for_level(level: Level) -> (&'static str, &'static str) {
        match level {
            Level::Error => ("1;31", "ERROR"),
            Level::Warn => ("1;33", "WARN "),
            Level::Info => ("1;32", "INFO "),
            Level::Debug => ("1;36", "DEBUG"),
            Level::Trace => ("1;35", "TRACE"),
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let now = chrono::Local::now().format("%H:%M:%S.%3f");
            let (color, tag) = Self::style_for_level(record.level());

            let mut stderr = std::io::stderr();
            let _ = writeln!(stderr, "\x1B[{}m{} {} {}\x1B[0m", color, now, tag, record.args());
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Info until the config says otherwise
    CustomLogger::init(LevelFilter::Info)?;

    let cli = CommandLineOptions::parse();

    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = CommandLineOptions::command();
        generate(*shell, &mut cmd, "cookloc", &mut std::io::stdout());
        return Ok(());
    }

    let config = load_config(&cli)?;
    log::set_max_level(config.log_level.to_level_filter());

    let result = match cli.command {
        Commands::Check => check_provider(&config).await,
        command => run_command(command, config).await,
    };
    if let Err(e) = &result {
        error!("{:#}", e);
    }
    result
}

/// Load the config file and apply command line overrides
fn load_config(cli: &CommandLineOptions) -> Result<Config> {
    let mut config = Config::load_or_create(&cli.config_path)?;

    if let Some(log_level) = &cli.log_level {
        config.log_level = log_level.clone().into();
    }
    if let Some(provider) = &cli.provider {
        config.translation.provider = provider.clone().into();
    }
    if let Some(model) = &cli.model {
        let provider_str = config.translation.provider.to_lowercase_string();
        match config
            .translation
            .available_providers
            .iter_mut()
            .find(|p| p.provider_type == provider_str)
        {
            Some(provider_config) => provider_config.model = model.clone(),
            None => {
                let mut provider_config = app_config::ProviderConfig::new(config.translation.provider);
                provider_config.model = model.clone();
                config.translation.available_providers.push(provider_config);
            }
        }
    }
    if let Some(api_key) = cli.api_key.as_deref().filter(|k| !k.trim().is_empty()) {
        config.set_api_key(api_key);
    }

    Ok(config)
}

/// Open the database named by the config, or the default location
fn open_database(config: &Config) -> Result<DatabaseConnection> {
    let path = match config.database.explicit_path() {
        Some(path) => path,
        None => DatabaseConnection::default_database_path()?,
    };
    DatabaseConnection::with_busy_timeout(
        &path,
        std::time::Duration::from_millis(config.database.busy_timeout_ms),
    )
}

async fn run_command(command: Commands, config: Config) -> Result<()> {
    let db = open_database(&config)?;
    let repo = Repository::new(db.clone());

    match command {
        Commands::Run { limit } => {
            run_trigger(&config, db, repo, Trigger::Scheduled { limit }).await
        }
        Commands::Process { refs } => {
            let refs = refs
                .iter()
                .map(|r| r.parse::<EventRef>())
                .collect::<Result<Vec<_>>>()?;
            run_trigger(&config, db, repo, Trigger::Explicit(refs)).await
        }
        Commands::HandleMessage { payload } => {
            let payload = match payload.as_deref() {
                None | Some("-") => {
                    let mut buf = String::new();
                    std::io::stdin()
                        .read_to_string(&mut buf)
                        .context("Failed to read message from stdin")?;
                    buf
                }
                Some(text) => text.to_string(),
            };
            let trigger = Trigger::from_message(&payload)?;
            run_trigger(&config, db, repo, trigger).await
        }
        Commands::Enqueue {
            entity_type,
            entity_id,
            source,
            targets,
        } => {
            let entity_type: EntityType = entity_type.parse()?;
            let created = events::enqueue(
                &repo,
                NewTranslationEvent {
                    entity_type,
                    entity_id,
                    source_locale: source,
                    target_locales: targets,
                },
            )
            .await?;
            println!("{} {}", created.id, created.public_id);
            Ok(())
        }
        Commands::Stats => {
            let stats = repo.queue_stats(config.worker.max_retries).await?;
            println!("{} (total {})", stats, stats.total());

            for event in repo.list_exhausted(config.worker.max_retries).await? {
                println!(
                    "  exhausted {} {} {} -> {:?}: {}",
                    event.public_id,
                    event.entity_type,
                    event.entity_id,
                    event.pending_locales(),
                    event.last_error.as_deref().unwrap_or("")
                );
            }
            Ok(())
        }
        Commands::Requeue { event } => {
            let event: EventRef = event.parse()?;
            if repo.requeue(&event).await? {
                info!("Requeued event {}", event);
                Ok(())
            } else {
                Err(anyhow!("Event {} is not in a failed state", event))
            }
        }
        Commands::Completions { .. } | Commands::Check => Ok(()),
    }
}

/// Verify the active provider answers before any event is claimed
async fn check_provider(config: &Config) -> Result<()> {
    config.validate()?;

    let translator = LlmTranslator::from_config(&config.translation);
    translator
        .test_connection()
        .await
        .with_context(|| format!("{} is not usable", translator.name()))?;
    println!("{} OK", translator.name());
    Ok(())
}

/// Build the worker and execute one run
async fn run_trigger(
    config: &Config,
    db: DatabaseConnection,
    repo: Repository,
    trigger: Trigger,
) -> Result<()> {
    config.validate()?;

    let translator = LlmTranslator::from_config(&config.translation);
    let runner = BatchRunner::new(
        repo,
        ContentStore::new(db),
        Arc::new(translator),
        &config.worker,
    );

    let summary = runner.run(trigger).await?;
    info!("Run finished: {}", summary);
    println!("{}", summary);
    Ok(())
}
