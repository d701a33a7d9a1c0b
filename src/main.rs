use clap::{Parser, Subcommand};

use lms_toolkit::adapters::{LocalStorage, MemoryStore, RestStore};
use lms_toolkit::app::{HierarchyReportRun, ImportRun};
use lms_toolkit::config::ToolkitConfig;
use lms_toolkit::core::tokens::{register_quiz_tokens, tokens_for_trigger, TokenFilters};
use lms_toolkit::domain::model::{
    RecordId, TriggerEvent, GROUP_IDENTIFIER_KEY, GROUP_KIND, TRIGGER_PASS_QUIZ,
};
use lms_toolkit::domain::ports::{CourseLookup, RecordStore, Storage, TokenLedger};
use lms_toolkit::utils::validation::{self, Validate};
use lms_toolkit::utils::{logger, monitor};
use lms_toolkit::{TokenResolver, ToolkitError};

#[derive(Parser)]
#[command(name = "lms-toolkit")]
#[command(about = "Group import, hierarchy reports and quiz tokens for an LMS record store")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to a TOML config file (defaults to ./lms-toolkit.toml)
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Import groups from a CSV file
    Import {
        /// CSV file with group_name,group_identifier,group_parent columns
        file: String,
    },

    /// Report descendants of a group, flagging missing identifiers
    Report {
        /// Root group record id
        root: RecordId,
    },

    /// Tag one group with an identifier
    SetIdentifier {
        /// Group record id
        group: RecordId,

        /// Identifier value (sanitized to a lowercase key)
        identifier: String,
    },

    /// List the tokens a trigger publishes
    Tokens {
        /// Trigger code
        #[arg(short, long, default_value = TRIGGER_PASS_QUIZ)]
        trigger: String,
    },

    /// Resolve a colon-separated token request against recorded trigger data
    Resolve {
        /// Token request, e.g. "recipe:LDQUIZ:LDQUIZ_COURSE_TITLE"
        token: String,

        /// Recipe the trigger ran in
        #[arg(short, long)]
        recipe: u64,

        /// User the trigger fired for
        #[arg(short, long, default_value = "0")]
        user: u64,

        /// Trigger code the event carries
        #[arg(short, long, default_value = TRIGGER_PASS_QUIZ)]
        trigger: String,

        /// Extra trigger meta as key=value pairs
        #[arg(short, long, value_delimiter = ',')]
        meta: Vec<String>,

        /// Fallback printed when the token cannot be resolved
        #[arg(short, long, default_value = "")]
        default: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    logger::init_cli_logger(cli.verbose);

    tracing::info!("Starting lms-toolkit CLI");

    let config = match ToolkitConfig::load_or_default(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("❌ Failed to load configuration: {}", e);
            eprintln!("❌ {}", e);
            std::process::exit(2);
        }
    };
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        eprintln!("❌ {}", e);
        std::process::exit(2);
    }

    if config.system_stats_enabled() {
        tracing::info!("🔍 System monitoring enabled");
        let startup = monitor::SystemMonitor::new(true);
        startup.log_stats("startup");
    }

    match run(cli.command, config).await {
        Ok(exit_code) => {
            if exit_code != 0 {
                std::process::exit(exit_code);
            }
        }
        Err(e) => {
            tracing::error!("❌ {}", e);
            eprintln!("❌ {}", e);
            std::process::exit(1);
        }
    }

    Ok(())
}

/// Builds the configured store backend and hands off to the command
/// dispatcher. Returns the process exit code.
async fn run(command: Commands, config: ToolkitConfig) -> Result<i32, ToolkitError> {
    let storage = LocalStorage::new(".".to_string());

    match config.store_kind() {
        "rest" => {
            let endpoint = config.store.endpoint.clone().unwrap_or_default();
            tracing::info!("🌐 Connecting to record store at {}", endpoint);
            let store = RestStore::new(&endpoint, config.store.auth_token.clone(), config.timeout())?;
            dispatch(command, store, storage, config).await
        }
        _ => {
            let store = MemoryStore::new();
            if let Some(seed_file) = config.store.seed_file.clone() {
                let bytes = storage.read_file(&seed_file).await?;
                let summary = store.load_seed(&bytes).await?;
                tracing::info!(
                    "🌱 Seeded {} groups, {} courses, {} quiz links from {}",
                    summary.groups,
                    summary.courses,
                    summary.quiz_links,
                    seed_file
                );
            }
            dispatch(command, store, storage, config).await
        }
    }
}

async fn dispatch<S>(
    command: Commands,
    store: S,
    storage: LocalStorage,
    config: ToolkitConfig,
) -> Result<i32, ToolkitError>
where
    S: RecordStore + CourseLookup + TokenLedger + Clone,
{
    match command {
        Commands::Import { file } => {
            let run = ImportRun::new(store, storage, config);
            let outcome = run.execute(&file).await?;

            print!("{}", outcome.text);
            if outcome.report.is_success() {
                println!(
                    "✅ Import completed: {} rows processed",
                    outcome.report.rows_processed()
                );
                Ok(0)
            } else {
                println!(
                    "❌ Import finished with {} failed rows",
                    outcome.report.failed.len()
                );
                Ok(1)
            }
        }

        Commands::Report { root } => {
            let run = HierarchyReportRun::new(store, storage, config);
            let outcome = run.execute(root).await?;

            print!("{}", outcome.text);
            println!(
                "✅ {} descendants walked, {} missing an identifier",
                outcome.nodes.len(),
                outcome.missing_count()
            );
            Ok(0)
        }

        Commands::SetIdentifier { group, identifier } => {
            set_identifier(&store, group, &identifier).await?;
            Ok(0)
        }

        Commands::Tokens { trigger } => {
            list_tokens(&trigger);
            Ok(0)
        }

        Commands::Resolve {
            token,
            recipe,
            user,
            trigger,
            meta,
            default,
        } => {
            let mut event = TriggerEvent::new(&trigger, recipe, user);
            for pair in &meta {
                if let Some((key, value)) = pair.split_once('=') {
                    event = event.with_meta(key, value);
                }
            }

            let resolver = TokenResolver::new(store.clone(), store.clone(), store);
            let pieces: Vec<&str> = token.split(':').collect();
            let value = resolver.substitute(&pieces, &event, &default).await?;
            println!("{}", value);
            Ok(0)
        }
    }
}

async fn set_identifier<S: RecordStore>(
    store: &S,
    group: RecordId,
    identifier: &str,
) -> Result<(), ToolkitError> {
    let record = store
        .get(group)
        .await?
        .filter(|record| record.kind == GROUP_KIND)
        .ok_or(ToolkitError::GroupNotFoundError { id: group })?;

    let key = validation::normalize_identifier(identifier);
    if key.is_empty() {
        return Err(ToolkitError::InvalidConfigValueError {
            field: "identifier".to_string(),
            value: identifier.to_string(),
            reason: "Identifier must contain at least one letter, digit, '-' or '_'".to_string(),
        });
    }

    store.set_meta(group, GROUP_IDENTIFIER_KEY, &key).await?;
    println!("✅ Group '{}' ({}) tagged with identifier '{}'", record.name, group, key);
    Ok(())
}

fn list_tokens(trigger: &str) {
    let mut registry = TokenFilters::new();
    register_quiz_tokens(&mut registry);

    let event = TriggerEvent::new(trigger, 0, 0);
    let tokens = tokens_for_trigger(&registry, &event);

    if tokens.is_empty() {
        println!("No tokens registered for trigger {}", trigger);
        return;
    }

    println!("Tokens for trigger {}:", trigger);
    for token in tokens {
        println!(
            "  {:<22} {:<6} {}",
            token.id,
            token.kind.as_str(),
            token.name
        );
    }
}
