use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tokio::sync::{mpsc, oneshot};

use xfeed::category::TOPIC_KEYS;
use xfeed::classify::backend_factory;
use xfeed::config::Config;
use xfeed::controller::FeedController;
use xfeed::dom::Document;
use xfeed::session::{is_home_path, HostEvent, Session};
use xfeed::settings::{ApiProvider, ClassificationMethod, ControlMessage, InstallReason, Settings};
use xfeed::storage::{Database, DatabaseError};

/// Get the config directory path (~/.config/xfeed/)
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".config").join("xfeed"))
}

#[derive(Parser, Debug)]
#[command(name = "xfeed", about = "Classify timeline posts by topic and hide the topics you turned off")]
struct Args {
    /// Config file (default: ~/.config/xfeed/config.toml)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Seed the settings store with defaults
    Install {
        /// Treat as an upgrade: keep existing settings
        #[arg(long)]
        update: bool,
    },
    /// Show or change stored settings
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
    /// Run the filter over a saved timeline page
    Filter {
        #[arg(long, value_name = "FILE")]
        input: PathBuf,

        /// Markup appended to the timeline after the first pass, in order
        #[arg(long, value_name = "FILE")]
        append: Vec<PathBuf>,

        /// Write the filtered page here instead of stdout
        #[arg(long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Settings JSON saved and pushed to the session after the appends
        #[arg(long, value_name = "FILE")]
        update_settings: Option<PathBuf>,

        /// Page path; the filter only runs on home timelines
        #[arg(long, default_value = "/home")]
        path: String,
    },
}

#[derive(Subcommand, Debug)]
enum SettingsAction {
    /// Print the stored settings as JSON (API key masked)
    Show,
    /// Change individual fields
    Set {
        #[arg(long)]
        enabled: Option<bool>,
        #[arg(long)]
        show_indicators: Option<bool>,
        #[arg(long)]
        method: Option<ClassificationMethod>,
        #[arg(long)]
        provider: Option<ApiProvider>,
        #[arg(long)]
        api_key: Option<String>,
    },
    /// Turn one topic on or off
    Topic {
        key: String,
        /// on/off, yes/no or true/false
        #[arg(action = clap::ArgAction::Set, value_parser = clap::builder::BoolishValueParser::new())]
        enabled: bool,
    },
    /// Restore the install defaults
    Reset,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so `filter` can write the page to stdout.
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config_dir = get_config_dir()?;
    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir).context("Failed to create config directory")?;
        tracing::info!(path = %config_dir.display(), "Created config directory");
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o700);
        if let Err(e) = std::fs::set_permissions(&config_dir, perms) {
            tracing::warn!(
                path = %config_dir.display(),
                error = %e,
                "Failed to set config directory permissions to 0700"
            );
        }
    }

    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| config_dir.join("config.toml"));
    let config = Config::load(&config_path).context("Failed to load config")?;

    let db_path = config
        .store_path
        .clone()
        .unwrap_or_else(|| config_dir.join("xfeed.db"));
    let db = open_store(&db_path).await?;

    match args.command {
        Command::Install { update } => {
            let reason = if update {
                InstallReason::Update
            } else {
                InstallReason::Install
            };
            if db.install(reason).await? {
                println!("Default settings saved to {}", db_path.display());
            } else {
                println!("Existing settings kept.");
            }
        }
        Command::Settings { action } => settings_command(&db, action).await?,
        Command::Filter {
            input,
            append,
            output,
            update_settings,
            path,
        } => {
            let page = filter_page(&config, &db, &input, &append, update_settings.as_deref(), &path).await?;
            match output {
                Some(out) => std::fs::write(&out, page)
                    .with_context(|| format!("Failed to write '{}'", out.display()))?,
                None => print!("{page}"),
            }
        }
    }

    Ok(())
}

async fn open_store(path: &Path) -> Result<Database> {
    let path_str = path
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("Invalid UTF-8 in database path"))?;
    match Database::open(path_str).await {
        Ok(db) => Ok(db),
        Err(DatabaseError::InstanceLocked) => {
            eprintln!("Error: {}", DatabaseError::InstanceLocked);
            std::process::exit(1);
        }
        Err(e) => Err(anyhow::anyhow!("Failed to open settings store: {}", e)),
    }
}

async fn settings_command(db: &Database, action: SettingsAction) -> Result<()> {
    let current = db.load_settings().await?;
    let mut settings = match action {
        SettingsAction::Show => {
            let Some(settings) = current else {
                println!("No settings stored. Run `xfeed install` first.");
                return Ok(());
            };
            let mut shown = serde_json::to_value(&settings)?;
            if !settings.api_key.is_empty() {
                shown["apiKey"] = "[REDACTED]".into();
            }
            println!("{}", serde_json::to_string_pretty(&shown)?);
            return Ok(());
        }
        SettingsAction::Reset => Settings::default(),
        SettingsAction::Set {
            enabled,
            show_indicators,
            method,
            provider,
            api_key,
        } => {
            let mut settings = current.unwrap_or_default();
            if let Some(v) = enabled {
                settings.enabled = v;
            }
            if let Some(v) = show_indicators {
                settings.show_indicators = v;
            }
            if let Some(v) = method {
                settings.classification_method = v;
            }
            if let Some(v) = provider {
                settings.api_provider = v;
            }
            if let Some(v) = api_key {
                settings.api_key = v.trim().to_string();
            }
            settings
        }
        SettingsAction::Topic { key, enabled } => {
            if !TOPIC_KEYS.contains(&key.as_str()) {
                anyhow::bail!("Unknown topic '{key}'. Topics: {}", TOPIC_KEYS.join(", "));
            }
            let mut settings = current.unwrap_or_default();
            settings.topics.insert(key, enabled);
            settings
        }
    };

    // Every stored record carries the full topic catalog.
    for key in TOPIC_KEYS {
        settings.topics.entry(key.to_string()).or_insert(true);
    }
    db.save_settings(&settings).await?;
    println!("Settings saved.");
    Ok(())
}

async fn filter_page(
    config: &Config,
    db: &Database,
    input: &Path,
    appends: &[PathBuf],
    update_settings: Option<&Path>,
    path: &str,
) -> Result<String> {
    let html = read_file(input)?;
    if !is_home_path(path) {
        tracing::info!(path = %path, "Not a home timeline, leaving page untouched");
        return Ok(html);
    }

    let client = reqwest::Client::builder()
        .pool_idle_timeout(std::time::Duration::from_secs(30))
        .tcp_keepalive(std::time::Duration::from_secs(60))
        .build()
        .context("Failed to build HTTP client")?;
    let mut controller = FeedController::new(config, backend_factory(config, client))
        .context("Invalid selector in config")?;
    if let Err(e) = controller.init(db).await {
        // Fatal to the controller only: the page is still written, unfiltered.
        tracing::error!(error = %e, "Controller initialisation failed, filter inactive");
        eprintln!("Error: {e}");
    }

    let mut session = Session::new(Document::parse_html(&html), controller, config);
    if session.controller().is_active() {
        // A saved page does not change between polls, so attach back to back
        // instead of waiting on the session ticker.
        while !session.observer().is_attached() {
            session.poll_attach().await;
        }
    }

    let (tx, rx) = mpsc::channel(16);
    let task = tokio::spawn(session.run(rx));

    for fragment in appends {
        let html = read_file(fragment)?;
        tx.send(HostEvent::Inject { target: None, html })
            .await
            .context("Session stopped before the injection")?;
    }

    if let Some(settings_path) = update_settings {
        let settings: Settings = serde_json::from_str(&read_file(settings_path)?)
            .with_context(|| format!("'{}' is not a settings record", settings_path.display()))?;
        db.save_settings(&settings).await?;

        let (reply, response) = oneshot::channel();
        tx.send(HostEvent::Message {
            message: ControlMessage::UpdateSettings { settings },
            reply,
        })
        .await
        .context("Session stopped before the settings update")?;
        let response = response.await.context("Session dropped the settings reply")?;
        tracing::info!(success = response.success, "Settings pushed to session");
    }

    drop(tx);
    let doc = task.await.context("Session task failed")?;
    Ok(doc.to_html())
}

fn read_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read '{}'", path.display()))
}
