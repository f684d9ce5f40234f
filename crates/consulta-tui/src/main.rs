use std::fs::OpenOptions;
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use consulta_core::session::connection_error_text;
use consulta_core::{ChatMeta, ChatRole, Config, SendOutcome, Settings};

mod app;
mod handler;
mod tui;
mod ui;

use app::App;

#[derive(Parser)]
#[command(name = "consulta")]
#[command(about = "Chat with the UCC admissions assistant from the terminal")]
struct Cli {
    #[command(flatten)]
    overrides: Overrides,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the interactive chat (default)
    Chat,
    /// Ask one question and print the answer
    Ask {
        /// Your question
        message: String,
    },
    /// Show the effective configuration
    Config {
        /// Write the effective configuration to the config file
        #[arg(long)]
        save: bool,
    },
}

/// Command-line settings; these win over the environment and the config file.
#[derive(Args, Debug, Default)]
struct Overrides {
    /// Backend base URL (requests go to {URL}/chat/)
    #[arg(long, global = true, env = "CONSULTA_API_URL")]
    api_url: Option<String>,
    /// Give up on a request after this many milliseconds
    #[arg(long, global = true, env = "CONSULTA_TIMEOUT_MS")]
    timeout_ms: Option<u64>,
    /// Academic period filter, e.g. 2025
    #[arg(long, global = true)]
    periodo: Option<String>,
    /// Faculty filter
    #[arg(long, global = true)]
    facultad: Option<String>,
    /// Degree programme filter
    #[arg(long, global = true)]
    carrera: Option<String>,
    /// Modality filter (presencial, distancia, ...)
    #[arg(long, global = true)]
    modalidad: Option<String>,
    /// Catalog id of the degree programme
    #[arg(long, global = true)]
    carrera_id: Option<String>,
    /// Conversation id the backend keeps context under
    #[arg(long, global = true)]
    session_id: Option<String>,
    /// Backend bot profile
    #[arg(long, global = true)]
    bot_id: Option<String>,
}

impl Overrides {
    fn apply(self, settings: &mut Settings) {
        if let Some(url) = self.api_url {
            settings.api_url = url;
        }
        if let Some(ms) = self.timeout_ms {
            settings.timeout_ms = ms;
        }
        settings.meta.merge(ChatMeta {
            periodo: self.periodo,
            facultad: self.facultad,
            carrera: self.carrera,
            modalidad: self.modalidad,
            carrera_id: self.carrera_id,
        });
        if self.session_id.is_some() {
            settings.session_id = self.session_id;
        }
        if self.bot_id.is_some() {
            settings.bot_id = self.bot_id;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Commands::Chat);

    // The TUI owns the terminal, so its logs go to a file.
    match command {
        Commands::Chat => init_file_logging()?,
        _ => init_stderr_logging(),
    }

    let config = Config::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "ignoring unreadable config file");
        Config::new()
    });
    // clap already folded CONSULTA_API_URL / CONSULTA_TIMEOUT_MS into the overrides.
    let mut settings = Settings::from_config(&config);
    cli.overrides.apply(&mut settings);

    info!(api_url = %settings.api_url, timeout_ms = settings.timeout_ms, "configuration loaded");

    match command {
        Commands::Chat => run_tui(&settings).await,
        Commands::Ask { message } => ask(&settings, &message).await,
        Commands::Config { save } => show_config(&settings, save),
    }
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("consulta=info,consulta_core=info"))
}

fn init_stderr_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();
}

fn init_file_logging() -> Result<()> {
    let dir = Config::config_dir()?;
    std::fs::create_dir_all(&dir)?;
    let path = dir.join("consulta.log");
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("opening log file {}", path.display()))?;

    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(true)
        .init();
    Ok(())
}

async fn run_tui(settings: &Settings) -> Result<()> {
    let session = settings.session()?;
    let mut app = App::new(session);

    tui::install_panic_hook();
    let (mut terminal, guard) = tui::init()?;
    let mut events = tui::EventHandler::new();

    let result = async {
        while !app.should_quit {
            terminal.draw(|frame| ui::render(&mut app, frame))?;

            match events.next().await {
                Some(event) => handler::handle_event(&mut app, event),
                None => break,
            }
            app.poll_send_task().await;
        }
        Ok::<(), anyhow::Error>(())
    }
    .await;

    app.session.cancel_all();
    drop(guard);
    info!(turns = app.session.messages().len(), "chat closed");
    result
}

async fn ask(settings: &Settings, message: &str) -> Result<()> {
    let mut session = settings.session()?;

    match session.send(message).await {
        SendOutcome::Ignored => {
            eprintln!("Nothing to send: the message is empty.");
            std::process::exit(2);
        }
        SendOutcome::Failed => {
            println!("{}", connection_error_text(&session.endpoint()));
            std::process::exit(1);
        }
        SendOutcome::Answered => {}
    }

    if let Some(reply) = session
        .messages()
        .iter()
        .rev()
        .find(|m| m.role == ChatRole::Assistant)
    {
        println!("{}", reply.text);

        if !reply.sources.is_empty() {
            println!("\nFuentes:");
            for (i, source) in reply.sources.iter().enumerate() {
                println!("  [{}] {}", i + 1, source.heading());
                if let Some(locator) = source.locator() {
                    println!("      {}", locator);
                }
                if let Some(period) = source.period() {
                    println!("      Período: {}", period);
                }
            }
        }
    }

    Ok(())
}

fn show_config(settings: &Settings, save: bool) -> Result<()> {
    let config = settings.to_config();
    println!("{}", config.to_pretty_json()?);

    if save {
        let path = config.save()?;
        println!("\nSaved to {}", path.display());
    }
    Ok(())
}
