//! `datachat`: terminal client for the database analytics assistant.
//!
//! SYSTEM CONTEXT
//! ==============
//! Thin shell over `client::QueryController`. Configuration comes from the
//! `DATACHAT_*` environment variables (see `ClientConfig::from_env`) with
//! command-line overrides on top. Progress, notices and the database guard
//! card go to stderr; final answers go to stdout.

mod render;
mod repl;

use std::future::Future;
use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use client::net::api::{Backend, HttpBackend};
use client::net::transport::TransportKind;
use client::net::types::{SendOptions, ViewMode};
use client::state::session::{FileSessionStore, SessionStore};
use client::{ClientConfig, ClientError, QueryController, SendOutcome, Timings};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{Level, warn};

use crate::render::ProgressPrinter;
use crate::repl::{HELP, ReplCommand};

const DEFAULT_SESSION_FILE: &str = ".datachat-session.json";

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error("terminal I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("query task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
    #[error("no active conversation in {}", .0.display())]
    NoConversation(PathBuf),
    #[error("backend did not stop the query: {0}")]
    StopRefused(String),
    #[error("query failed")]
    QueryFailed,
}

#[derive(Parser, Debug)]
#[command(name = "datachat", about = "Ask questions about your databases from the terminal")]
struct Cli {
    /// Backend origin; overrides DATACHAT_BASE_URL.
    #[arg(long)]
    base_url: Option<String>,

    #[arg(long, value_enum)]
    transport: Option<TransportArg>,

    #[arg(long)]
    model: Option<String>,

    #[arg(long)]
    context_window: Option<u32>,

    #[arg(long, value_enum)]
    view: Option<ViewArg>,

    /// Where the active conversation id is kept between runs.
    #[arg(long)]
    session_file: Option<PathBuf>,

    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Ask one question in the active conversation.
    Ask {
        #[arg(required = true, num_args = 1..)]
        question: Vec<String>,
        /// Skip the database availability check.
        #[arg(long, default_value_t = false)]
        force: bool,
    },
    /// Interactive session.
    Chat,
    /// Ask the backend to stop the query running in the active conversation.
    Stop,
    /// List stored conversations.
    History,
    /// Make a stored conversation active and print it.
    Open { conversation_id: String },
    /// Forget the active conversation.
    New,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum TransportArg {
    Chunked,
    Stream,
}

impl From<TransportArg> for TransportKind {
    fn from(value: TransportArg) -> Self {
        match value {
            TransportArg::Chunked => Self::Chunked,
            TransportArg::Stream => Self::Stream,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ViewArg {
    Chat,
    Dashboard,
}

impl From<ViewArg> for ViewMode {
    fn from(value: ViewArg) -> Self {
        match value {
            ViewArg::Chat => Self::Chat,
            ViewArg::Dashboard => Self::Dashboard,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let cli = Cli::parse();
    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        _ => Level::DEBUG,
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .init();

    let config = load_config(&cli)?;

    match cli.command {
        Command::Ask { question, force } => {
            let controller = QueryController::from_config(&config, Timings::default())?;
            run_ask(&controller, &question.join(" "), force).await
        }
        Command::Chat => {
            let controller = QueryController::from_config(&config, Timings::default())?;
            run_chat(&controller).await
        }
        Command::Stop => run_stop(&config).await,
        Command::History => {
            let controller = QueryController::from_config(&config, Timings::default())?;
            print_history(&controller).await
        }
        Command::Open { conversation_id } => {
            let controller = QueryController::from_config(&config, Timings::default())?;
            controller
                .open_conversation(&conversation_id)
                .await?;
            print_transcript(&controller);
            Ok(())
        }
        Command::New => {
            let controller = QueryController::from_config(&config, Timings::default())?;
            controller.new_conversation()?;
            println!("started a new conversation");
            Ok(())
        }
    }
}

fn load_config(cli: &Cli) -> Result<ClientConfig, CliError> {
    let mut config = ClientConfig::from_env()?;
    if let Some(base_url) = &cli.base_url {
        config.base_url = base_url.trim_end_matches('/').to_owned();
    }
    if let Some(transport) = cli.transport {
        config.transport = transport.into();
    }
    if let Some(model) = &cli.model {
        config.model_id = Some(model.clone());
    }
    if let Some(context_window) = cli.context_window {
        config.context_window = Some(context_window);
    }
    if let Some(view) = cli.view {
        config.view_mode = view.into();
    }
    if let Some(session_file) = &cli.session_file {
        config.session_file = Some(session_file.clone());
    }
    config
        .session_file
        .get_or_insert_with(|| PathBuf::from(DEFAULT_SESSION_FILE));
    Ok(config)
}

// =============================================================================
// ONE-SHOT COMMANDS
// =============================================================================

async fn run_ask(controller: &QueryController, question: &str, force: bool) -> Result<(), CliError> {
    resume_quietly(controller).await;
    let options = SendOptions { force_execute: force, ..SendOptions::default() };
    let task_controller = controller.clone();
    let question = question.to_owned();
    let outcome =
        run_with_progress(controller, async move { task_controller.send_with(&question, options).await }).await?;
    print_outcome(controller, outcome);
    if !force && outcome == SendOutcome::Guarded {
        eprintln!("  rerun with --force to run the query anyway");
    }
    match outcome {
        SendOutcome::Failed => Err(CliError::QueryFailed),
        _ => Ok(()),
    }
}

async fn run_stop(config: &ClientConfig) -> Result<(), CliError> {
    let path = config
        .session_file
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SESSION_FILE));
    let store = FileSessionStore::new(path);
    let Some(conversation_id) = store.load() else {
        return Err(CliError::NoConversation(store.path().to_owned()));
    };
    let backend = HttpBackend::new(&config.base_url, config.connect_timeout())?;
    let response = backend.stop_query(&conversation_id).await?;
    if !response.success {
        return Err(CliError::StopRefused(
            response
                .error
                .unwrap_or_else(|| "no reason given".to_owned()),
        ));
    }
    println!("stop requested for {conversation_id}");
    Ok(())
}

async fn print_history(controller: &QueryController) -> Result<(), CliError> {
    controller.activate_history(true).await?;
    let entries = controller.history_entries();
    if entries.is_empty() {
        println!("no conversations yet");
    }
    for entry in &entries {
        println!("{}", render::history_line(entry));
    }
    Ok(())
}

// =============================================================================
// INTERACTIVE
// =============================================================================

async fn run_chat(controller: &QueryController) -> Result<(), CliError> {
    match controller.resume().await {
        Ok(Some(conversation_id)) => {
            eprintln!("resumed conversation {conversation_id}");
            print_transcript(controller);
        }
        Ok(None) => {}
        Err(error) => warn!(%error, "chat: could not load previous conversation"),
    }
    eprintln!("type /help for commands");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stderr = tokio::io::stderr();
    loop {
        stderr.write_all(b"> ").await?;
        stderr.flush().await?;
        let Some(line) = lines.next_line().await? else {
            break;
        };

        match ReplCommand::parse(&line) {
            ReplCommand::Empty => {}
            ReplCommand::Quit => break,
            ReplCommand::Help => eprintln!("{HELP}"),
            ReplCommand::Invalid(message) => eprintln!("{message}"),
            ReplCommand::Send(text) => {
                let task_controller = controller.clone();
                let outcome =
                    run_with_progress(controller, async move { task_controller.send(&text).await }).await?;
                print_outcome(controller, outcome);
            }
            ReplCommand::Continue => {
                let task_controller = controller.clone();
                let outcome =
                    run_with_progress(controller, async move { task_controller.continue_anyway().await }).await?;
                if outcome == SendOutcome::Rejected {
                    eprintln!("no database warning to continue from");
                } else {
                    print_outcome(controller, outcome);
                }
            }
            ReplCommand::Configure => {
                controller.configure_connection();
                eprintln!("update the database connection on the backend, then ask again");
            }
            ReplCommand::Dismiss => {
                if !controller.dismiss_warning() {
                    eprintln!("no database warning to dismiss");
                }
            }
            ReplCommand::New => match controller.new_conversation() {
                Ok(()) => eprintln!("started a new conversation"),
                Err(error) => eprintln!("{error}"),
            },
            ReplCommand::History => {
                if let Err(error) = print_history(controller).await {
                    eprintln!("{error}");
                }
            }
            ReplCommand::Open(conversation_id) => match controller.open_conversation(&conversation_id).await {
                Ok(()) => print_transcript(controller),
                Err(error) => eprintln!("{error}"),
            },
            ReplCommand::Model(model_id) => {
                let label = model_id
                    .clone()
                    .unwrap_or_else(|| "backend default".to_owned());
                controller.set_model(model_id);
                eprintln!("model: {label}");
            }
            ReplCommand::View(view_mode) => {
                controller.set_view_mode(view_mode);
                eprintln!("view: {view_mode:?}");
            }
        }
    }
    Ok(())
}

// =============================================================================
// OUTPUT
// =============================================================================

/// Drive one query while echoing stage and notice changes. Ctrl-C stops it.
async fn run_with_progress<F>(controller: &QueryController, query: F) -> Result<SendOutcome, CliError>
where
    F: Future<Output = SendOutcome> + Send + 'static,
{
    let mut printer = ProgressPrinter::new();
    printer.skip_notices(&controller.snapshot());
    let mut revisions = controller.subscribe();
    let mut task = tokio::spawn(query);
    let mut stop_requested = false;

    loop {
        tokio::select! {
            joined = &mut task => {
                emit_progress(&mut printer, controller);
                return Ok(joined?);
            }
            changed = revisions.changed() => {
                if changed.is_err() {
                    return Ok(task.await?);
                }
                emit_progress(&mut printer, controller);
            }
            signal = tokio::signal::ctrl_c(), if !stop_requested => {
                signal?;
                stop_requested = true;
                eprintln!("stopping...");
                controller.stop().await;
            }
        }
    }
}

fn emit_progress(printer: &mut ProgressPrinter, controller: &QueryController) {
    for line in printer.update(&controller.snapshot()) {
        eprintln!("{line}");
    }
}

fn print_outcome(controller: &QueryController, outcome: SendOutcome) {
    let snapshot = controller.snapshot();
    match outcome {
        SendOutcome::Guarded => {
            if let Some(warning) = &snapshot.guard {
                eprintln!("{}", render::guard_card(warning));
            }
        }
        SendOutcome::Rejected => {}
        SendOutcome::Completed | SendOutcome::Failed | SendOutcome::Interrupted => {
            if let Some(turn) = snapshot.turns.last() {
                println!("{}", render::turn_text(turn));
            }
        }
    }
}

fn print_transcript(controller: &QueryController) {
    for turn in &controller.snapshot().turns {
        println!("{}", render::turn_text(turn));
    }
}

async fn resume_quietly(controller: &QueryController) {
    if let Err(error) = controller.resume().await {
        warn!(%error, "ask: could not load previous conversation");
    }
}
