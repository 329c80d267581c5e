//! `cardsmith`: turn a free-text request into a reviewed Trello card.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Result, bail};
use clap::{Parser, Subcommand};

use cardsmith::agents::{CallSettings, DrafterAgent, PlannerAgent};
use cardsmith::core::evaluator::Evaluator;
use cardsmith::exit_codes;
use cardsmith::io::commit::{Committer, DryRunCommitter, TrelloCommitter};
use cardsmith::io::config::{
    AppConfig, BackendKind, DEFAULT_CONFIG_PATH, ModelConfig, gemini_credentials_from_env,
    load_config, trello_credentials_from_env, write_config,
};
use cardsmith::io::executor::{Backend, CodexExecutor};
use cardsmith::io::gemini::GeminiExecutor;
use cardsmith::io::run_log::{RunLog, generate_run_id};
use cardsmith::io::search::TrelloSearch;
use cardsmith::io::trello::TrelloClient;
use cardsmith::logging;
use cardsmith::workflow::{Collaborators, WorkflowConfig, WorkflowEvent, run_workflow};

#[derive(Parser)]
#[command(
    name = "cardsmith",
    version,
    about = "Plan, draft, review and file a Trello card from a request"
)]
struct Cli {
    /// Path to the config file.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write a default config file.
    Init {
        /// Overwrite an existing config.
        #[arg(short, long)]
        force: bool,
    },
    /// Run the workflow for one request.
    Run {
        /// The request, e.g. "Fix the login page crashing on iOS".
        request: String,
        /// Report the card that would be written without calling Trello.
        #[arg(long)]
        dry_run: bool,
        /// Print the terminal workflow state as JSON.
        #[arg(long)]
        json: bool,
    },
    /// List the boards visible to the configured token.
    Boards,
    /// List the lists of a board (to find `trello.list_id`).
    Lists { board_id: String },
}

fn main() {
    dotenv::dotenv().ok();
    logging::init();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{err:#}");
            std::process::exit(exit_codes::INVALID);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Init { force } => cmd_init(&cli.config, force),
        Command::Run {
            request,
            dry_run,
            json,
        } => cmd_run(&cli.config, &request, dry_run, json),
        Command::Boards => cmd_boards(&cli.config),
        Command::Lists { board_id } => cmd_lists(&cli.config, &board_id),
    }
}

fn cmd_init(config_path: &Path, force: bool) -> Result<i32> {
    if config_path.exists() && !force {
        bail!(
            "{} already exists (use --force to overwrite)",
            config_path.display()
        );
    }
    write_config(config_path, &AppConfig::default())?;
    println!("wrote {}", config_path.display());
    Ok(exit_codes::OK)
}

fn cmd_run(config_path: &Path, request: &str, dry_run: bool, json: bool) -> Result<i32> {
    if request.trim().is_empty() {
        bail!("request must not be empty");
    }
    let cfg = load_config(config_path)?;
    let settings = CallSettings {
        timeout: Duration::from_secs(cfg.model.timeout_secs),
        output_limit_bytes: cfg.model.output_limit_bytes,
    };

    let mut planner = PlannerAgent::new(build_backend(&cfg.model)?, settings);
    if cfg.search_enabled {
        let search = TrelloSearch::new(
            trello_client(&cfg)?,
            cfg.trello.board_id.clone(),
            cfg.trello.search_limit,
            cfg.trello.description_preview_chars,
        );
        planner = planner.with_search(Box::new(search), cfg.model.max_tool_calls);
    }
    let drafter = DrafterAgent::new(build_backend(&cfg.model)?, settings)
        .with_categories(cfg.evaluator.allowed_categories.clone())
        .with_updates(cfg.updates_enabled());
    let evaluator = Evaluator::new(&cfg.evaluator.settings());
    let committer: Box<dyn Committer> = if dry_run {
        let list_id = cfg.require_list_id().unwrap_or("(trello.list_id unset)");
        Box::new(DryRunCommitter::new(list_id))
    } else {
        Box::new(TrelloCommitter::new(
            trello_client(&cfg)?,
            cfg.require_list_id()?,
        ))
    };

    let run_log = RunLog::create(&cfg.runs_dir(), &generate_run_id())?;
    if !json {
        println!("run_id={}", run_log.run_id());
    }
    let run = run_workflow(
        request,
        &Collaborators {
            planner: &planner,
            drafter: &drafter,
            evaluator: &evaluator,
            committer: committer.as_ref(),
        },
        &WorkflowConfig {
            max_retries: cfg.max_retries,
        },
        &run_log,
        |event| {
            if !json {
                println!("{}", describe_event(event));
            }
        },
    )?;

    if json {
        println!("{}", serde_json::to_string_pretty(&run.state)?);
    } else {
        println!("result={}", run.final_result());
        println!("artifacts={}", run_log.dir().display());
    }
    Ok(exit_codes::for_outcome(run.outcome()))
}

fn cmd_boards(config_path: &Path) -> Result<i32> {
    let cfg = load_config(config_path)?;
    for board in trello_client(&cfg)?.boards()? {
        println!("{}\t{}", board.id, board.name);
    }
    Ok(exit_codes::OK)
}

fn cmd_lists(config_path: &Path, board_id: &str) -> Result<i32> {
    let cfg = load_config(config_path)?;
    for list in trello_client(&cfg)?.lists(board_id)? {
        println!("{}\t{}", list.id, list.name);
    }
    Ok(exit_codes::OK)
}

fn build_backend(model: &ModelConfig) -> Result<Backend> {
    Ok(match model.backend {
        BackendKind::Codex => Backend::Codex(CodexExecutor {
            model: model.model.clone(),
        }),
        BackendKind::Gemini => Backend::Gemini(GeminiExecutor::new(
            &model.api_base,
            model.model.as_deref(),
            gemini_credentials_from_env()?,
        )),
    })
}

fn trello_client(cfg: &AppConfig) -> Result<TrelloClient> {
    TrelloClient::new(
        &cfg.trello.api_base,
        trello_credentials_from_env()?,
        Duration::from_secs(cfg.trello.timeout_secs),
    )
}

/// One `key=value` progress line per event.
fn describe_event(event: &WorkflowEvent) -> String {
    match event {
        WorkflowEvent::PlanReady { plan } => format!("plan steps={}", plan.steps.len()),
        WorkflowEvent::PlanFailed { error } => format!("plan failed error={error}"),
        WorkflowEvent::DraftReady { attempt, draft } => {
            let action = if draft.existing_id.is_some() {
                "update"
            } else {
                "create"
            };
            format!(
                "draft attempt={attempt} action={action} name={:?}",
                draft.card_name()
            )
        }
        WorkflowEvent::DraftFailed { attempt, error } => {
            format!("draft failed attempt={attempt} error={error}")
        }
        WorkflowEvent::Evaluated {
            attempt,
            evaluation,
        } => {
            if evaluation.is_approved() {
                return format!("evaluate attempt={attempt} decision=approve");
            }
            match evaluation.feedback() {
                Some(critique) => {
                    format!("evaluate attempt={attempt} decision=reject critique={critique:?}")
                }
                None => format!("evaluate attempt={attempt} decision=reject"),
            }
        }
        WorkflowEvent::Committed {
            action, card_id, ..
        } => format!(
            "commit action={action} card_id={}",
            card_id.as_deref().unwrap_or("-")
        ),
        WorkflowEvent::CommitFailed { error } => format!("commit failed error={error}"),
        WorkflowEvent::Finished { phase, outcome, .. } => match outcome {
            Some(outcome) => format!("finished phase={phase} outcome={outcome:?}"),
            None => format!("finished phase={phase}"),
        },
    }
}
