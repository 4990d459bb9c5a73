use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use dialoguer::{Confirm, Input, Select};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use mail_rules::channels::import_directory;
use mail_rules::config::AppConfig;
use mail_rules::pipeline::{ActionDispatcher, DryRunDispatcher, RuleProcessor, StoreDispatcher};
use mail_rules::rules::authoring::{
    self, ACTION_TYPES, COMBINATORS, FIELDS, READ_STATES, RuleDraft,
};
use mail_rules::rules::{Combinator, OffsetUnit, RuleEngine};
use mail_rules::store::{Database, LibSqlBackend};

#[derive(Parser)]
#[command(name = "mail-rules", version)]
#[command(about = "Apply user-defined rules to stored email", long_about = None)]
struct Cli {
    /// Database file (overrides MAIL_RULES_DB_PATH)
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    /// Rule document (overrides MAIL_RULES_RULES_PATH)
    #[arg(long, global = true)]
    rules: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Validate the rule document and list its rules
    Check,
    /// Import a directory of .eml files into the database
    Import {
        /// Directory holding the exported messages
        dir: PathBuf,
    },
    /// Evaluate every stored message and apply the matched actions
    Run {
        /// Log and print the actions without applying them
        #[arg(long)]
        dry_run: bool,
    },
    /// Interactively write a new rule and append it to the rule document
    NewRule,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::from_env().context("invalid configuration")?;
    if let Some(db) = cli.db {
        config.db_path = db;
    }
    if let Some(rules) = cli.rules {
        config.rules_path = rules;
    }

    let _log_guard = init_tracing(&config);

    let result = match cli.command {
        Command::Check => check(&config),
        Command::Import { dir } => import(&config, dir).await,
        Command::Run { dry_run } => run(&config, dry_run).await,
        Command::NewRule => new_rule(&config),
    };

    if let Err(e) = &result {
        tracing::error!(error = %format!("{e:#}"), "Command failed");
    }
    result
}

/// Stderr logging, plus a daily-rolling file when a log directory is configured.
fn init_tracing(config: &AppConfig) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let stderr = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);

    match &config.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "mail-rules.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(filter)
                .with(stderr)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(writer),
                )
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry().with(filter).with(stderr).init();
            None
        }
    }
}

async fn open_database(config: &AppConfig) -> anyhow::Result<Arc<dyn Database>> {
    let backend = LibSqlBackend::new_local(&config.db_path)
        .await
        .with_context(|| format!("failed to open database at {}", config.db_path.display()))?;
    Ok(Arc::new(backend))
}

fn load_engine(config: &AppConfig) -> anyhow::Result<RuleEngine> {
    RuleEngine::from_path(&config.rules_path)
        .with_context(|| format!("failed to load rules from {}", config.rules_path.display()))
}

fn check(config: &AppConfig) -> anyhow::Result<()> {
    let engine = load_engine(config)?;
    println!(
        "{}: {} rule(s) OK",
        config.rules_path.display(),
        engine.rules().len()
    );
    for rule in engine.rules() {
        println!("- {} [{}]", rule.name, rule.combinator.as_str());
        if let Some(description) = &rule.description {
            println!("    {description}");
        }
        for condition in &rule.conditions {
            println!("    if {condition}");
        }
        for action in &rule.actions {
            println!("    then {action}");
        }
    }
    Ok(())
}

async fn import(config: &AppConfig, dir: PathBuf) -> anyhow::Result<()> {
    let db = open_database(config).await?;
    let report = import_directory(&dir, db.as_ref())
        .await
        .with_context(|| format!("failed to import {}", dir.display()))?;
    println!(
        "{} imported, {} already stored, {} failed",
        report.imported, report.duplicates, report.failed
    );
    Ok(())
}

async fn run(config: &AppConfig, dry_run: bool) -> anyhow::Result<()> {
    let engine = Arc::new(load_engine(config)?);
    let db = open_database(config).await?;

    let dry_run_dispatcher = dry_run.then(|| Arc::new(DryRunDispatcher::new()));
    let dispatcher: Arc<dyn ActionDispatcher> = match &dry_run_dispatcher {
        Some(d) => d.clone() as Arc<dyn ActionDispatcher>,
        None => Arc::new(StoreDispatcher::new(db.clone())),
    };

    let processor = RuleProcessor::new(engine, db, dispatcher)
        .with_max_concurrent(config.max_concurrent_messages);
    let summary = processor.run().await.context("rule run failed")?;

    if let Some(d) = dry_run_dispatcher {
        for planned in d.planned().await {
            println!("{}: {}", planned.message_id, planned.action);
        }
    }
    println!("{summary}");
    Ok(())
}

fn new_rule(config: &AppConfig) -> anyhow::Result<()> {
    loop {
        let draft = prompt_rule()?;
        println!("{}", serde_json::to_string_pretty(&draft)?);

        if Confirm::new()
            .with_prompt("Save this rule?")
            .default(true)
            .interact()?
        {
            let count = authoring::save_rule(&config.rules_path, &draft).with_context(|| {
                format!("rule not saved to {}", config.rules_path.display())
            })?;
            println!(
                "Saved '{}' to {} ({count} rule(s))",
                draft.name,
                config.rules_path.display()
            );
        } else {
            tracing::info!(rule = %draft.name, "Rule discarded");
        }

        if !Confirm::new()
            .with_prompt("Add another rule?")
            .default(false)
            .interact()?
        {
            return Ok(());
        }
    }
}

fn prompt_rule() -> anyhow::Result<RuleDraft> {
    let name: String = Input::new().with_prompt("Rule name").interact_text()?;
    let description: String = Input::new()
        .with_prompt("Description (optional)")
        .allow_empty(true)
        .interact_text()?;
    let combinator = match select("Rule type", COMBINATORS)? {
        "all" => Combinator::All,
        _ => Combinator::Any,
    };

    let mut draft = RuleDraft::new(name.trim(), combinator);
    draft.description = Some(description.trim().to_string()).filter(|d| !d.is_empty());

    loop {
        let field = select("Field", FIELDS)?;
        let predicate = select("Predicate", authoring::predicates_for(field))?;
        let value = if field == "date received" {
            let amount: u32 = Input::new()
                .with_prompt("How many days or months")
                .interact_text()?;
            let unit = match select("Unit", &["D", "M"])? {
                "M" => OffsetUnit::Months,
                _ => OffsetUnit::Days,
            };
            authoring::date_value(amount, unit)
        } else {
            Input::<String>::new().with_prompt("Value").interact_text()?
        };
        draft = draft.condition(field, predicate, value);

        if !Confirm::new()
            .with_prompt("Add another condition?")
            .default(false)
            .interact()?
        {
            break;
        }
    }

    loop {
        let kind = select("Action", ACTION_TYPES)?;
        let value = if kind == "mark" {
            select("Mark as", READ_STATES)?.to_string()
        } else {
            Input::<String>::new()
                .with_prompt("Label to move to")
                .interact_text()?
        };
        draft = draft.action(kind, value);

        if !Confirm::new()
            .with_prompt("Add another action?")
            .default(false)
            .interact()?
        {
            break;
        }
    }

    Ok(draft)
}

fn select(prompt: &str, items: &[&'static str]) -> anyhow::Result<&'static str> {
    let index = Select::new()
        .with_prompt(prompt)
        .items(items)
        .default(0)
        .interact()?;
    Ok(items[index])
}
