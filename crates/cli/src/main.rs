use anyhow::Context;
use clap::Parser;
use serde_json::{Map, Value};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use finadvisor_core::config::Settings;
use finadvisor_core::domain::advisory::AdvisoryInput;
use finadvisor_core::domain::contract::{
    FIELD_CURRENT_INVESTMENTS, FIELD_EXPENSES, FIELD_INCOME, FIELD_INVESTMENT_GOALS,
    FIELD_RISK_TOLERANCE,
};
use finadvisor_core::flow::{AdvisoryError, AdvisoryFlow};
use finadvisor_core::llm::anthropic::AnthropicClient;
use finadvisor_core::prompt;

const EXIT_INVALID_INPUT: u8 = 2;

#[derive(Debug, Parser)]
#[command(name = "finadvisor", about = "Ask the model for investment suggestions")]
struct Args {
    /// Read the raw advisory input from a JSON file instead of flags.
    #[arg(long, conflicts_with_all = ["income", "expenses", "goals", "risk", "current"])]
    input: Option<PathBuf>,

    /// Monthly income.
    #[arg(long)]
    income: Option<String>,

    /// Monthly expenses.
    #[arg(long)]
    expenses: Option<String>,

    /// Investment goals (at least 10 characters).
    #[arg(long)]
    goals: Option<String>,

    /// low, medium or high. Defaults to medium.
    #[arg(long)]
    risk: Option<String>,

    /// Current investments, if you want to disclose them.
    #[arg(long)]
    current: Option<String>,

    /// Validate and print the rendered prompt without calling the model.
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    dotenvy::dotenv().ok();

    let settings = Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();
    let raw = raw_input(&args)?;

    if args.dry_run {
        return Ok(match AdvisoryInput::validate(&raw) {
            Ok(input) => {
                println!("{}", prompt::render(&input));
                ExitCode::SUCCESS
            }
            Err(err) => {
                for violation in err.violations() {
                    eprintln!("{violation}");
                }
                ExitCode::from(EXIT_INVALID_INPUT)
            }
        });
    }

    let client = AnthropicClient::from_settings(&settings)?;
    let flow = AdvisoryFlow::new(Arc::new(client));
    let request_id = uuid::Uuid::new_v4();

    match flow.run(request_id, &raw).await {
        Ok(output) => {
            println!("{}", serde_json::to_string_pretty(&output)?);
            Ok(ExitCode::SUCCESS)
        }
        Err(AdvisoryError::InvalidInput(violations)) => {
            for violation in &violations {
                eprintln!("{violation}");
            }
            Ok(ExitCode::from(EXIT_INVALID_INPUT))
        }
        Err(err) => {
            let err = anyhow::Error::new(err).context(format!("advisory request {request_id} failed"));
            sentry_anyhow::capture_anyhow(&err);
            eprintln!("{err:#}");
            Ok(ExitCode::FAILURE)
        }
    }
}

/// Builds the untyped record the flow validates. Flags are passed through as strings so
/// every check happens in one place.
fn raw_input(args: &Args) -> anyhow::Result<Value> {
    if let Some(path) = &args.input {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        return serde_json::from_str(&text)
            .with_context(|| format!("{} is not valid JSON", path.display()));
    }

    let mut obj = Map::new();
    let fields = [
        (FIELD_INCOME, &args.income),
        (FIELD_EXPENSES, &args.expenses),
        (FIELD_INVESTMENT_GOALS, &args.goals),
        (FIELD_RISK_TOLERANCE, &args.risk),
        (FIELD_CURRENT_INVESTMENTS, &args.current),
    ];
    for (field, value) in fields {
        if let Some(value) = value {
            obj.insert(field.to_string(), Value::String(value.clone()));
        }
    }
    Ok(Value::Object(obj))
}

fn init_sentry(settings: &Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
