//! hr-dispatch - HR task dispatch service
//!
//! `serve` runs the HTTP surface over a registry built from configuration,
//! `payroll` computes a single payslip offline, `config` validates the file.

use clap::{Parser, Subcommand};
use hr_dispatch::config::{ActivitySinkKind, DispatchConfig};
use hr_dispatch::handler::{
    ActivityLogger, ActivitySink, JsonLinesActivitySink, TracingActivitySink,
};
use hr_dispatch::handlers::{AssistantHandler, PayrollHandler};
use hr_dispatch::llm::provider::LlmProvider;
use hr_dispatch::llm::providers::OpenAiProvider;
use hr_dispatch::observability::init_default_logging;
use hr_dispatch::payroll::{
    validate_payroll, PayrollCalculator, PayrollInput, StatutoryRates, MAX_MONTHLY_AMOUNT,
};
use hr_dispatch::routing::LlmRoutingOracle;
use hr_dispatch::{server, HandlerRegistry};
use rust_decimal::Decimal;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use tokio::signal;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

const DEFAULT_CONFIG_PATHS: [&str; 2] = ["dispatch.toml", "config/dispatch.toml"];

/// HR task dispatch service
#[derive(Parser)]
#[command(name = "hr-dispatch")]
#[command(about = "HR task dispatch: handler registry, LLM routing and statutory payroll")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE", env = "HR_DISPATCH_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP surface
    Serve,
    /// Compute and validate one payroll, printed as JSON
    Payroll {
        /// Monthly basic salary
        #[arg(long, value_parser = parse_amount)]
        basic: Decimal,
        /// Monthly allowances
        #[arg(long, default_value = "0", value_parser = parse_amount)]
        allowances: Decimal,
        /// Monthly voluntary deductions
        #[arg(long, default_value = "0", value_parser = parse_amount)]
        deductions: Decimal,
        /// Opt in to Tabung Haji savings
        #[arg(long)]
        tabung_haji: bool,
        /// State or territory for the zakat rate
        #[arg(long)]
        region: Option<String>,
    },
    /// Validate configuration
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_default_logging();

    let result = match cli.command {
        Commands::Serve => match load_configuration(cli.config.as_deref()) {
            Ok(config) => run_server(config).await,
            Err(e) => Err(e),
        },
        Commands::Payroll {
            basic,
            allowances,
            deductions,
            tabung_haji,
            region,
        } => {
            let mut input = PayrollInput::new(basic)
                .with_allowances(allowances)
                .with_deductions(deductions)
                .with_tabung_haji(tabung_haji);
            if let Some(region) = region {
                input = input.with_region(region);
            }
            handle_payroll_command(cli.config.as_deref(), &input)
        }
        Commands::Config { show } => match load_configuration(cli.config.as_deref()) {
            Ok(config) => handle_config_command(&config, show),
            Err(e) => Err(e),
        },
    };

    if let Err(e) = result {
        error!("Command failed: {}", e);
        process::exit(1);
    }
}

fn parse_amount(text: &str) -> Result<Decimal, String> {
    let amount = text
        .trim()
        .parse::<Decimal>()
        .map_err(|e| format!("not a valid amount: {e}"))?;
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err("amount must not be negative".to_string());
    }
    if amount > MAX_MONTHLY_AMOUNT {
        return Err(format!("amount exceeds the maximum of {MAX_MONTHLY_AMOUNT}"));
    }
    Ok(amount)
}

fn find_config(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    DEFAULT_CONFIG_PATHS
        .iter()
        .map(PathBuf::from)
        .find(|path| path.exists())
}

fn load_configuration(
    config_path: Option<&Path>,
) -> Result<DispatchConfig, Box<dyn std::error::Error>> {
    let path = find_config(config_path).ok_or(
        "No configuration file found. Provide one with -c/--config or create dispatch.toml",
    )?;
    info!("Loading configuration from: {}", path.display());
    Ok(DispatchConfig::load_from_file(&path)?)
}

/// Build the activity sink and its background writer
fn build_activity_logger(config: &DispatchConfig) -> (ActivityLogger, Option<JoinHandle<()>>) {
    let section = &config.service.activity_log;
    let sink: Arc<dyn ActivitySink> = match (section.sink, &section.path) {
        (ActivitySinkKind::Disabled, _) => return (ActivityLogger::disabled(), None),
        (ActivitySinkKind::JsonLines, Some(path)) => Arc::new(JsonLinesActivitySink::new(path)),
        (ActivitySinkKind::JsonLines, None) | (ActivitySinkKind::Tracing, _) => {
            Arc::new(TracingActivitySink)
        }
    };

    let (logger, handle) = ActivityLogger::spawn(sink, section.capacity);
    (logger, Some(handle))
}

/// Bootstrap: wire provider, oracle, handlers and activity log from config
fn build_registry(
    config: &DispatchConfig,
    activity: ActivityLogger,
) -> Result<HandlerRegistry, Box<dyn std::error::Error>> {
    let provider: Arc<dyn LlmProvider> = Arc::new(OpenAiProvider::new(config.openai_config()?)?);

    let mut oracle = LlmRoutingOracle::new(provider.clone(), config.routing_model())
        .with_temperature(config.routing.temperature)
        .with_max_tokens(config.routing.max_tokens);
    if let Some(prompt) = &config.routing.system_prompt {
        oracle = oracle.with_system_prompt(prompt);
    }

    let registry = HandlerRegistry::new(Arc::new(oracle), activity);
    registry.register_handler(Arc::new(PayrollHandler::new(PayrollCalculator::new(
        config.payroll.clone(),
    ))));

    if config.assistant.enabled {
        let mut assistant = AssistantHandler::new(provider, config.llm.model.clone());
        if let Some(prompt) = &config.assistant.system_prompt {
            assistant = assistant.with_system_prompt(prompt);
        }
        if let Some(temperature) = config.llm.temperature {
            assistant = assistant.with_temperature(temperature);
        }
        if let Some(max_tokens) = config.llm.max_tokens {
            assistant = assistant.with_max_tokens(max_tokens);
        }
        if let Some(kinds) = &config.assistant.kinds {
            assistant = assistant.with_kinds(kinds.clone());
        }
        registry.register_handler(Arc::new(assistant));
    } else {
        warn!("Assistant handler disabled; conversational task kinds will fail to route");
    }

    Ok(registry)
}

async fn run_server(config: DispatchConfig) -> Result<(), Box<dyn std::error::Error>> {
    info!(
        service_id = %config.service.id,
        version = env!("CARGO_PKG_VERSION"),
        "Starting hr-dispatch"
    );

    let addr = config.socket_addr()?;
    let (activity, writer) = build_activity_logger(&config);
    let registry = Arc::new(build_registry(&config, activity)?);
    info!(handlers = ?registry.handler_names(), "Registry ready");

    let shutdown = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for shutdown signal: {}", e);
            return;
        }
        info!("Received shutdown signal, stopping gracefully...");
    };
    server::serve(Arc::clone(&registry), addr, shutdown).await?;

    // The writer drains and exits once the last logger handle is gone
    drop(registry);
    if let Some(writer) = writer {
        if let Err(e) = writer.await {
            warn!("Activity writer ended abnormally: {}", e);
        }
    }

    info!("Shutdown complete");
    Ok(())
}

fn handle_payroll_command(
    config_path: Option<&Path>,
    input: &PayrollInput,
) -> Result<(), Box<dyn std::error::Error>> {
    let rates = match find_config(config_path) {
        Some(path) => DispatchConfig::load_from_file(&path)?.payroll,
        None => StatutoryRates::default(),
    };

    let calculator = PayrollCalculator::new(rates);
    let result = calculator.calculate(input);
    let compliance = validate_payroll(input, &result, calculator.rates());

    let output = json!({
        "input": input,
        "payroll": result,
        "compliance": compliance,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn handle_config_command(
    config: &DispatchConfig,
    show: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if show {
        println!("{}", toml::to_string_pretty(config)?);
    }

    info!("Configuration validation complete");
    Ok(())
}
