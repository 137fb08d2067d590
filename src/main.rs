use anyhow::Context;
use delve::cli::init::{self, InitConfig, InitResult};
use delve::cli::output::Output;
use delve::cli::{Cli, Commands};
use delve::types::TranscriptEntry;
use delve::utils::toml_config::{DelveConfig, LogFormat, LoggingConfig};
use delve::workflows::{ResearchEngine, Session, SubmitOutcome};
use std::path::Path;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse_args();
    let output = if cli.no_color {
        Output::no_color()
    } else {
        Output::new()
    };

    match cli.command {
        Commands::Init {
            path,
            force,
            provider,
        } => {
            init_tracing(&LoggingConfig::default(), cli.verbose);
            let options = InitConfig {
                path,
                force,
                provider,
            };
            if let InitResult::Error(e) = init::run(options, &output) {
                anyhow::bail!(e);
            }
        }
        Commands::Config { full, validate } => {
            let config = load_config(&cli.config, cli.verbose, &output)?;
            show_config(&config, full, validate, &output)?;
        }
        Commands::Show { session_id } => {
            let config = load_config(&cli.config, cli.verbose, &output)?;
            let engine = ResearchEngine::from_config(&config)?;
            match session_id {
                Some(id) => print_session(&engine.session(&id).await?, &output),
                None => {
                    output.header("Sessions");
                    for id in engine.store().list().await? {
                        output.list_item(&id);
                    }
                }
            }
        }
        Commands::Research { query } => {
            let config = load_config(&cli.config, cli.verbose, &output)?;
            let engine = ResearchEngine::from_config(&config)?;
            print_outcome(engine.submit(&query.join(" ")).await, &output)?;
        }
        Commands::Reply {
            session_id,
            message,
        } => {
            let config = load_config(&cli.config, cli.verbose, &output)?;
            let engine = ResearchEngine::from_config(&config)?;
            print_outcome(engine.reply(&session_id, &message.join(" ")).await, &output)?;
        }
        Commands::Resume { session_id } => {
            let config = load_config(&cli.config, cli.verbose, &output)?;
            let engine = ResearchEngine::from_config(&config)?;
            print_outcome(engine.resume(&session_id).await, &output)?;
        }
    }

    Ok(())
}

/// Load `delve.toml` and install the subscriber it configures.
fn load_config(path: &Path, verbose: bool, output: &Output) -> anyhow::Result<DelveConfig> {
    let config = DelveConfig::load(path).map_err(|e| {
        output.error(&e.to_string());
        output.hint("Run `delve init` to create a configuration file");
        e
    })?;
    init_tracing(&config.logging, verbose);
    Ok(config)
}

/// `RUST_LOG` wins; otherwise `--verbose` or the configured level.
fn init_tracing(logging: &LoggingConfig, verbose: bool) {
    let fallback = if verbose {
        "debug".to_string()
    } else {
        logging.level.clone()
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    let registry = tracing_subscriber::registry().with(filter);
    match logging.format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init(),
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init(),
    }
}

fn print_outcome(
    outcome: delve::types::Result<SubmitOutcome>,
    output: &Output,
) -> anyhow::Result<()> {
    match outcome {
        Ok(SubmitOutcome::Report { session_id, report }) => {
            output.report(&report);
            output.kv("session", &session_id);
            output.hint(&format!(
                "Ask a follow-up with: delve reply {} \"...\"",
                session_id
            ));
            Ok(())
        }
        Ok(SubmitOutcome::Clarification {
            session_id,
            question,
        }) => {
            output.question(&question);
            output.hint("Answer with:");
            output.command(&format!("delve reply {} \"<your answer>\"", session_id));
            Ok(())
        }
        Err(e) => {
            output.error(&e.to_string());
            Err(e).context("research session did not complete")
        }
    }
}

fn print_session(session: &Session, output: &Output) {
    output.header("Session");
    output.kv("id", &session.id);
    output.stage(session.stage);
    output.kv("created", &session.created_at.to_rfc3339());
    output.kv("updated", &session.updated_at.to_rfc3339());
    if let Some(stage) = session.failed_stage {
        output.kv("failed at", &stage.to_string());
    }
    if let Some(error) = &session.error {
        output.kv("error", error);
    }

    output.header("Conversation");
    for entry in &session.conversation {
        match entry {
            TranscriptEntry::UserTurn { content } => output.list_item(&format!("user: {}", content)),
            TranscriptEntry::ModelDecision { content } => {
                output.list_item(&format!("model: {}", content))
            }
            _ => {}
        }
    }

    if let Some(brief) = &session.research_brief {
        output.header("Research brief");
        output.info(brief);
    }

    if !session.tasks.is_empty() {
        output.header("Research tasks");
        for task in &session.tasks {
            output.task(task.status, &task.topic);
        }
    }

    if let Some(question) = &session.pending_question {
        output.question(question);
    }
    if let Some(report) = &session.final_report {
        output.header("Report");
        output.report(report);
    }
}

fn show_config(
    config: &DelveConfig,
    full: bool,
    validate: bool,
    output: &Output,
) -> anyhow::Result<()> {
    if validate {
        let warnings = config.validate_with_warnings()?;
        if warnings.is_empty() {
            output.success("Configuration is valid");
        } else {
            for warning in warnings {
                output.warning(&warning.to_string());
            }
        }
    }

    if full {
        let rendered = toml::to_string_pretty(config).context("failed to render configuration")?;
        println!("{}", rendered);
        return Ok(());
    }

    output.header("Configuration");
    output.kv("search", &format!("{:?}", config.search.provider).to_lowercase());
    output.kv("checkpoints", &config.checkpoint.dir.display().to_string());
    output.kv(
        "supervisor rounds",
        &config.research.max_researcher_iterations.to_string(),
    );
    output.kv(
        "researcher tool calls",
        &config.research.max_react_tool_calls.to_string(),
    );
    output.kv(
        "concurrent researchers",
        &config.research.max_concurrent_research_units.to_string(),
    );

    output.header("Models");
    let mut models: Vec<_> = config.models.iter().collect();
    models.sort_by(|a, b| a.0.cmp(b.0));
    for (name, model) in models {
        output.list_item(&format!("{}: {} via {}", name, model.model, model.provider));
    }
    Ok(())
}
