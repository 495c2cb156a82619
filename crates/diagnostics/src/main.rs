//! `plantwatch-diagnose` -- run one diagnostic request or a fleet scan.
//!
//! ```text
//! plantwatch-diagnose diagnose --machine 4 my printer is failing
//! plantwatch-diagnose diagnose "why is machine 4 making noise?"
//! plantwatch-diagnose fleet
//! ```
//!
//! Add `--json` to print the full result as JSON.
//!
//! # Environment variables
//!
//! | Variable                 | Required | Default                          |
//! |--------------------------|----------|----------------------------------|
//! | `DATABASE_URL`           | yes      | --                               |
//! | `RETRIEVAL_URL`          | no       | `http://localhost:8001`          |
//! | `RETRIEVAL_COLLECTION`   | no       | `technical_manuals`              |
//! | `EMBEDDING_URL`          | no       | `http://localhost:8080/v1`       |
//! | `LLM_API_URL`            | no       | `https://api.groq.com/openai/v1` |
//! | `LLM_API_KEY`            | no       | falls back to `GROQ_API_KEY`     |
//! | `THERMAL_FLOOR_K` etc.   | no       | built-in thresholds              |

use std::sync::Arc;

use clap::error::ErrorKind;
use clap::{CommandFactory, Parser, Subcommand};
use plantwatch_clients::{ChatCompletionClient, GenerationConfig, RetrievalClient, RetrievalConfig};
use plantwatch_core::intent::mentioned_machine_id;
use plantwatch_core::thresholds::ThresholdConfig;
use plantwatch_core::types::MachineId;
use plantwatch_db::PgTelemetryStore;
use plantwatch_diagnostics::{
    AnomalyClassifier, DiagnosticOrchestrator, DiagnosticResult, FleetScanner, OrchestratorConfig,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "plantwatch-diagnose")]
#[command(about = "Answer operator questions about machine health", long_about = None)]
#[command(version)]
struct Cli {
    /// Print the full result as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify every registered machine and summarize the flagged ones
    Fleet,

    /// Route one question through the diagnostic plan
    Diagnose {
        /// Machine to diagnose; taken from the question ("machine 4") when omitted
        #[arg(long, short)]
        machine: Option<MachineId>,

        /// The operator's question
        #[arg(required = true, num_args = 1..)]
        question: Vec<String>,
    },
}

/// Question text plus the machine it is about, explicit or mentioned.
fn resolve_target(
    machine: Option<MachineId>,
    words: &[String],
) -> Result<(MachineId, String), String> {
    let question = words.join(" ");
    if question.trim().is_empty() {
        return Err("the question must not be empty".into());
    }
    match machine.or_else(|| mentioned_machine_id(&question)) {
        Some(machine_id) => Ok((machine_id, question)),
        None => Err(
            "no machine given: pass --machine <ID> or mention \"machine N\" in the question".into(),
        ),
    }
}

fn print_result(result: &DiagnosticResult) {
    println!("Request:  {}", result.request_id);
    println!("Machine:  {}", result.machine_id);
    println!("Intent:   {}", result.intent.as_str());
    println!("Status:   {:?}", result.status);
    println!("Steps:    {}", result.steps_executed.join(" -> "));
    if let Some(query) = &result.retrieval_query {
        println!("Lookup:   {query}");
    }
    println!();
    println!("{}", result.answer);
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "plantwatch_diagnostics=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let json = cli.json;
    let target = match &cli.command {
        Commands::Fleet => None,
        Commands::Diagnose { machine, question } => {
            Some(resolve_target(*machine, question).unwrap_or_else(|msg| {
                Cli::command()
                    .error(ErrorKind::MissingRequiredArgument, msg)
                    .exit()
            }))
        }
    };

    let database_url = std::env::var("DATABASE_URL").unwrap_or_else(|_| {
        tracing::error!("DATABASE_URL environment variable is required");
        std::process::exit(1);
    });

    let thresholds = ThresholdConfig::from_env().unwrap_or_else(|e| {
        tracing::error!(error = %e, "Invalid threshold configuration");
        std::process::exit(1);
    });

    let pool = plantwatch_db::create_pool(&database_url)
        .await
        .unwrap_or_else(|e| {
            tracing::error!(error = %e, "Failed to connect to database");
            std::process::exit(1);
        });
    if let Err(e) = plantwatch_db::health_check(&pool).await {
        tracing::error!(error = %e, "Database health check failed");
        std::process::exit(1);
    }

    let store = Arc::new(PgTelemetryStore::new(pool));

    match target {
        None => {
            let classifier = AnomalyClassifier::new(store.clone(), thresholds);
            let scanner = FleetScanner::new(store, classifier);
            let report = scanner.scan().await.unwrap_or_else(|e| {
                tracing::error!(error = %e, "Fleet scan failed");
                std::process::exit(1);
            });
            if json {
                println!("{}", serde_json::to_string_pretty(&report).unwrap_or_default());
            } else {
                print!("{}", report.render_summary());
            }
        }
        Some((machine_id, question)) => {
            let orchestrator = build_orchestrator(store, thresholds);
            match orchestrator.diagnose(machine_id, &question).await {
                Ok(result) if json => {
                    println!("{}", serde_json::to_string_pretty(&result).unwrap_or_default());
                }
                Ok(result) => print_result(&result),
                Err(e) => {
                    tracing::error!(machine_id, error = %e, "Diagnosis failed");
                    std::process::exit(1);
                }
            }
        }
    }
}

fn exit_on_config_error<T>(what: &str, e: plantwatch_core::error::CoreError) -> T {
    tracing::error!(error = %e, "Invalid {} configuration", what);
    std::process::exit(1);
}

fn build_orchestrator(
    store: Arc<PgTelemetryStore>,
    thresholds: ThresholdConfig,
) -> DiagnosticOrchestrator {
    let retrieval =
        RetrievalConfig::from_env().unwrap_or_else(|e| exit_on_config_error("retrieval", e));
    let generation =
        GenerationConfig::from_env().unwrap_or_else(|e| exit_on_config_error("generation", e));
    let orchestration =
        OrchestratorConfig::from_env().unwrap_or_else(|e| exit_on_config_error("timeout", e));

    if generation.api_key.is_none() {
        tracing::warn!("No LLM API key configured; answers will use the fallback format");
    }

    let retriever = RetrievalClient::new(retrieval).unwrap_or_else(|e| {
        tracing::error!(error = %e, "Failed to build retrieval client");
        std::process::exit(1);
    });
    let generator = ChatCompletionClient::new(generation).unwrap_or_else(|e| {
        tracing::error!(error = %e, "Failed to build chat-completion client");
        std::process::exit(1);
    });

    DiagnosticOrchestrator::new(
        store,
        Arc::new(retriever),
        Arc::new(generator),
        thresholds,
        orchestration,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn diagnose_with_explicit_machine() {
        let cli = Cli::try_parse_from([
            "plantwatch-diagnose",
            "diagnose",
            "-m",
            "3",
            "fan",
            "is",
            "noisy",
        ])
        .unwrap();
        assert!(!cli.json);
        let Commands::Diagnose { machine, question } = cli.command else {
            panic!("expected diagnose");
        };
        assert_eq!(
            resolve_target(machine, &question).unwrap(),
            (3, "fan is noisy".to_string())
        );
    }

    #[test]
    fn machine_taken_from_question() {
        let cli =
            Cli::try_parse_from(["plantwatch-diagnose", "--json", "diagnose", "Machine 7 is failing"])
                .unwrap();
        assert!(cli.json);
        let Commands::Diagnose { machine, question } = cli.command else {
            panic!("expected diagnose");
        };
        assert_eq!(resolve_target(machine, &question).unwrap().0, 7);
    }

    #[test]
    fn explicit_machine_wins_over_mention() {
        let (machine_id, _) =
            resolve_target(Some(2), &words(&["is", "machine", "9", "ok?"])).unwrap();
        assert_eq!(machine_id, 2);
    }

    #[test]
    fn fleet_and_bad_input() {
        let cli = Cli::try_parse_from(["plantwatch-diagnose", "fleet", "--json"]).unwrap();
        assert!(cli.json);
        assert!(matches!(cli.command, Commands::Fleet));

        assert!(Cli::try_parse_from(["plantwatch-diagnose"]).is_err());
        assert!(Cli::try_parse_from(["plantwatch-diagnose", "diagnose"]).is_err());
        assert!(
            Cli::try_parse_from(["plantwatch-diagnose", "diagnose", "-m", "abc", "q"]).is_err()
        );
        assert!(resolve_target(None, &words(&["no machine here"])).is_err());
        assert!(resolve_target(Some(1), &words(&["  "])).is_err());
    }
}
