//! Plan-driven diagnostic orchestrator.
//!
//! [`DiagnosticOrchestrator::diagnose`] routes the request, executes the
//! resulting plan one step at a time, and synthesizes the answer with a
//! single generator call. Collaborator failures degrade the answer instead
//! of failing the request:
//!
//! 1. Unknown machine on the sensor read ends the request as
//!    [`DiagnosisStatus::UnknownMachine`]. Nothing else runs.
//! 2. A store outage is recorded as [`SensorState::Unavailable`] and the plan
//!    continues.
//! 3. A retriever failure or timeout becomes [`ProcedureOutcome::Unavailable`].
//! 4. A generator failure or timeout switches to the fallback answer
//!    (verdicts plus the raw procedure) with [`DiagnosisStatus::Fallback`].

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use plantwatch_core::config::env_parse;
use plantwatch_core::error::CoreError;
use plantwatch_core::intent::{DiagnosticPlan, Intent, IntentRouter, PlanStep, ProcedureQuery};
use plantwatch_core::ports::{KnowledgeRetriever, RetrievedPassage, TelemetryReader, TextGenerator};
use plantwatch_core::prompt::{build_diagnostic_prompt, PromptInputs};
use plantwatch_core::report::{machine_report, verdict_details, verdict_summary};
use plantwatch_core::telemetry::Machine;
use plantwatch_core::thresholds::ThresholdConfig;
use plantwatch_core::types::MachineId;
use plantwatch_core::verdict::{Classification, FailureVerdict};
use serde::Serialize;
use uuid::Uuid;

use crate::classifier::AnomalyClassifier;

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Caller-side bounds on collaborator calls. A timeout is handled exactly
/// like any other collaborator failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorConfig {
    pub retrieval_timeout: Duration,
    pub generation_timeout: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            retrieval_timeout: Duration::from_secs(10),
            generation_timeout: Duration::from_secs(30),
        }
    }
}

impl OrchestratorConfig {
    /// | Env Var                  | Default |
    /// |--------------------------|---------|
    /// | `RETRIEVAL_TIMEOUT_SECS` | `10`    |
    /// | `LLM_TIMEOUT_SECS`       | `30`    |
    pub fn from_env() -> Result<Self, CoreError> {
        let config = Self {
            retrieval_timeout: Duration::from_secs(env_parse("RETRIEVAL_TIMEOUT_SECS", 10u64)?),
            generation_timeout: Duration::from_secs(env_parse("LLM_TIMEOUT_SECS", 30u64)?),
        };
        if config.retrieval_timeout.is_zero() || config.generation_timeout.is_zero() {
            return Err(CoreError::InvalidParameter(
                "collaborator timeouts must be at least one second".into(),
            ));
        }
        Ok(config)
    }
}

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosisStatus {
    /// The generator produced the answer.
    Answered,
    /// The generator failed; the answer is the raw findings and procedure.
    Fallback,
    /// The machine is not registered. No scan, lookup or synthesis ran.
    UnknownMachine,
}

/// Outcome of the sensor read step.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SensorState {
    NotRequested,
    Reported { report: String },
    Unavailable { reason: String },
}

/// Outcome of the procedure lookup step.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ProcedureOutcome {
    NotRequested,
    /// Top-ranked passage.
    Found { passage: RetrievedPassage },
    /// The retriever answered with nothing relevant.
    NoMatch,
    Unavailable { reason: String },
}

impl ProcedureOutcome {
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Found { passage } => Some(&passage.text),
            _ => None,
        }
    }
}

/// Everything one `diagnose` call produced. Returned, never retained.
#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticResult {
    pub request_id: Uuid,
    pub machine_id: MachineId,
    pub intent: Intent,
    pub status: DiagnosisStatus,
    pub sensor: SensorState,
    /// `None` when no scan ran or the scan could not read telemetry.
    pub classification: Option<Classification>,
    /// Why telemetry could not be classified, if that failed.
    pub scan_error: Option<String>,
    /// Query sent to the retriever, if a lookup ran.
    pub retrieval_query: Option<String>,
    pub procedure: ProcedureOutcome,
    pub answer: String,
    /// Names of the plan steps that actually ran, in order.
    pub steps_executed: Vec<&'static str>,
}

impl DiagnosticResult {
    /// Fired verdicts; empty when nominal, unscanned, or unknown.
    pub fn verdicts(&self) -> &[FailureVerdict] {
        self.classification
            .as_ref()
            .map(Classification::verdicts)
            .unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Working state for one request.
struct Execution {
    machine: Option<Machine>,
    sensor: SensorState,
    classification: Option<Classification>,
    scan_error: Option<String>,
    retrieval_query: Option<String>,
    procedure: ProcedureOutcome,
    steps_executed: Vec<&'static str>,
}

impl Execution {
    fn new() -> Self {
        Self {
            machine: None,
            sensor: SensorState::NotRequested,
            classification: None,
            scan_error: None,
            retrieval_query: None,
            procedure: ProcedureOutcome::NotRequested,
            steps_executed: Vec::new(),
        }
    }

    fn scanned(&self) -> bool {
        self.steps_executed.contains(&"scan_anomalies")
    }
}

/// Control flow after a step.
enum Flow {
    Continue,
    UnknownMachine,
}

pub struct DiagnosticOrchestrator {
    reader: Arc<dyn TelemetryReader>,
    classifier: AnomalyClassifier,
    retriever: Arc<dyn KnowledgeRetriever>,
    generator: Arc<dyn TextGenerator>,
    router: IntentRouter,
    config: OrchestratorConfig,
}

impl DiagnosticOrchestrator {
    pub fn new(
        reader: Arc<dyn TelemetryReader>,
        retriever: Arc<dyn KnowledgeRetriever>,
        generator: Arc<dyn TextGenerator>,
        thresholds: ThresholdConfig,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            classifier: AnomalyClassifier::new(Arc::clone(&reader), thresholds),
            reader,
            retriever,
            generator,
            router: IntentRouter::new(),
            config,
        }
    }

    pub fn classifier(&self) -> &AnomalyClassifier {
        &self.classifier
    }

    /// Route `request_text` and execute the resulting plan.
    pub async fn diagnose(
        &self,
        machine_id: MachineId,
        request_text: &str,
    ) -> Result<DiagnosticResult, CoreError> {
        let (intent, plan) = self.router.route(machine_id, request_text);
        self.execute(machine_id, request_text, intent, plan).await
    }

    /// Execute an explicit plan. Fails only when the plan itself is invalid.
    pub async fn execute(
        &self,
        machine_id: MachineId,
        request_text: &str,
        intent: Intent,
        plan: DiagnosticPlan,
    ) -> Result<DiagnosticResult, CoreError> {
        plan.validate()?;
        let request_id = Uuid::now_v7();
        tracing::info!(
            %request_id,
            machine_id,
            intent = intent.as_str(),
            steps = plan.len(),
            "Diagnosis started"
        );

        let mut exec = Execution::new();
        for step in plan {
            let name = step.name();
            let flow = match step {
                PlanStep::ReadSensorStatus { machine_id } => {
                    self.read_sensor_status(machine_id, &mut exec).await
                }
                PlanStep::ScanAnomalies { machine_id } => {
                    self.scan_anomalies(machine_id, &mut exec).await
                }
                PlanStep::RetrieveProcedure { query } => {
                    self.retrieve_procedure(&query, &mut exec).await;
                    Flow::Continue
                }
            };
            exec.steps_executed.push(name);

            if let Flow::UnknownMachine = flow {
                tracing::info!(%request_id, machine_id, "Unknown machine; diagnosis ended early");
                return Ok(DiagnosticResult {
                    request_id,
                    machine_id,
                    intent,
                    status: DiagnosisStatus::UnknownMachine,
                    sensor: exec.sensor,
                    classification: None,
                    scan_error: None,
                    retrieval_query: None,
                    procedure: ProcedureOutcome::NotRequested,
                    answer: format!("Machine {machine_id} is not registered in the asset registry."),
                    steps_executed: exec.steps_executed,
                });
            }
        }

        let (status, answer) = self.synthesize(request_text, &exec).await;
        tracing::info!(
            %request_id,
            machine_id,
            status = ?status,
            verdicts = exec.classification.as_ref().map_or(0, |c| c.verdicts().len()),
            "Diagnosis finished"
        );

        Ok(DiagnosticResult {
            request_id,
            machine_id,
            intent,
            status,
            sensor: exec.sensor,
            classification: exec.classification,
            scan_error: exec.scan_error,
            retrieval_query: exec.retrieval_query,
            procedure: exec.procedure,
            answer,
            steps_executed: exec.steps_executed,
        })
    }

    // -----------------------------------------------------------------------
    // Steps
    // -----------------------------------------------------------------------

    /// Registry lookup plus a classification of the current snapshot. The
    /// classification is kept so the scan step does not read twice.
    async fn read_sensor_status(&self, machine_id: MachineId, exec: &mut Execution) -> Flow {
        let machine = match self.reader.machine(machine_id).await {
            Ok(machine) => machine,
            Err(e) if e.is_not_found() => return Flow::UnknownMachine,
            Err(e) => {
                tracing::warn!(machine_id, error = %e, "Sensor state unavailable");
                exec.sensor = SensorState::Unavailable {
                    reason: e.to_string(),
                };
                // A failed read is not retried by the scan step.
                exec.scan_error = Some(e.to_string());
                return Flow::Continue;
            }
        };

        match self.classifier.classify(machine_id).await {
            Ok(classification) => {
                let report =
                    machine_report(&machine, &classification, self.classifier.thresholds());
                exec.sensor = SensorState::Reported { report };
                exec.classification = Some(classification);
            }
            Err(e) if e.is_not_found() => return Flow::UnknownMachine,
            Err(e) => {
                tracing::warn!(machine_id, error = %e, "Sensor state unavailable");
                exec.sensor = SensorState::Unavailable {
                    reason: e.to_string(),
                };
                exec.scan_error = Some(e.to_string());
            }
        }
        exec.machine = Some(machine);
        Flow::Continue
    }

    async fn scan_anomalies(&self, machine_id: MachineId, exec: &mut Execution) -> Flow {
        // The sensor step may already have classified (or failed to).
        if exec.classification.is_none() && exec.scan_error.is_none() {
            match self.classifier.classify(machine_id).await {
                Ok(classification) => exec.classification = Some(classification),
                Err(e) if e.is_not_found() => return Flow::UnknownMachine,
                Err(e) => {
                    tracing::warn!(machine_id, error = %e, "Anomaly scan failed");
                    exec.scan_error = Some(e.to_string());
                }
            }
        }

        if let Some(classification) = &exec.classification {
            for verdict in classification.verdicts() {
                tracing::info!(
                    machine_id,
                    code = verdict.code(),
                    label = verdict.kind.label(),
                    severity = verdict.severity.as_str(),
                    "Anomaly detected"
                );
            }
        }
        Flow::Continue
    }

    async fn retrieve_procedure(&self, query: &ProcedureQuery, exec: &mut Execution) {
        let text = match query {
            ProcedureQuery::Literal { text } => text.clone(),
            ProcedureQuery::FromVerdicts { fallback } => exec
                .classification
                .as_ref()
                .and_then(Classification::primary)
                .map(FailureVerdict::retrieval_query)
                .unwrap_or_else(|| fallback.clone()),
        };

        let outcome = match bounded(self.config.retrieval_timeout, self.retriever.search(&text)).await {
            Ok(passages) => match passages.into_iter().next() {
                Some(passage) => ProcedureOutcome::Found { passage },
                None => ProcedureOutcome::NoMatch,
            },
            Err(reason) => {
                tracing::warn!(query = %text, reason = %reason, "Procedure lookup failed");
                ProcedureOutcome::Unavailable { reason }
            }
        };

        exec.retrieval_query = Some(text);
        exec.procedure = outcome;
    }

    // -----------------------------------------------------------------------
    // Synthesis
    // -----------------------------------------------------------------------

    async fn synthesize(&self, question: &str, exec: &Execution) -> (DiagnosisStatus, String) {
        let sensor_report = match &exec.sensor {
            SensorState::Reported { report } => Some(report.as_str()),
            _ => None,
        };
        let findings = findings_text(exec);
        let prompt = build_diagnostic_prompt(&PromptInputs {
            question,
            sensor_report,
            findings: findings.as_deref(),
            procedure: exec.procedure.text(),
        });

        match bounded(self.config.generation_timeout, self.generator.complete(&prompt)).await {
            Ok(answer) if !answer.trim().is_empty() => (DiagnosisStatus::Answered, answer),
            Ok(_) => {
                tracing::warn!("Generator returned an empty answer; using fallback");
                (DiagnosisStatus::Fallback, fallback_answer(exec))
            }
            Err(reason) => {
                tracing::warn!(reason = %reason, "Answer synthesis failed; using fallback");
                (DiagnosisStatus::Fallback, fallback_answer(exec))
            }
        }
    }
}

/// Await `fut` for at most `limit`; any failure becomes its message.
async fn bounded<T>(
    limit: Duration,
    fut: impl Future<Output = Result<T, CoreError>>,
) -> Result<T, String> {
    match tokio::time::timeout(limit, fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(e.to_string()),
        Err(_) => Err(format!("timed out after {}s", limit.as_secs_f64())),
    }
}

/// Findings section for the prompt; `None` when no scan ran.
fn findings_text(exec: &Execution) -> Option<String> {
    if !exec.scanned() {
        return None;
    }
    Some(match (&exec.classification, &exec.scan_error) {
        (Some(Classification::NoData { machine_id }), _) => {
            format!("No telemetry recorded for machine {machine_id}; status UNKNOWN.")
        }
        (Some(c), _) if c.verdicts().is_empty() => {
            "No failures detected. All sensors within thresholds.".to_string()
        }
        (Some(c), _) => verdict_details(c.verdicts()),
        (None, Some(reason)) => format!("Sensor data unavailable: {reason}"),
        (None, None) => "Sensor data unavailable.".to_string(),
    })
}

/// Answer used when synthesis fails: the verdict set and the raw procedure,
/// verbatim.
fn fallback_answer(exec: &Execution) -> String {
    let findings = if exec.scanned() {
        match (&exec.classification, &exec.scan_error) {
            (Some(Classification::NoData { machine_id }), _) => {
                format!("No telemetry recorded for machine {machine_id}.")
            }
            (Some(c), _) => verdict_summary(c.verdicts()),
            (None, Some(reason)) => format!("Sensor data unavailable: {reason}"),
            (None, None) => "Sensor data unavailable.".to_string(),
        }
    } else {
        "Not assessed for this request.".to_string()
    };

    let procedure = match &exec.procedure {
        ProcedureOutcome::Found { passage } => passage.text.clone(),
        ProcedureOutcome::NoMatch => "No matching procedure found in the knowledge base.".into(),
        ProcedureOutcome::Unavailable { reason } => format!("Knowledge base unavailable: {reason}"),
        ProcedureOutcome::NotRequested => "Not requested.".into(),
    };

    let machine = exec
        .machine
        .as_ref()
        .map(|m| format!(" for machine {} ({})", m.id, m.model_name))
        .unwrap_or_default();

    format!(
        "Automated answer unavailable{machine}; reporting raw findings.\n\n\
         DETECTED FAILURES:\n{findings}\n\nMANUAL PROCEDURE:\n{procedure}"
    )
}
