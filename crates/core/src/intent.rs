//! Intent routing: turn a free-text request into an ordered diagnostic plan.
//!
//! Classification is purely lexical and deterministic. Each intent owns a
//! cue set matched case-insensitively on word boundaries; the intent with
//! the most hits wins and any tie falls back to [`Intent::Maintenance`].

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::MachineId;

static MAINTENANCE_CUES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:not\s+working|troubleshoot(?:ing)?|overheat(?:ing|ed)?|clicking|replace|repair|broken|failing|failure|fail(?:ed)?|error|fault|jam(?:med)?|noise|fix)s?\b",
    )
    .expect("valid regex")
});

static COMMISSIONING_CUES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:set[\s-]?up|calibrat(?:e|ion|ing)|install(?:ation|ing)?|level(?:l?ing)?|configur(?:e|ation|ing)|commission(?:ing)?|first\s+layer|assembl(?:e|y|ing))s?\b",
    )
    .expect("valid regex")
});

static SAFETY_CUES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:specification|spec|limit|maximum|minimum|compliance|safety|safe|rating|tolerance|warning)s?\b",
    )
    .expect("valid regex")
});

static MACHINE_REF_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:machine|printer|unit)\s*#?\s*(\d+)\b").expect("valid regex")
});

// ---------------------------------------------------------------------------
// Intent
// ---------------------------------------------------------------------------

/// What the operator is trying to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Maintenance,
    Commissioning,
    Safety,
}

impl Intent {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Maintenance => "maintenance",
            Self::Commissioning => "commissioning",
            Self::Safety => "safety",
        }
    }
}

/// Cue hit counts per intent for one request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CueHits {
    pub maintenance: usize,
    pub commissioning: usize,
    pub safety: usize,
}

impl CueHits {
    pub fn count(text: &str) -> Self {
        Self {
            maintenance: MAINTENANCE_CUES.find_iter(text).count(),
            commissioning: COMMISSIONING_CUES.find_iter(text).count(),
            safety: SAFETY_CUES.find_iter(text).count(),
        }
    }

    /// Unique highest count wins; any tie at the top is maintenance.
    pub fn winner(&self) -> Intent {
        let best = self.maintenance.max(self.commissioning).max(self.safety);
        let at_best = [self.maintenance, self.commissioning, self.safety]
            .iter()
            .filter(|&&n| n == best)
            .count();
        if at_best > 1 || self.maintenance == best {
            Intent::Maintenance
        } else if self.commissioning == best {
            Intent::Commissioning
        } else {
            Intent::Safety
        }
    }
}

// ---------------------------------------------------------------------------
// Plan
// ---------------------------------------------------------------------------

/// How a procedure lookup gets its query text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum ProcedureQuery {
    /// Use the operator's text as-is.
    Literal { text: String },
    /// Derive the query from the verdicts found by an earlier scan; use
    /// `fallback` when the scan produced nothing.
    FromVerdicts { fallback: String },
}

/// One collaborator call in a diagnostic plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum PlanStep {
    ReadSensorStatus { machine_id: MachineId },
    ScanAnomalies { machine_id: MachineId },
    RetrieveProcedure { query: ProcedureQuery },
}

impl PlanStep {
    pub fn name(&self) -> &'static str {
        match self {
            Self::ReadSensorStatus { .. } => "read_sensor_status",
            Self::ScanAnomalies { .. } => "scan_anomalies",
            Self::RetrieveProcedure { .. } => "retrieve_procedure",
        }
    }
}

/// Ordered, validated sequence of steps. Built once per request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticPlan {
    steps: Vec<PlanStep>,
}

impl DiagnosticPlan {
    /// Build a plan, rejecting orderings the orchestrator cannot execute.
    pub fn new(steps: Vec<PlanStep>) -> Result<Self, CoreError> {
        let plan = Self { steps };
        plan.validate()?;
        Ok(plan)
    }

    /// A plan must be non-empty, and a verdict-derived lookup must come after
    /// the scan that produces those verdicts.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.steps.is_empty() {
            return Err(CoreError::InvalidParameter(
                "diagnostic plan has no steps".into(),
            ));
        }
        let mut scanned = false;
        for (idx, step) in self.steps.iter().enumerate() {
            match step {
                PlanStep::ScanAnomalies { .. } => scanned = true,
                PlanStep::RetrieveProcedure {
                    query: ProcedureQuery::FromVerdicts { .. },
                } if !scanned => {
                    return Err(CoreError::InvalidParameter(format!(
                        "step {idx} derives a procedure query before any anomaly scan"
                    )));
                }
                _ => {}
            }
        }
        Ok(())
    }

    pub fn steps(&self) -> &[PlanStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl IntoIterator for DiagnosticPlan {
    type Item = PlanStep;
    type IntoIter = std::vec::IntoIter<PlanStep>;

    fn into_iter(self) -> Self::IntoIter {
        self.steps.into_iter()
    }
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Stateless keyword router.
#[derive(Debug, Clone, Copy, Default)]
pub struct IntentRouter;

impl IntentRouter {
    pub fn new() -> Self {
        Self
    }

    pub fn classify(&self, request_text: &str) -> Intent {
        CueHits::count(request_text).winner()
    }

    /// Fixed plan per intent.
    pub fn plan_for(&self, intent: Intent, machine_id: MachineId, request_text: &str) -> DiagnosticPlan {
        let steps = match intent {
            Intent::Maintenance => vec![
                PlanStep::ReadSensorStatus { machine_id },
                PlanStep::ScanAnomalies { machine_id },
                PlanStep::RetrieveProcedure {
                    query: ProcedureQuery::FromVerdicts {
                        fallback: request_text.to_string(),
                    },
                },
            ],
            Intent::Commissioning | Intent::Safety => vec![PlanStep::RetrieveProcedure {
                query: ProcedureQuery::Literal {
                    text: request_text.to_string(),
                },
            }],
        };
        // Every fixed plan above satisfies `validate`.
        DiagnosticPlan { steps }
    }

    pub fn route(&self, machine_id: MachineId, request_text: &str) -> (Intent, DiagnosticPlan) {
        let intent = self.classify(request_text);
        (intent, self.plan_for(intent, machine_id, request_text))
    }
}

/// Extract a machine reference such as "machine 3" or "printer #12".
pub fn mentioned_machine_id(text: &str) -> Option<MachineId> {
    MACHINE_REF_RE
        .captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
