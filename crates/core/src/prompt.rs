//! Synthesis prompt template.
//!
//! The template is fixed; only the `{placeholder}` slots vary per request.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

/// Regex pattern matching `{placeholder}` tokens in the template.
pub const PLACEHOLDER_PATTERN: &str = r"\{([a-z_]+)\}";

static PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(PLACEHOLDER_PATTERN).expect("valid regex"));

/// System persona for the answer generator.
pub const PERSONA: &str = "You are a Senior Field Engineer for industrial 3D printers. \
You NEVER say \"read the manual\" - you ARE the manual. \
Be concise, specific, and practical. \
Always include safety notes when touching the hotend, mains voltage, or moving axes.";

/// Fixed per-request template.
pub const DIAGNOSTIC_TEMPLATE: &str = "{persona}

OPERATOR QUESTION:
{question}

LIVE SENSOR REPORT:
{sensor_report}

DETECTED FAILURES:
{findings}

MANUAL PROCEDURE:
{procedure}

Answer with a short diagnosis that cites the real sensor values, then a numbered \
list of concrete repair steps including tool sizes and safety warnings. \
Do not tell the operator to open or read the manual.";

/// Placeholder text for sections with nothing to show.
pub const NOT_AVAILABLE: &str = "(not available)";

/// Inputs to [`build_diagnostic_prompt`].
#[derive(Debug, Clone, Default)]
pub struct PromptInputs<'a> {
    pub question: &'a str,
    pub sensor_report: Option<&'a str>,
    pub findings: Option<&'a str>,
    pub procedure: Option<&'a str>,
}

/// Render the synthesis prompt. Missing sections read as [`NOT_AVAILABLE`].
pub fn build_diagnostic_prompt(inputs: &PromptInputs<'_>) -> String {
    let vars = HashMap::from([
        ("persona", PERSONA),
        ("question", inputs.question),
        ("sensor_report", inputs.sensor_report.unwrap_or(NOT_AVAILABLE)),
        ("findings", inputs.findings.unwrap_or(NOT_AVAILABLE)),
        ("procedure", inputs.procedure.unwrap_or(NOT_AVAILABLE)),
    ]);
    render(DIAGNOSTIC_TEMPLATE, &vars)
}

/// Substitute `{name}` tokens from `vars`. Unknown tokens are left in place.
///
/// Substitution is single-pass, so braces inside substituted values are
/// never expanded.
pub fn render(template: &str, vars: &HashMap<&str, &str>) -> String {
    PLACEHOLDER_RE
        .replace_all(template, |caps: &regex::Captures<'_>| {
            let name = &caps[1];
            match vars.get(name) {
                Some(value) => (*value).to_string(),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_contains_every_section() {
        let prompt = build_diagnostic_prompt(&PromptInputs {
            question: "Why is machine 4 stalling?",
            sensor_report: Some("RPM: 0"),
            findings: Some("[HIGH] Fan Failure (FF-001)"),
            procedure: Some("Replace the 24V fan."),
        });
        assert!(prompt.starts_with("You are a Senior Field Engineer"));
        assert!(prompt.contains("Why is machine 4 stalling?"));
        assert!(prompt.contains("RPM: 0"));
        assert!(prompt.contains("FF-001"));
        assert!(prompt.contains("Replace the 24V fan."));
        assert!(!prompt.contains("{question}"));
    }

    #[test]
    fn missing_sections_are_marked() {
        let prompt = build_diagnostic_prompt(&PromptInputs {
            question: "q",
            ..Default::default()
        });
        assert_eq!(prompt.matches(NOT_AVAILABLE).count(), 3);
    }

    #[test]
    fn braces_in_values_are_not_expanded() {
        let vars = HashMap::from([("a", "{b}"), ("b", "nope")]);
        assert_eq!(render("{a}", &vars), "{b}");
    }

    #[test]
    fn unknown_tokens_survive() {
        assert_eq!(render("x {missing} y", &HashMap::new()), "x {missing} y");
    }
}
