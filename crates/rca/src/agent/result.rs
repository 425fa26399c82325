//! Agent Result Structures
//!
//! The final answer of an analysis and how it is parsed out of the LLM's
//! reply.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

// Section headings start a line and may carry markdown decoration, e.g.
// `**COMMAND:**`, `## Analysis:` or `**Command**:`.
lazy_static! {
    static ref ANALYSIS_MARKER: Regex =
        Regex::new(r"(?m)^[ \t>#*_]*(?:ANALYSIS|Analysis)[ \t*_]*:[*_]*")
            .expect("analysis marker pattern is valid");
    static ref COMMAND_MARKER: Regex =
        Regex::new(r"(?m)^[ \t>#*_]*(?:COMMAND|Command)[ \t*_]*:[*_]*")
            .expect("command marker pattern is valid");
}

/// Result of a root cause analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RcaReport {
    /// Alert name, or `chat` for free-form requests.
    pub alert_name: String,

    /// Root cause narrative.
    pub analysis_results: String,

    /// Proposed remediation command, if the agent suggested one.
    pub final_command: Option<String>,

    /// Unparsed final reply of the agent.
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub raw_response: String,
}

impl RcaReport {
    /// Format as a human-readable report
    pub fn format_report(&self) -> String {
        let mut report = String::new();

        report.push_str(&format!("# Root Cause Analysis: {}\n\n", self.alert_name));
        report.push_str(&self.analysis_results);
        report.push_str("\n\n");

        if let Some(command) = &self.final_command {
            report.push_str("## Proposed Command\n\n");
            report.push_str(&format!("`{}`\n", command));
        }

        report
    }
}

/// Parse the agent's final reply.
///
/// A reply without an `ANALYSIS:` section is taken as the analysis as a
/// whole. `COMMAND:` values of `none`, `n/a` or nothing mean no command.
pub fn parse_report(alert_name: &str, response: &str) -> RcaReport {
    let command = COMMAND_MARKER.find(response);

    let analysis_results = match ANALYSIS_MARKER.find(response) {
        Some(heading) => {
            let end = COMMAND_MARKER
                .find_at(response, heading.end())
                .map(|m| m.start())
                .unwrap_or(response.len());
            clean_section(&response[heading.end()..end]).to_string()
        }
        None => {
            let end = command.map(|m| m.start()).unwrap_or(response.len());
            clean_section(&response[..end]).to_string()
        }
    };

    let final_command = command.and_then(|heading| {
        let section = clean_section(&response[heading.end()..]);
        let section = section.split("\n\n").next().unwrap_or_default();
        normalize_command(section)
    });

    RcaReport {
        alert_name: alert_name.to_string(),
        analysis_results,
        final_command,
        raw_response: response.to_string(),
    }
}

/// Trim whitespace and stray bold markers left around a section body.
fn clean_section(section: &str) -> &str {
    section.trim().trim_matches('*').trim()
}

fn normalize_command(section: &str) -> Option<String> {
    let command = strip_code_fence(section.trim());
    let command = command.trim().trim_matches('`').trim();

    match command.to_lowercase().as_str() {
        "" | "none" | "n/a" | "no" => None,
        _ => Some(command.to_string()),
    }
}

fn strip_code_fence(text: &str) -> &str {
    let Some(inner) = text.strip_prefix("```") else {
        return text;
    };
    // Drop the language tag on the opening fence.
    let inner = match inner.find('\n') {
        Some(newline) => &inner[newline + 1..],
        None => inner,
    };
    inner.trim_end().strip_suffix("```").unwrap_or(inner)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_both_sections() {
        let response = "ANALYSIS:\nThe api pod was OOMKilled after the 14:02 deploy.\n\
                        Memory climbed to the 512Mi limit.\n\n\
                        COMMAND:\nkubectl rollout undo deployment/api -n prod";
        let report = parse_report("PodCrashLooping", response);

        assert_eq!(
            report.analysis_results,
            "The api pod was OOMKilled after the 14:02 deploy.\nMemory climbed to the 512Mi limit."
        );
        assert_eq!(
            report.final_command.as_deref(),
            Some("kubectl rollout undo deployment/api -n prod")
        );
    }

    #[test]
    fn missing_analysis_marker_uses_whole_reply() {
        let report = parse_report("chat", "Loki shows no errors in the last hour.");
        assert_eq!(report.analysis_results, "Loki shows no errors in the last hour.");
        assert_eq!(report.final_command, None);
    }

    #[test]
    fn none_command_is_dropped() {
        let report = parse_report("x", "ANALYSIS: disk full on node-3\nCOMMAND: none");
        assert_eq!(report.analysis_results, "disk full on node-3");
        assert_eq!(report.final_command, None);

        let report = parse_report("x", "ANALYSIS: flapping probe\nCOMMAND: N/A");
        assert_eq!(report.final_command, None);
    }

    #[test]
    fn code_fences_are_stripped() {
        let response = "ANALYSIS: nginx config typo\nCOMMAND:\n```bash\nkubectl rollout restart deploy/nginx\n```";
        let report = parse_report("x", response);
        assert_eq!(
            report.final_command.as_deref(),
            Some("kubectl rollout restart deploy/nginx")
        );
    }

    #[test]
    fn markdown_headings_are_recognised() {
        let report = parse_report("x", "**ANALYSIS:** disk full on node-3\n**COMMAND:** none");
        assert_eq!(report.analysis_results, "disk full on node-3");
        assert_eq!(report.final_command, None);

        let response = "## Analysis:\nThe cert for api.example.com expired at 03:00.\n\n\
                        **Command**:\n```bash\nkubectl delete secret api-tls -n prod\n```";
        let report = parse_report("x", response);
        assert_eq!(
            report.analysis_results,
            "The cert for api.example.com expired at 03:00."
        );
        assert_eq!(
            report.final_command.as_deref(),
            Some("kubectl delete secret api-tls -n prod")
        );
    }

    #[test]
    fn inline_mentions_are_not_headings() {
        let response = "ANALYSIS: the Command: field in the job spec was empty\nCOMMAND: none";
        let report = parse_report("x", response);
        assert_eq!(
            report.analysis_results,
            "the Command: field in the job spec was empty"
        );
        assert_eq!(report.final_command, None);
    }

    #[test]
    fn report_text_includes_command() {
        let report = parse_report("HighErrorRate", "ANALYSIS: bad deploy\nCOMMAND: `helm rollback api 41`");
        let text = report.format_report();
        assert!(text.starts_with("# Root Cause Analysis: HighErrorRate"));
        assert!(text.contains("`helm rollback api 41`"));
    }
}
