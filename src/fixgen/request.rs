//! Phase 1→2 bridge: build one completion request per validated task.

use super::validate::ValidatedTask;
use crate::llm::client::ChatRequest;
use crate::llm::prompts::FIX_SYSTEM;

/// Sampling temperature for fix generation. Low on purpose: the contract
/// wants the most literal corrected file, not a creative rewrite.
const FIX_TEMPERATURE: f32 = 0.1;

/// Build the chat request for one task. Pure transform: the captured file
/// content goes into the prompt verbatim, nothing is read or sent here.
pub fn build(task: &ValidatedTask, model: &str) -> ChatRequest {
    let finding = &task.finding;

    let line_note = finding
        .line
        .map(|line| format!(" (line {line})"))
        .unwrap_or_default();

    let suggestion_section = if finding.suggestion.trim().is_empty() {
        String::new()
    } else {
        format!("\nSuggested direction: {}", finding.suggestion)
    };

    let user = format!(
        "File: {}{}\nSeverity: {}\nIssue: {}{}\n\nCurrent file content:\n```\n{}\n```\n\nReturn the complete corrected file.",
        finding.file, line_note, finding.severity, finding.description, suggestion_section, task.original
    );

    ChatRequest::json_mode(model, FIX_SYSTEM, &user, FIX_TEMPERATURE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::findings::{Finding, Severity};

    fn task(line: Option<u32>, suggestion: &str) -> ValidatedTask {
        ValidatedTask {
            slot: 0,
            finding: Finding {
                severity: Severity::Critical,
                file: "src/widget.rs".to_string(),
                line,
                description: "index out of bounds".to_string(),
                suggestion: suggestion.to_string(),
            },
            original: "fn broken() {}\n".to_string(),
        }
    }

    #[test]
    fn test_request_embeds_captured_content_verbatim() {
        let request = build(&task(Some(7), "bounds check"), "test-model");
        let user = &request.messages[1].content;
        assert!(user.contains("fn broken() {}\n"));
        assert!(user.contains("src/widget.rs (line 7)"));
        assert!(user.contains("Severity: CRITICAL"));
        assert!(user.contains("Suggested direction: bounds check"));
    }

    #[test]
    fn test_request_uses_low_temperature_json_mode() {
        let request = build(&task(None, ""), "test-model");
        assert_eq!(request.temperature, 0.1);
        assert!(request.response_format.is_some());
        assert_eq!(request.model, "test-model");
    }

    #[test]
    fn test_missing_line_and_suggestion_are_omitted() {
        let request = build(&task(None, ""), "test-model");
        let user = &request.messages[1].content;
        assert!(!user.contains("(line"));
        assert!(!user.contains("Suggested direction"));
    }
}
