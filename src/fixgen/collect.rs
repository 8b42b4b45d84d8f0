//! Phase 3: parse responses, compute diffs, assemble the Fix Set
//!
//! Sequential and slot-ordered by design; this phase is cheap local work
//! and determinism matters more than parallelism here.

use super::dispatch::{DispatchFailure, Outcome};
use super::validate::ValidatedTask;
use crate::diff;
use crate::findings::Severity;
use crate::llm::parse;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// One generated fix, ready for reporting. Exists only if its diff is
/// non-empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixResult {
    pub file: String,
    pub severity: Severity,
    pub description: String,
    /// Unified diff hunks with the `---`/`+++` banner stripped; the file
    /// name already travels in `file`.
    pub diff: String,
    pub explanation: String,
}

/// The fix-generation wire contract.
#[derive(Debug, Deserialize)]
struct FixedFile {
    #[serde(default)]
    fixed_code: String,
    #[serde(default)]
    explanation: String,
    /// Advisory free text; part of the contract but never parsed further.
    #[serde(default)]
    #[allow(dead_code)]
    diff_description: String,
}

/// Why a slot produced no FixResult. Not an error for the run.
#[derive(Debug, thiserror::Error)]
pub enum SkipReason {
    #[error("{0}")]
    DispatchFailed(DispatchFailure),
    #[error("model returned empty content")]
    EmptyContent,
    #[error("model output was not parseable: {0}")]
    Malformed(String),
    #[error("model response carried no fixed_code")]
    MissingFixedCode,
    #[error("fix was a no-op (model echoed the original)")]
    NoOp,
}

/// Collect one slot's outcome into a fix, or a reason it was skipped.
pub fn collect_one(task: &ValidatedTask, outcome: Outcome) -> Result<FixResult, SkipReason> {
    let content = match outcome {
        Outcome::Failed(failure) => return Err(SkipReason::DispatchFailed(failure)),
        Outcome::Completed { content, .. } => content,
    };

    if content.trim().is_empty() {
        return Err(SkipReason::EmptyContent);
    }

    let parsed: FixedFile = parse::parse_structured(&content, "fix generation")
        .map_err(|err| SkipReason::Malformed(err.to_string()))?;

    if parsed.fixed_code.trim().is_empty() {
        return Err(SkipReason::MissingFixedCode);
    }

    let Some(full_diff) = diff::unified(&task.original, &parsed.fixed_code, &task.finding.file)
    else {
        return Err(SkipReason::NoOp);
    };

    let explanation = if parsed.explanation.trim().is_empty() {
        "Fix generated for the reported issue.".to_string()
    } else {
        parsed.explanation
    };

    Ok(FixResult {
        file: task.finding.file.clone(),
        severity: task.finding.severity,
        description: task.finding.description.clone(),
        diff: diff::body(&full_diff),
        explanation,
    })
}

/// Collect every slot in order. Skips are logged with their taxonomy reason
/// so a run can be audited without re-executing it.
pub fn collect_all(tasks: &[ValidatedTask], outcomes: Vec<(usize, Outcome)>) -> Vec<FixResult> {
    debug_assert_eq!(tasks.len(), outcomes.len());

    let mut fixes = Vec::new();
    for (task, (slot, outcome)) in tasks.iter().zip(outcomes) {
        debug_assert_eq!(task.slot, slot);
        match collect_one(task, outcome) {
            Ok(fix) => {
                info!(slot, file = %fix.file, "fix generated");
                fixes.push(fix);
            }
            Err(reason) => {
                info!(slot, file = %task.finding.file, %reason, "fix skipped");
            }
        }
    }
    fixes
}

/// Persist the Fix Set. Written to a temp file and renamed into place so a
/// crash mid-write can never leave a truncated document; an empty slice
/// serializes to `[]`, which downstream consumers treat as a normal result.
pub fn write_fix_set(path: &Path, fixes: &[FixResult]) -> Result<()> {
    let json = serde_json::to_string_pretty(fixes).context("failed to serialize fix set")?;
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, &json)
        .with_context(|| format!("failed to write fix set to {}", tmp.display()))?;
    std::fs::rename(&tmp, path)
        .with_context(|| format!("failed to move fix set into place at {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::findings::Finding;
    use tempfile::TempDir;

    fn task(original: &str) -> ValidatedTask {
        ValidatedTask {
            slot: 0,
            finding: Finding {
                severity: Severity::Bug,
                file: "a.go".to_string(),
                line: Some(3),
                description: "off by one".to_string(),
                suggestion: String::new(),
            },
            original: original.to_string(),
        }
    }

    fn completed(content: &str) -> Outcome {
        Outcome::Completed {
            content: content.to_string(),
            usage: None,
        }
    }

    #[test]
    fn test_dispatch_failure_is_skipped() {
        let outcome = Outcome::Failed(DispatchFailure::Transport("boom".to_string()));
        let err = collect_one(&task("x\n"), outcome).unwrap_err();
        assert!(matches!(err, SkipReason::DispatchFailed(_)));
    }

    #[test]
    fn test_empty_content_is_skipped() {
        let err = collect_one(&task("x\n"), completed("   \n")).unwrap_err();
        assert!(matches!(err, SkipReason::EmptyContent));
    }

    #[test]
    fn test_unparsable_output_is_skipped() {
        let err = collect_one(&task("x\n"), completed("sorry, I cannot help")).unwrap_err();
        assert!(matches!(err, SkipReason::Malformed(_)));
    }

    #[test]
    fn test_missing_fixed_code_is_skipped() {
        let content = r#"{"explanation": "nothing to do", "diff_description": ""}"#;
        let err = collect_one(&task("x\n"), completed(content)).unwrap_err();
        assert!(matches!(err, SkipReason::MissingFixedCode));
    }

    #[test]
    fn test_echoed_content_is_a_noop() {
        let content = r#"{"fixed_code": "x\n", "explanation": "looks fine"}"#;
        let err = collect_one(&task("x\n"), completed(content)).unwrap_err();
        assert!(matches!(err, SkipReason::NoOp));
    }

    #[test]
    fn test_real_change_produces_header_free_diff() {
        let content =
            r#"{"fixed_code": "old\nadded\n", "explanation": "added a guard"}"#;
        let fix = collect_one(&task("old\n"), completed(content)).unwrap();

        assert_eq!(fix.file, "a.go");
        assert_eq!(fix.explanation, "added a guard");
        assert!(fix.diff.contains("+added"));
        assert!(!fix.diff.contains("--- a/"));
        assert!(!fix.diff.contains("+++ b/"));
        assert!(fix.diff.starts_with("@@ "));
    }

    #[test]
    fn test_fenced_response_is_still_accepted() {
        let content = "```json\n{\"fixed_code\": \"old\\nnew\\n\", \"explanation\": \"e\"}\n```";
        let fix = collect_one(&task("old\n"), completed(content)).unwrap();
        assert!(fix.diff.contains("+new"));
    }

    #[test]
    fn test_blank_explanation_gets_a_default() {
        let content = r#"{"fixed_code": "old\nnew\n", "explanation": "  "}"#;
        let fix = collect_one(&task("old\n"), completed(content)).unwrap();
        assert!(!fix.explanation.trim().is_empty());
    }

    #[test]
    fn test_collect_all_keeps_slot_order_and_drops_skips() {
        let tasks = vec![
            ValidatedTask { slot: 0, ..task("old\n") },
            ValidatedTask { slot: 2, ..task("old\n") },
        ];
        let outcomes = vec![
            (0, completed(r#"{"fixed_code": "old\na\n", "explanation": "e"}"#)),
            (2, Outcome::Failed(DispatchFailure::Transport("x".to_string()))),
        ];
        let fixes = collect_all(&tasks, outcomes);
        assert_eq!(fixes.len(), 1);
        assert!(fixes[0].diff.contains("+a"));
    }

    #[test]
    fn test_write_fix_set_round_trips() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("fixes.json");

        let fixes = vec![FixResult {
            file: "a.go".to_string(),
            severity: Severity::Critical,
            description: "d".to_string(),
            diff: "@@ -1,1 +1,1 @@\n-old\n+new\n".to_string(),
            explanation: "e".to_string(),
        }];
        write_fix_set(&out, &fixes).unwrap();

        let loaded: Vec<FixResult> =
            serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].file, "a.go");
        assert!(!dir.path().join("fixes.tmp").exists());
    }

    #[test]
    fn test_write_empty_fix_set_is_valid_json_array() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("fixes.json");
        write_fix_set(&out, &[]).unwrap();

        let content = std::fs::read_to_string(&out).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(parsed, serde_json::json!([]));
    }

    #[test]
    fn test_write_fix_set_replaces_previous_document() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("fixes.json");
        std::fs::write(&out, "stale garbage").unwrap();

        write_fix_set(&out, &[]).unwrap();
        let parsed: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
        assert!(parsed.as_array().unwrap().is_empty());
    }
}
