//! Fix-generation pipeline
//!
//! Three strictly sequential phases: validate findings into tasks, dispatch
//! one completion call per task concurrently, collect results into the Fix
//! Set. The dispatch barrier is the only blocking wait; nothing from phase 3
//! runs until every phase-2 call reached a terminal state.

pub mod collect;
pub mod dispatch;
pub mod request;
pub mod validate;

pub use collect::{write_fix_set, FixResult};
pub use validate::ValidatedTask;

use crate::changes::AllowList;
use crate::config::Config;
use crate::findings::Finding;
use crate::llm::client::ChatBackend;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Absolute ceiling on fixes per run, regardless of configuration. Also the
/// implicit concurrency bound: one in-flight call per task.
pub const HARD_MAX_FIXES: usize = 10;

/// Knobs the pipeline needs from the run configuration.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub model: String,
    pub max_fixes: usize,
    pub request_timeout: Duration,
}

impl PipelineOptions {
    pub fn from_config(config: &Config) -> Self {
        PipelineOptions {
            model: config.model.clone(),
            max_fixes: config.max_fixes,
            request_timeout: config.request_timeout,
        }
    }
}

/// Run the full pipeline over a findings list.
///
/// Never fails: every per-task problem is isolated and logged, and "no
/// fixes" is a normal outcome. The returned Fix Set is ordered by each
/// task's slot (its position in the original findings list).
pub async fn run(
    backend: &dyn ChatBackend,
    options: &PipelineOptions,
    findings: &[Finding],
    allow_list: Option<&AllowList>,
    repo_root: &Path,
) -> Vec<FixResult> {
    // Phase 1: policy validation, content capture, cap enforcement.
    let tasks = validate::select_tasks(findings, allow_list, repo_root, options.max_fixes);
    if tasks.is_empty() {
        info!("no findings eligible for fix generation");
        return Vec::new();
    }

    // Phase 2: fan out one call per task, then wait for every terminal
    // outcome before anything downstream runs.
    let requests = tasks
        .iter()
        .map(|task| (task.slot, request::build(task, &options.model)))
        .collect();
    let report = dispatch::dispatch(backend, requests, options.request_timeout).await;

    // Phase 3: sequential, slot-ordered collection.
    collect::collect_all(&tasks, report.outcomes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::findings::Severity;
    use crate::test_helpers::{fixed_code_reply, Behavior, ScriptedBackend};
    use tempfile::TempDir;

    fn finding(severity: Severity, file: &str, description: &str) -> Finding {
        Finding {
            severity,
            file: file.to_string(),
            line: Some(10),
            description: description.to_string(),
            suggestion: "add nil check".to_string(),
        }
    }

    fn options() -> PipelineOptions {
        PipelineOptions {
            model: "test-model".to_string(),
            max_fixes: 5,
            request_timeout: Duration::from_secs(2),
        }
    }

    #[tokio::test]
    async fn test_single_critical_finding_yields_one_fix() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.go"), "func main() {\n\tuse(p)\n}\n").unwrap();

        let backend = ScriptedBackend::new().on(
            "a.go",
            Behavior::reply(&fixed_code_reply(
                "func main() {\n\tif p == nil {\n\t\treturn\n\t}\n\tuse(p)\n}\n",
            )),
        );
        let findings = vec![finding(Severity::Critical, "a.go", "nil deref")];
        let allow_list = AllowList::from_files(vec!["a.go".to_string()]);

        let fixes = run(&backend, &options(), &findings, Some(&allow_list), dir.path()).await;
        assert_eq!(fixes.len(), 1);
        assert_eq!(fixes[0].file, "a.go");
        assert_eq!(fixes[0].severity, Severity::Critical);
        assert!(fixes[0].diff.lines().any(|l| l.starts_with('+')));
        assert!(!fixes[0].diff.contains("--- a/"));
    }

    #[tokio::test]
    async fn test_style_findings_never_become_tasks() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.go"), "x\n").unwrap();

        let backend = ScriptedBackend::new();
        let findings = vec![finding(Severity::Style, "a.go", "naming")];
        let allow_list = AllowList::from_files(vec!["a.go".to_string()]);

        let fixes = run(&backend, &options(), &findings, Some(&allow_list), dir.path()).await;
        assert!(fixes.is_empty());
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn test_one_failure_does_not_poison_siblings() {
        let dir = TempDir::new().unwrap();
        for name in ["a.go", "b.go", "c.go"] {
            std::fs::write(dir.path().join(name), "old\n").unwrap();
        }

        let backend = ScriptedBackend::new()
            .on("a.go", Behavior::reply(&fixed_code_reply("new a\n")))
            .on("b.go", Behavior::fail("connection reset"))
            .on("c.go", Behavior::reply(&fixed_code_reply("new c\n")));

        let findings = vec![
            finding(Severity::Critical, "a.go", "bug in a"),
            finding(Severity::Bug, "b.go", "bug in b"),
            finding(Severity::Bug, "c.go", "bug in c"),
        ];
        let allow_list = AllowList::from_files(
            ["a.go", "b.go", "c.go"].iter().map(|s| s.to_string()).collect::<Vec<_>>(),
        );

        let fixes = run(&backend, &options(), &findings, Some(&allow_list), dir.path()).await;
        assert_eq!(fixes.len(), 2);
        assert_eq!(fixes[0].file, "a.go");
        assert_eq!(fixes[1].file, "c.go");
    }

    #[tokio::test]
    async fn test_echoed_content_yields_empty_fix_set() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.go"), "unchanged\n").unwrap();

        let backend =
            ScriptedBackend::new().on("a.go", Behavior::reply(&fixed_code_reply("unchanged\n")));
        let findings = vec![finding(Severity::Critical, "a.go", "false alarm")];
        let allow_list = AllowList::from_files(vec!["a.go".to_string()]);

        let fixes = run(&backend, &options(), &findings, Some(&allow_list), dir.path()).await;
        assert!(fixes.is_empty());
    }

    #[tokio::test]
    async fn test_results_follow_slot_order_not_latency_order() {
        let dir = TempDir::new().unwrap();
        for name in ["a.go", "b.go", "c.go"] {
            std::fs::write(dir.path().join(name), "old\n").unwrap();
        }

        // Slowest response first in slot order.
        let backend = ScriptedBackend::new()
            .on("a.go", Behavior::reply_after(&fixed_code_reply("new a\n"), 120))
            .on("b.go", Behavior::reply_after(&fixed_code_reply("new b\n"), 60))
            .on("c.go", Behavior::reply(&fixed_code_reply("new c\n")));

        let findings = vec![
            finding(Severity::Bug, "a.go", "bug"),
            finding(Severity::Bug, "b.go", "bug"),
            finding(Severity::Bug, "c.go", "bug"),
        ];
        let allow_list = AllowList::from_files(
            ["a.go", "b.go", "c.go"].iter().map(|s| s.to_string()).collect::<Vec<_>>(),
        );

        let fixes = run(&backend, &options(), &findings, Some(&allow_list), dir.path()).await;
        let files: Vec<&str> = fixes.iter().map(|f| f.file.as_str()).collect();
        assert_eq!(files, vec!["a.go", "b.go", "c.go"]);
    }

    #[tokio::test]
    async fn test_traversal_path_is_dropped_before_dispatch() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.go"), "old\n").unwrap();

        let backend = ScriptedBackend::new().on("a.go", Behavior::reply(&fixed_code_reply("new\n")));
        let findings = vec![
            finding(Severity::Bug, "../../secret.env", "crafted"),
            finding(Severity::Bug, "a.go", "real"),
        ];
        let allow_list = AllowList::from_files(vec!["a.go".to_string()]);

        let fixes = run(&backend, &options(), &findings, Some(&allow_list), dir.path()).await;
        assert_eq!(fixes.len(), 1);
        assert_eq!(fixes[0].file, "a.go");
        assert_eq!(backend.calls(), 1);
    }
}
