//! Phase 1: policy validation and task selection
//!
//! Turns the immutable findings list into at most `max_fixes` validated
//! tasks. The file path in a finding is model-controlled text and is
//! treated as hostile until it passes the allow-list check.

use crate::changes::AllowList;
use crate::findings::Finding;
use std::path::Path;
use tracing::{debug, info, warn};

/// A finding cleared for fix generation.
#[derive(Debug, Clone)]
pub struct ValidatedTask {
    /// Position in the original findings list. Correlates the three phases
    /// and fixes the Fix Set's final ordering.
    pub slot: usize,
    pub finding: Finding,
    /// Full file content captured at validation time. Never re-read, so a
    /// filesystem mutation mid-run cannot race the outbound request.
    pub original: String,
}

/// Why a finding was rejected before any network call.
#[derive(Debug, thiserror::Error)]
pub enum PolicyViolation {
    #[error("path is not in the changed-files allow-list")]
    NotInAllowList,
    #[error("file does not exist in the repository")]
    NotOnDisk,
    #[error("file could not be read: {0}")]
    Unreadable(String),
}

/// Check a candidate path against the security policy.
///
/// With an allow-list, membership is an exact string match; nothing else is
/// accepted. Without one, the check degrades to on-disk existence.
pub fn validate_path(
    file: &str,
    allow_list: Option<&AllowList>,
    repo_root: &Path,
) -> Result<(), PolicyViolation> {
    match allow_list {
        Some(list) => {
            if list.contains(file) {
                Ok(())
            } else {
                Err(PolicyViolation::NotInAllowList)
            }
        }
        None => {
            if repo_root.join(file).is_file() {
                Ok(())
            } else {
                Err(PolicyViolation::NotOnDisk)
            }
        }
    }
}

/// Select the first `max_fixes` CRITICAL/BUG findings that pass validation,
/// capturing each file's content exactly once.
pub fn select_tasks(
    findings: &[Finding],
    allow_list: Option<&AllowList>,
    repo_root: &Path,
    max_fixes: usize,
) -> Vec<ValidatedTask> {
    let cap = max_fixes.min(super::HARD_MAX_FIXES);

    if allow_list.is_none() {
        warn!(
            "no changed-files allow-list available; falling back to on-disk existence \
             checks, which weakens path-traversal protection"
        );
    }

    let mut tasks = Vec::new();
    for (slot, finding) in findings.iter().enumerate() {
        if tasks.len() == cap {
            debug!(cap, "fix cap reached; remaining findings dropped");
            break;
        }
        if !finding.severity.fix_eligible() {
            continue;
        }
        if let Err(violation) = validate_path(&finding.file, allow_list, repo_root) {
            warn!(file = %finding.file, reason = %violation, "finding rejected by path validation");
            continue;
        }
        match std::fs::read_to_string(repo_root.join(&finding.file)) {
            Ok(original) => {
                debug!(slot, file = %finding.file, "finding promoted to fix task");
                tasks.push(ValidatedTask {
                    slot,
                    finding: finding.clone(),
                    original,
                });
            }
            Err(err) => {
                let violation = if err.kind() == std::io::ErrorKind::NotFound {
                    PolicyViolation::NotOnDisk
                } else {
                    PolicyViolation::Unreadable(err.to_string())
                };
                warn!(file = %finding.file, reason = %violation, "finding rejected by path validation");
            }
        }
    }

    info!(
        selected = tasks.len(),
        total = findings.len(),
        "validation phase complete"
    );
    tasks
}
