//! Pull-request change collection
//!
//! Gathers the unit of work under review: the unified diff between the base
//! ref and HEAD, the set of changed files, and the allow-list that bounds
//! which paths a generated fix may touch.

use anyhow::{Context, Result};
use git2::{DiffFormat, DiffOptions, Repository};
use std::collections::HashSet;
use std::path::Path;

/// Everything the review stage needs about the change under review.
#[derive(Debug, Clone, Default)]
pub struct PullRequestChanges {
    /// Unified diff text, base..HEAD.
    pub diff_text: String,
    /// Changed file paths, repository-relative, in diff order.
    pub files: Vec<String>,
}

impl PullRequestChanges {
    pub fn is_empty(&self) -> bool {
        self.diff_text.trim().is_empty()
    }
}

/// Collect the diff between `base_ref` and HEAD.
pub fn collect(repo_path: &Path, base_ref: &str) -> Result<PullRequestChanges> {
    let repo = Repository::open(repo_path)
        .with_context(|| format!("failed to open repository at {}", repo_path.display()))?;

    let base_tree = repo
        .revparse_single(base_ref)
        .with_context(|| format!("base ref '{base_ref}' not found"))?
        .peel_to_commit()
        .with_context(|| format!("base ref '{base_ref}' is not a commit"))?
        .tree()?;
    let head_tree = repo
        .head()
        .context("failed to resolve HEAD")?
        .peel_to_commit()?
        .tree()?;

    let mut opts = DiffOptions::new();
    opts.context_lines(3);
    let diff = repo.diff_tree_to_tree(Some(&base_tree), Some(&head_tree), Some(&mut opts))?;

    let mut files = Vec::new();
    for delta in diff.deltas() {
        if let Some(path) = delta.new_file().path().and_then(|p| p.to_str()) {
            files.push(path.to_string());
        }
    }

    let mut diff_text = String::new();
    diff.print(DiffFormat::Patch, |_delta, _hunk, line| {
        match line.origin() {
            '+' | '-' | ' ' => diff_text.push(line.origin()),
            _ => {}
        }
        diff_text.push_str(std::str::from_utf8(line.content()).unwrap_or("<binary>"));
        true
    })?;

    Ok(PullRequestChanges { diff_text, files })
}

/// The changed-files allow-list: the only paths a generated fix may name.
///
/// Membership is exact string comparison. No globbing, no prefix matching,
/// no path normalization: a reviewer-supplied `../../etc/passwd` can only
/// match if that literal string was in the changed set.
#[derive(Debug, Clone, Default)]
pub struct AllowList {
    entries: HashSet<String>,
}

impl AllowList {
    /// Load an allow-list file: one path per line, blank lines skipped.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read allow-list {}", path.display()))?;
        let entries = content
            .lines()
            .map(|line| line.trim_end_matches('\r'))
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();
        Ok(AllowList { entries })
    }

    /// Build an allow-list directly from a collected change set.
    pub fn from_files(files: impl IntoIterator<Item = String>) -> Self {
        AllowList {
            entries: files.into_iter().collect(),
        }
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains(path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Stage everything and commit. Test scaffolding for exercising diff
/// collection against real repositories.
#[cfg(test)]
pub(crate) fn commit_all(repo: &Repository, message: &str) -> Result<()> {
    use git2::{Commit, IndexAddOption, Signature};

    let mut index = repo.index()?;
    index.add_all(["*"].iter(), IndexAddOption::DEFAULT, None)?;
    index.write()?;
    let tree_id = index.write_tree()?;
    let tree = repo.find_tree(tree_id)?;
    let sig = Signature::now("quasar-test", "test@example.com")?;
    let parent = repo
        .head()
        .ok()
        .and_then(|head| head.peel_to_commit().ok());
    let parents: Vec<&Commit> = parent.iter().collect();
    repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)?;
    Ok(())
}
