//! Findings document model
//!
//! The review stage (or an upstream collaborator) produces one of these per
//! run. The document is loaded once and is read-only from then on.

use anyhow::{Context, Result};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::path::Path;

/// Severity of a single finding, most severe first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Critical,
    Bug,
    Warning,
    Info,
    Style,
}

impl Severity {
    /// Parse a severity label, case-insensitively. `None` for unknown labels.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_uppercase().as_str() {
            "CRITICAL" => Some(Severity::Critical),
            "BUG" => Some(Severity::Bug),
            "WARNING" => Some(Severity::Warning),
            "INFO" => Some(Severity::Info),
            "STYLE" => Some(Severity::Style),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Severity::Critical => "CRITICAL",
            Severity::Bug => "BUG",
            Severity::Warning => "WARNING",
            Severity::Info => "INFO",
            Severity::Style => "STYLE",
        }
    }

    /// Only the two most severe tiers are ever promoted to fix generation.
    pub fn fix_eligible(&self) -> bool {
        matches!(self, Severity::Critical | Severity::Bug)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for Severity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

impl<'de> Deserialize<'de> for Severity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let label = String::deserialize(deserializer)?;
        Severity::from_label(&label)
            .ok_or_else(|| D::Error::custom(format!("unknown severity: {label}")))
    }
}

/// Overall risk assessment of the reviewed change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RiskLevel {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_uppercase().as_str() {
            "LOW" => Some(RiskLevel::Low),
            "MEDIUM" => Some(RiskLevel::Medium),
            "HIGH" => Some(RiskLevel::High),
            "CRITICAL" => Some(RiskLevel::Critical),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RiskLevel::Low => "LOW",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::High => "HIGH",
            RiskLevel::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for RiskLevel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

impl<'de> Deserialize<'de> for RiskLevel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let label = String::deserialize(deserializer)?;
        RiskLevel::from_label(&label)
            .ok_or_else(|| D::Error::custom(format!("unknown risk level: {label}")))
    }
}

/// A single reviewer-reported issue. Produced upstream; read-only here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    pub severity: Severity,
    /// Repository-relative path, as reported by the reviewer. Untrusted
    /// until it passes the fix pipeline's path validation.
    pub file: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    pub description: String,
    #[serde(default)]
    pub suggestion: String,
}

/// The findings document: one review's complete output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewDocument {
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub risk_level: RiskLevel,
    #[serde(default)]
    pub findings: Vec<Finding>,
}

impl ReviewDocument {
    /// Load a findings document produced by an earlier stage.
    ///
    /// Unlike model output, this is a typed contract with a collaborator, so
    /// a malformed document is an error rather than something to repair.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read findings document {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("failed to parse findings document {}", path.display()))
    }

    /// Number of findings severe enough to be considered for fixes.
    pub fn eligible_count(&self) -> usize {
        self.findings
            .iter()
            .filter(|f| f.severity.fix_eligible())
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_labels_round_trip() {
        for label in ["CRITICAL", "BUG", "WARNING", "INFO", "STYLE"] {
            let severity = Severity::from_label(label).unwrap();
            assert_eq!(severity.label(), label);
        }
    }

    #[test]
    fn test_severity_is_case_insensitive() {
        assert_eq!(Severity::from_label("critical"), Some(Severity::Critical));
        assert_eq!(Severity::from_label(" Bug "), Some(Severity::Bug));
        assert_eq!(Severity::from_label("blocker"), None);
    }

    #[test]
    fn test_only_critical_and_bug_are_fix_eligible() {
        assert!(Severity::Critical.fix_eligible());
        assert!(Severity::Bug.fix_eligible());
        assert!(!Severity::Warning.fix_eligible());
        assert!(!Severity::Info.fix_eligible());
        assert!(!Severity::Style.fix_eligible());
    }

    #[test]
    fn test_document_parses_with_defaults() {
        let json = r#"{
            "summary": "looks risky",
            "risk_level": "high",
            "findings": [
                {"severity": "CRITICAL", "file": "a.go", "line": 10,
                 "description": "nil deref", "suggestion": "add nil check"},
                {"severity": "style", "file": "b.go", "description": "naming"}
            ]
        }"#;
        let doc: ReviewDocument = serde_json::from_str(json).unwrap();
        assert_eq!(doc.risk_level, RiskLevel::High);
        assert_eq!(doc.findings.len(), 2);
        assert_eq!(doc.findings[1].line, None);
        assert_eq!(doc.findings[1].suggestion, "");
        assert_eq!(doc.eligible_count(), 1);
    }

    #[test]
    fn test_unknown_severity_is_rejected() {
        let json = r#"{"summary": "", "risk_level": "LOW",
            "findings": [{"severity": "WHATEVER", "file": "a", "description": "d"}]}"#;
        assert!(serde_json::from_str::<ReviewDocument>(json).is_err());
    }

    #[test]
    fn test_load_missing_document_is_an_error() {
        let err = ReviewDocument::load(Path::new("/nonexistent/findings.json")).unwrap_err();
        assert!(err.to_string().contains("findings document"));
    }
}
