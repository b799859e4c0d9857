use crate::types::enums::{PolicyVerdict, Severity};
use crate::types::ids::{PatchSetId, ViolationId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyViolation {
    pub id: ViolationId,
    pub patch_set_id: PatchSetId,
    pub rule: String,
    pub severity: Severity,
    pub file: String,
    pub message: String,
    pub line: Option<u32>,
    pub evidence: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyReport {
    pub verdict: PolicyVerdict,
    pub violations: Vec<PolicyFinding>,
    pub summary: String,
}

impl PolicyReport {
    pub fn has_blocking_violations(&self) -> bool {
        self.verdict == PolicyVerdict::Fail
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyFinding {
    pub rule: String,
    pub severity: Severity,
    pub file: String,
    pub message: String,
    pub line: Option<u32>,
    pub evidence: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretPattern {
    pub name: String,
    pub pattern: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    pub frozen_files: Vec<String>,
    pub deny_globs: Vec<String>,
    pub dependency_files: Vec<String>,
    pub allow_dependency_changes: bool,
    pub secret_patterns: Vec<SecretPattern>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            frozen_files: vec![
                ".github/workflows/release.yml".to_string(),
                "CODEOWNERS".to_string(),
            ],
            deny_globs: vec![
                ".github/workflows/**".to_string(),
                "**/*.pem".to_string(),
                "**/.env*".to_string(),
                "secrets/**".to_string(),
            ],
            dependency_files: vec![
                "Cargo.toml".to_string(),
                "Cargo.lock".to_string(),
                "package.json".to_string(),
                "package-lock.json".to_string(),
                "pnpm-lock.yaml".to_string(),
                "yarn.lock".to_string(),
                "requirements.txt".to_string(),
                "go.mod".to_string(),
                "go.sum".to_string(),
            ],
            allow_dependency_changes: false,
            secret_patterns: default_secret_patterns(),
        }
    }
}

fn default_secret_patterns() -> Vec<SecretPattern> {
    let raw: [(&str, &str); 8] = [
        ("generic-api-key", r#"(?i)(api[_-]?key|apikey)\s*[:=]\s*['"][A-Za-z0-9_\-]{16,}['"]"#),
        ("bearer-token", r"(?i)bearer\s+[A-Za-z0-9_\-\.=]{20,}"),
        ("aws-access-key", r"\bAKIA[0-9A-Z]{16}\b"),
        ("github-token", r"\bgh[pousr]_[A-Za-z0-9]{36,}\b"),
        ("private-key-header", r"-----BEGIN (?:RSA |EC |OPENSSH |DSA |PGP )?PRIVATE KEY-----"),
        ("password-assignment", r#"(?i)(password|passwd|pwd)\s*[:=]\s*['"][^'"]{8,}['"]"#),
        ("connection-string", r"(?i)[a-z][a-z0-9+]*://[^/\s:@]+:[^/\s:@]+@"),
        ("slack-token", r"\bxox[baprs]-[A-Za-z0-9\-]{10,}\b"),
    ];
    raw.iter()
        .map(|(name, pattern)| SecretPattern {
            name: (*name).to_string(),
            pattern: (*pattern).to_string(),
        })
        .collect()
}
