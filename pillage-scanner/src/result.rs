use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Absolute URL of a single build, as reported by the Jenkins JSON API.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BuildLink(String);

impl BuildLink {
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BuildLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BuildLink {
    fn from(url: &str) -> Self {
        Self::new(url)
    }
}

/// What a single extraction attempt produced.
///
/// `Denied` is reported when Jenkins answers 401/403; anything else that
/// yields no payload (404, malformed JSON, empty body) is `NotFound`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome<T> {
    Found(T),
    NotFound,
    Denied,
}

impl<T> Outcome<T> {
    pub fn is_found(&self) -> bool {
        matches!(self, Outcome::Found(_))
    }

    pub fn found(&self) -> Option<&T> {
        match self {
            Outcome::Found(value) => Some(value),
            _ => None,
        }
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Outcome<U> {
        match self {
            Outcome::Found(value) => Outcome::Found(f(value)),
            Outcome::NotFound => Outcome::NotFound,
            Outcome::Denied => Outcome::Denied,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Found(_) => "found",
            Outcome::NotFound => "not found",
            Outcome::Denied => "denied",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ArtifactKind {
    ConsoleText,
    EnvVars,
    WorkspaceZipUrl,
    Credentials,
}

impl ArtifactKind {
    pub const ALL: [ArtifactKind; 4] = [
        ArtifactKind::ConsoleText,
        ArtifactKind::EnvVars,
        ArtifactKind::WorkspaceZipUrl,
        ArtifactKind::Credentials,
    ];

    /// Suffix appended to the flattened build URL when persisting.
    pub fn suffix(&self) -> &'static str {
        match self {
            ArtifactKind::ConsoleText => ".console_output",
            ArtifactKind::EnvVars => ".env_vars",
            ArtifactKind::WorkspaceZipUrl => ".workspace_url",
            ArtifactKind::Credentials => ".creds",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ArtifactKind::ConsoleText => "console output",
            ArtifactKind::EnvVars => "environment variables",
            ArtifactKind::WorkspaceZipUrl => "workspace zip URL",
            ArtifactKind::Credentials => "credentials",
        }
    }
}

/// Per-build extraction results. Every field is always populated; a failed
/// attempt for one artifact never prevents the others.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildReport {
    pub url: String,
    pub console_text: Outcome<String>,
    pub env_vars: Outcome<BTreeMap<String, String>>,
    pub workspace_zip_url: Outcome<String>,
}

impl BuildReport {
    pub fn new(url: String) -> Self {
        Self {
            url,
            console_text: Outcome::NotFound,
            env_vars: Outcome::NotFound,
            workspace_zip_url: Outcome::NotFound,
        }
    }

    /// Kinds that were found for this build.
    pub fn found_kinds(&self) -> Vec<ArtifactKind> {
        let mut kinds = Vec::new();
        if self.console_text.is_found() {
            kinds.push(ArtifactKind::ConsoleText);
        }
        if self.env_vars.is_found() {
            kinds.push(ArtifactKind::EnvVars);
        }
        if self.workspace_zip_url.is_found() {
            kinds.push(ArtifactKind::WorkspaceZipUrl);
        }
        kinds
    }
}

/// Render an `envMap` one `KEY=VALUE` per line, sorted by key.
pub fn render_env_vars(vars: &BTreeMap<String, String>) -> String {
    let mut out = String::new();
    for (key, value) in vars {
        out.push_str(key);
        out.push('=');
        out.push_str(value);
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_map_preserves_absence() {
        let denied: Outcome<u8> = Outcome::Denied;
        assert_eq!(denied.map(|v| v + 1), Outcome::Denied);
        assert_eq!(Outcome::Found(1u8).map(|v| v + 1), Outcome::Found(2));
    }

    #[test]
    fn test_found_kinds_only_lists_found() {
        let mut report = BuildReport::new("http://h/job/A/5/".to_string());
        report.console_text = Outcome::Found("log".to_string());
        report.workspace_zip_url = Outcome::Denied;

        assert_eq!(report.found_kinds(), vec![ArtifactKind::ConsoleText]);
    }

    #[test]
    fn test_render_env_vars_sorted_lines() {
        let mut vars = BTreeMap::new();
        vars.insert("PATH".to_string(), "/usr/bin".to_string());
        vars.insert("BUILD_ID".to_string(), "5".to_string());

        assert_eq!(render_env_vars(&vars), "BUILD_ID=5\nPATH=/usr/bin\n");
    }
}
