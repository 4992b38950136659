use crate::client::{JenkinsClient, JenkinsEndpoint};
use crate::error::Result;
use crate::result::{ArtifactKind, BuildReport, Outcome};
use reqwest::StatusCode;
use reqwest::header::HeaderMap;
use scraper::{Html, Selector};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};
use url::Url;

const CONSOLE_TEXT_PATH: &str = "consoleText";
const ENV_VARS_PATH: &str = "injectedEnvVars/api/json";
const WORKSPACE_PATH: &str = "ws/";
const SCRIPT_TEXT_PATH: &str = "scriptText";

/// Per-executor workspace pages on the `/ws/` listing.
const EXECUTION_NODE_MARKER: &str = "/execution/node/";
/// "(all files in zip)" link on a workspace page.
const ZIP_MARKER: &str = "/*zip*/";

/// Pulls artifacts out of individual builds.
#[derive(Clone)]
pub struct Extractor {
    client: JenkinsClient,
}

impl Extractor {
    pub fn new(client: JenkinsClient) -> Self {
        Self { client }
    }

    /// Attempt console text, environment variables and the workspace zip
    /// link concurrently. Transport errors are logged and reported as
    /// `NotFound` for the affected artifact only.
    pub async fn extract(&self, build: &JenkinsEndpoint) -> BuildReport {
        let (console_text, env_vars, workspace_zip_url) = tokio::join!(
            self.console_text(build),
            self.env_vars(build),
            self.workspace_zip_url(build),
        );

        let mut report = BuildReport::new(build.url().to_string());
        report.console_text = settle(ArtifactKind::ConsoleText, build, console_text);
        report.env_vars = settle(ArtifactKind::EnvVars, build, env_vars);
        report.workspace_zip_url = settle(ArtifactKind::WorkspaceZipUrl, build, workspace_zip_url);
        report
    }

    pub async fn console_text(&self, build: &JenkinsEndpoint) -> Result<Outcome<String>> {
        let response = self.client.get(&build.join(CONSOLE_TEXT_PATH)).await?;

        if response.is_denied() {
            return Ok(Outcome::Denied);
        }
        if !response.is_success() || response.body.is_empty() {
            return Ok(Outcome::NotFound);
        }
        Ok(Outcome::Found(response.body))
    }

    /// `envMap` of the EnvInject plugin. Values that are not strings are
    /// kept in their JSON form.
    pub async fn env_vars(&self, build: &JenkinsEndpoint) -> Result<Outcome<BTreeMap<String, String>>> {
        let response = self.client.get(&build.join(ENV_VARS_PATH)).await?;

        if response.is_denied() {
            return Ok(Outcome::Denied);
        }

        let Some(env_map) = response
            .json::<Value>()
            .and_then(|doc| doc.get("envMap").and_then(Value::as_object).cloned())
        else {
            return Ok(Outcome::NotFound);
        };

        let vars: BTreeMap<String, String> = env_map
            .into_iter()
            .map(|(key, value)| match value {
                Value::String(s) => (key, s),
                other => (key, other.to_string()),
            })
            .collect();

        if vars.is_empty() {
            return Ok(Outcome::NotFound);
        }
        Ok(Outcome::Found(vars))
    }

    /// Jenkins has no API for workspace archives, so scrape the HTML: the
    /// `/ws/` page links one page per executor node, and each of those
    /// carries a `*zip*` download link.
    pub async fn workspace_zip_url(&self, build: &JenkinsEndpoint) -> Result<Outcome<String>> {
        let ws_url = build.join(WORKSPACE_PATH);
        let listing = self.client.get(&ws_url).await?;

        if listing.is_denied() {
            return Ok(Outcome::Denied);
        }
        if listing.status == StatusCode::NOT_FOUND {
            return Ok(Outcome::NotFound);
        }

        let Ok(ws_page) = Url::parse(&ws_url) else {
            return Ok(Outcome::NotFound);
        };

        let node_pages: Vec<Url> = anchors_containing(&listing.body, EXECUTION_NODE_MARKER)
            .iter()
            .filter_map(|href| ws_page.join(href).ok())
            .collect();

        if node_pages.is_empty() {
            debug!("No executor workspaces linked from {}", ws_url);
            return Ok(Outcome::NotFound);
        }

        for node_page in node_pages {
            let page = match self.client.get(node_page.as_str()).await {
                Ok(page) => page,
                Err(e) => {
                    warn!("Failed to fetch workspace page {}: {}", node_page, e);
                    continue;
                }
            };

            let zip = anchors_containing(&page.body, ZIP_MARKER)
                .into_iter()
                .find_map(|href| node_page.join(&href).ok());

            if let Some(zip) = zip {
                info!("Found workspace zip {}", zip);
                return Ok(Outcome::Found(zip.to_string()));
            }
        }

        Ok(Outcome::NotFound)
    }

    /// Run `script` on the script console of `root` and return its JSON
    /// output pretty-printed. A CSRF crumb is requested first and attached
    /// when Jenkins issues one.
    pub async fn decrypt_credentials(
        &self,
        root: &JenkinsEndpoint,
        script: &str,
    ) -> Result<Outcome<String>> {
        let headers = match self.client.fetch_crumb(root).await {
            Ok(Some(crumb)) => {
                debug!("Using crumb field {}", crumb.crumb_request_field);
                crumb.to_headers()?
            }
            Ok(None) => HeaderMap::new(),
            Err(e) => {
                warn!("Crumb request failed, posting without one: {}", e);
                HeaderMap::new()
            }
        };

        let response = self
            .client
            .post_form(&root.join(SCRIPT_TEXT_PATH), &[("script", script)], headers)
            .await?;

        if response.is_denied() {
            return Ok(Outcome::Denied);
        }

        // A Groovy stack trace or a login page both land here.
        match response.json::<Value>() {
            Some(doc) => Ok(Outcome::Found(pretty_json(&doc)?)),
            None => {
                debug!("Script console returned non-JSON output ({})", response.status);
                Ok(Outcome::NotFound)
            }
        }
    }
}

fn settle<T>(kind: ArtifactKind, build: &JenkinsEndpoint, result: Result<Outcome<T>>) -> Outcome<T> {
    match result {
        Ok(outcome) => {
            debug!("{} for {}: {}", kind.label(), build.url(), outcome.label());
            outcome
        }
        Err(e) => {
            warn!("Failed to fetch {} for {}: {}", kind.label(), build.url(), e);
            Outcome::NotFound
        }
    }
}

/// `href` of every anchor in `html` whose target contains `needle`, in
/// document order.
pub fn anchors_containing(html: &str, needle: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("a[href]").unwrap();

    document
        .select(&selector)
        .filter_map(|element| element.value().attr("href"))
        .filter(|href| href.contains(needle))
        .map(str::to_string)
        .collect()
}

/// Four-space indented JSON with sorted object keys.
fn pretty_json(value: &Value) -> Result<String> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut serializer)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}
