use crate::client::{JenkinsClient, JenkinsEndpoint};
use crate::error::Result;
use crate::result::BuildLink;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

const API_SUFFIX: &str = "api/json/";

/// Invoked once per build link, in discovery order.
pub type LinkCallback = Arc<dyn Fn(&BuildLink) + Send + Sync>;

#[derive(Debug, Clone, Default)]
pub struct DiscoveryOptions {
    /// Rewrite the network location of every URL Jenkins reports to the one
    /// we are actually talking to. Useful when Jenkins believes it lives at
    /// `localhost` or an internal hostname.
    pub force_host: bool,
}

/// Walks the `jobs`/`builds`/`endpoint` tree of the Jenkins JSON API and
/// collects the latest build of every job it reaches.
pub struct Discoverer {
    client: JenkinsClient,
    options: DiscoveryOptions,
    link_callback: Option<LinkCallback>,
}

impl Discoverer {
    pub fn new(client: JenkinsClient, options: DiscoveryOptions) -> Self {
        Self {
            client,
            options,
            link_callback: None,
        }
    }

    pub fn with_link_callback(mut self, callback: LinkCallback) -> Self {
        self.link_callback = Some(callback);
        self
    }

    /// Depth-first traversal from `root_url`.
    ///
    /// Only an invalid root URL is an error. Nodes that fail to load or are
    /// not JSON prune their own subtree and nothing else. Each API URL is
    /// fetched at most once, so cyclic trees terminate.
    pub async fn discover(&self, root_url: &str) -> Result<Vec<BuildLink>> {
        let root = normalize_root(root_url);
        JenkinsEndpoint::new(&root)?;
        info!("Starting discovery at {}", root);

        let mut stack = vec![root];
        let mut visited: HashSet<String> = HashSet::new();
        let mut links = Vec::new();

        while let Some(url) = stack.pop() {
            if !visited.insert(url.clone()) {
                debug!("Skipping already visited {}", url);
                continue;
            }

            let origin = match Url::parse(&url) {
                Ok(origin) => origin,
                Err(e) => {
                    warn!("Skipping unparsable API URL {}: {}", url, e);
                    continue;
                }
            };

            let node = match self.client.get(&url).await {
                Ok(response) => match response.json::<Value>() {
                    Some(node) => node,
                    None => {
                        debug!("{} did not return JSON ({}), pruning", url, response.status);
                        continue;
                    }
                },
                Err(e) => {
                    warn!("Failed to fetch {}: {}", url, e);
                    continue;
                }
            };

            if let Some(build_url) = latest_build_url(&node) {
                let link = BuildLink::new(self.rewrite(build_url, &origin));
                info!("Found build {}", link);
                if let Some(ref callback) = self.link_callback {
                    callback(&link);
                }
                links.push(link);
            }

            let mut children: Vec<String> = node
                .get("jobs")
                .and_then(Value::as_array)
                .map(|jobs| {
                    jobs.iter()
                        .filter_map(|job| job.get("url").and_then(Value::as_str))
                        .map(|job_url| self.rewrite(&child_api_url(job_url), &origin))
                        .collect()
                })
                .unwrap_or_default();

            if let Some(endpoint) = node.get("endpoint").and_then(Value::as_str) {
                children.push(self.rewrite(&child_api_url(endpoint), &origin));
            }

            // Reverse so the first child is popped first.
            stack.extend(children.into_iter().rev());
        }

        info!(
            "Discovery complete: {} builds from {} API nodes",
            links.len(),
            visited.len()
        );
        Ok(links)
    }

    fn rewrite(&self, url: &str, origin: &Url) -> String {
        if self.options.force_host {
            force_netloc(url, origin)
        } else {
            url.to_string()
        }
    }
}

/// First entry of a non-empty `builds` list. Jenkins lists builds newest
/// first.
fn latest_build_url(node: &Value) -> Option<&str> {
    node.get("builds")
        .and_then(Value::as_array)
        .and_then(|builds| builds.first())
        .and_then(|build| build.get("url"))
        .and_then(Value::as_str)
}

/// Point a user-supplied URL at the JSON API unless it already is.
pub fn normalize_root(url: &str) -> String {
    if url.contains("api/json") {
        url.to_string()
    } else {
        format!("{}/{}", url.trim_end_matches('/'), API_SUFFIX)
    }
}

/// JSON API URL for a job or endpoint URL reported by Jenkins.
pub fn child_api_url(url: &str) -> String {
    if url.ends_with('/') {
        format!("{}{}", url, API_SUFFIX)
    } else {
        format!("{}/{}", url, API_SUFFIX)
    }
}

/// Replace the network location (credentials, host and port) of `url` with
/// that of `origin`. Scheme, path, query and fragment are kept. URLs that
/// do not parse are returned unchanged.
pub fn force_netloc(url: &str, origin: &Url) -> String {
    let Ok(mut target) = Url::parse(url) else {
        return url.to_string();
    };

    if target.set_host(origin.host_str()).is_err() || target.set_port(origin.port()).is_err() {
        return url.to_string();
    }
    // Only fails for URLs without a host, which set_host ruled out.
    let _ = target.set_username(origin.username());
    let _ = target.set_password(origin.password());

    target.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::TransportOptions;
    use serde_json::json;
    use std::sync::Mutex;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{method, path},
    };

    fn discoverer(force_host: bool) -> Discoverer {
        let client = JenkinsClient::new(&TransportOptions::default(), None).unwrap();
        Discoverer::new(client, DiscoveryOptions { force_host })
    }

    async fn mount_json(server: &MockServer, at: &str, body: Value) {
        Mock::given(method("GET"))
            .and(path(at))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(server)
            .await;
    }

    #[test]
    fn test_normalize_root_appends_api_suffix() {
        assert_eq!(normalize_root("http://h"), "http://h/api/json/");
        assert_eq!(normalize_root("http://h/"), "http://h/api/json/");
        assert_eq!(normalize_root("http://h/api/json"), "http://h/api/json");
    }

    #[test]
    fn test_child_api_url() {
        assert_eq!(child_api_url("http://h/job/A/"), "http://h/job/A/api/json/");
        assert_eq!(child_api_url("http://h/job/A"), "http://h/job/A/api/json/");
    }

    #[test]
    fn test_force_netloc_replaces_only_network_location() {
        let origin = Url::parse("https://jenkins.example.com:8443/api/json/").unwrap();
        let rewritten = force_netloc("http://localhost:8080/job/A/5/?depth=1#top", &origin);
        assert_eq!(rewritten, "http://jenkins.example.com:8443/job/A/5/?depth=1#top");
    }

    #[test]
    fn test_force_netloc_drops_port_when_origin_has_none() {
        let origin = Url::parse("http://jenkins/api/json/").unwrap();
        assert_eq!(
            force_netloc("http://127.0.0.1:8080/job/A/", &origin),
            "http://jenkins/job/A/"
        );
    }

    #[test]
    fn test_force_netloc_leaves_garbage_alone() {
        let origin = Url::parse("http://jenkins/").unwrap();
        assert_eq!(force_netloc("not a url", &origin), "not a url");
    }

    #[tokio::test]
    async fn test_job_yields_only_latest_build() {
        let server = MockServer::start().await;
        mount_json(
            &server,
            "/api/json/",
            json!({"builds": [
                {"url": "http://h/job/A/5/"},
                {"url": "http://h/job/A/4/"},
                {"url": "http://h/job/A/3/"}
            ]}),
        )
        .await;

        let links = discoverer(false).discover(&server.uri()).await.unwrap();
        assert_eq!(links, vec![BuildLink::from("http://h/job/A/5/")]);
    }

    #[tokio::test]
    async fn test_child_job_api_is_fetched() {
        let server = MockServer::start().await;
        mount_json(
            &server,
            "/api/json/",
            json!({"jobs": [{"url": format!("{}/job/A/", server.uri())}]}),
        )
        .await;

        Mock::given(method("GET"))
            .and(path("/job/A/api/json/"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"builds": [{"url": "http://h/job/A/5/"}]})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let links = discoverer(false).discover(&server.uri()).await.unwrap();
        assert_eq!(links, vec![BuildLink::from("http://h/job/A/5/")]);
    }

    #[tokio::test]
    async fn test_leaf_without_known_keys_is_empty() {
        let server = MockServer::start().await;
        mount_json(&server, "/api/json/", json!({"name": "idle", "builds": []})).await;

        let links = discoverer(false).discover(&server.uri()).await.unwrap();
        assert!(links.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_sibling_does_not_abort_traversal() {
        let server = MockServer::start().await;
        let uri = server.uri();
        mount_json(
            &server,
            "/api/json/",
            json!({"jobs": [
                {"url": format!("{}/job/broken/", uri)},
                {"url": format!("{}/job/ok/", uri)}
            ]}),
        )
        .await;

        Mock::given(method("GET"))
            .and(path("/job/broken/api/json/"))
            .respond_with(ResponseTemplate::new(500).set_body_string("<html>Oops</html>"))
            .mount(&server)
            .await;

        mount_json(
            &server,
            "/job/ok/api/json/",
            json!({"builds": [{"url": "http://h/job/ok/7/"}]}),
        )
        .await;

        let links = discoverer(false).discover(&uri).await.unwrap();
        assert_eq!(links, vec![BuildLink::from("http://h/job/ok/7/")]);
    }

    #[tokio::test]
    async fn test_traversal_order_is_depth_first() {
        let server = MockServer::start().await;
        let uri = server.uri();
        mount_json(
            &server,
            "/api/json/",
            json!({
                "builds": [{"url": "http://h/root/1/"}],
                "jobs": [
                    {"url": format!("{}/job/folder/", uri)},
                    {"url": format!("{}/job/B/", uri)}
                ],
                "endpoint": format!("{}/plugin/", uri)
            }),
        )
        .await;
        mount_json(
            &server,
            "/job/folder/api/json/",
            json!({"jobs": [{"url": format!("{}/job/folder/job/A1/", uri)}]}),
        )
        .await;
        mount_json(
            &server,
            "/job/folder/job/A1/api/json/",
            json!({"builds": [{"url": "http://h/job/folder/job/A1/3/"}]}),
        )
        .await;
        mount_json(
            &server,
            "/job/B/api/json/",
            json!({"builds": [{"url": "http://h/job/B/9/"}]}),
        )
        .await;
        mount_json(
            &server,
            "/plugin/api/json/",
            json!({"builds": [{"url": "http://h/plugin/2/"}]}),
        )
        .await;

        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let links = discoverer(false)
            .with_link_callback(Arc::new(move |link: &BuildLink| {
                seen_clone.lock().unwrap().push(link.to_string());
            }))
            .discover(&uri)
            .await
            .unwrap();

        let expected = vec![
            "http://h/root/1/",
            "http://h/job/folder/job/A1/3/",
            "http://h/job/B/9/",
            "http://h/plugin/2/",
        ];
        let found: Vec<&str> = links.iter().map(BuildLink::as_str).collect();
        assert_eq!(found, expected);
        assert_eq!(*seen.lock().unwrap(), expected);
    }

    #[tokio::test]
    async fn test_cycle_terminates() {
        let server = MockServer::start().await;
        let uri = server.uri();
        mount_json(
            &server,
            "/api/json/",
            json!({
                "builds": [{"url": "http://h/job/loop/1/"}],
                "jobs": [{"url": format!("{}/", uri)}]
            }),
        )
        .await;

        let links = discoverer(false).discover(&uri).await.unwrap();
        assert_eq!(links, vec![BuildLink::from("http://h/job/loop/1/")]);
    }

    #[tokio::test]
    async fn test_force_host_follows_loopback_job_urls() {
        let server = MockServer::start().await;
        mount_json(
            &server,
            "/api/json/",
            json!({"jobs": [{"url": "http://localhost:1/job/A/"}]}),
        )
        .await;
        mount_json(
            &server,
            "/job/A/api/json/",
            json!({"builds": [{"url": "http://localhost:1/job/A/5/?x=1"}]}),
        )
        .await;

        let links = discoverer(true).discover(&server.uri()).await.unwrap();
        assert_eq!(
            links,
            vec![BuildLink::new(format!("{}/job/A/5/?x=1", server.uri()))]
        );
    }

    #[tokio::test]
    async fn test_force_host_follows_loopback_endpoint() {
        let server = MockServer::start().await;
        mount_json(
            &server,
            "/api/json/",
            json!({"endpoint": "http://127.0.0.1:1/blue/rest/"}),
        )
        .await;
        mount_json(
            &server,
            "/blue/rest/api/json/",
            json!({"builds": [{"url": "http://127.0.0.1:1/job/P/9/"}]}),
        )
        .await;

        let links = discoverer(true).discover(&server.uri()).await.unwrap();
        assert_eq!(
            links,
            vec![BuildLink::new(format!("{}/job/P/9/", server.uri()))]
        );
    }

    #[tokio::test]
    async fn test_invalid_root_is_an_error() {
        let result = discoverer(false).discover("jenkins.local").await;
        assert!(result.is_err());
    }
}
