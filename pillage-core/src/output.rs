// Artifact persistence: one file per found artifact, named after the URL it
// came from.

use pillage_scanner::result::render_env_vars;
use pillage_scanner::{ArtifactKind, BuildReport};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::warn;

/// Receives the `-- FOUND ...` console notices.
pub type NoticeCallback = Arc<dyn Fn(String) + Send + Sync>;

/// `http://h/job/A/5/` + console text -> `http:____h__job__A__5__.console_output`
pub fn output_filename(url: &str, kind: ArtifactKind) -> String {
    format!("{}{}", url.replace('/', "__"), kind.suffix())
}

pub struct ArtifactWriter {
    dir: PathBuf,
    notice: NoticeCallback,
}

impl ArtifactWriter {
    /// Creates `dir` if needed.
    pub fn new(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            notice: Arc::new(|msg: String| println!("{}", msg)),
        })
    }

    pub fn with_notice_callback(mut self, callback: NoticeCallback) -> Self {
        self.notice = callback;
        self
    }

    pub fn notice_callback(&self) -> NoticeCallback {
        self.notice.clone()
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn notice(&self, msg: String) {
        (self.notice)(msg);
    }

    /// Write `contents` for `url`, replacing any earlier file of the same name.
    pub fn write(&self, url: &str, kind: ArtifactKind, contents: &str) -> io::Result<PathBuf> {
        let path = self.dir.join(output_filename(url, kind));
        fs::write(&path, contents)?;
        Ok(path)
    }

    /// Persist every found artifact of `report`. A failed write is logged
    /// and does not stop the remaining artifacts.
    pub fn persist_report(&self, report: &BuildReport) -> Vec<(ArtifactKind, PathBuf)> {
        let mut written = Vec::new();

        if let Some(text) = report.console_text.found() {
            self.notice(format!("-- FOUND CONSOLE OUTPUT AT {}", report.url));
            self.persist(&report.url, ArtifactKind::ConsoleText, text, &mut written);
        }

        if let Some(zip_url) = report.workspace_zip_url.found() {
            self.notice(format!("FOUND ZIP: {}", zip_url));
            self.notice("-- FOUND WORKSPACE ZIP URL".to_string());
            self.persist(&report.url, ArtifactKind::WorkspaceZipUrl, zip_url, &mut written);
        }

        if let Some(vars) = report.env_vars.found() {
            self.notice("-- FOUND ENV VARS".to_string());
            let rendered = render_env_vars(vars);
            self.persist(&report.url, ArtifactKind::EnvVars, &rendered, &mut written);
        }

        written
    }

    fn persist(
        &self,
        url: &str,
        kind: ArtifactKind,
        contents: &str,
        written: &mut Vec<(ArtifactKind, PathBuf)>,
    ) {
        match self.write(url, kind, contents) {
            Ok(path) => written.push((kind, path)),
            Err(e) => warn!("Failed to write {} for {}: {}", kind.label(), url, e),
        }
    }
}
