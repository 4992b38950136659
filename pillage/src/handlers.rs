use clap::ArgMatches;
use colored::Colorize;
use pillage_core::dispatch::{
    DispatchOptions, MAX_THREADS, default_threads, run_auto, run_build, run_list,
};
use pillage_core::report::generate_run_report;
use pillage_scanner::error::{Result, ScanError};
use pillage_scanner::{BuildLink, Credentials, JenkinsEndpoint, TransportOptions};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{Level, warn};

/// Where the credential-dump payload is looked up when `--script` is absent.
pub const DEFAULT_SCRIPT_PATH: &str = "groovy/decrypt-credentials.groovy";

/// clap value parser: the value must be an absolute http(s) URL. The string
/// is returned untouched since it names the output files.
pub fn parse_jenkins_url(value: &str) -> std::result::Result<String, String> {
    JenkinsEndpoint::new(value)
        .map(|endpoint| endpoint.url().to_string())
        .map_err(|e| e.to_string())
}

pub fn log_level(verbosity: u8) -> Level {
    match verbosity {
        0 => Level::WARN,
        1 => Level::INFO,
        _ => Level::DEBUG,
    }
}

pub fn init_tracing(verbosity: u8) {
    tracing_subscriber::fmt()
        .with_max_level(log_level(verbosity))
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

/// Basic-auth credentials from the command line. `prompt` is only called
/// when a username is given without a password.
pub fn resolve_credentials<F>(
    user: Option<&String>,
    password: Option<&String>,
    prompt: F,
) -> io::Result<Option<Credentials>>
where
    F: FnOnce() -> io::Result<String>,
{
    let Some(user) = user else {
        return Ok(None);
    };

    let password = match password {
        Some(password) => password.clone(),
        None => prompt()?,
    };

    Ok(Some(Credentials::new(user.clone(), password)))
}

pub fn prompt_password() -> io::Result<String> {
    print!("Please provide your password: ");
    io::stdout().flush()?;

    let mut response = String::new();
    io::stdin().read_line(&mut response)?;
    Ok(response.trim_end_matches(['\r', '\n']).to_string())
}

pub fn expand_path(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).as_ref())
}

/// Read the script-console payload. An explicitly requested script must
/// exist; the default one is optional and its absence only disables the
/// credential dump.
pub fn load_script(explicit: Option<&str>) -> Result<Option<String>> {
    match explicit {
        Some(path) => read_script(&expand_path(path)).map(Some),
        None => {
            let path = Path::new(DEFAULT_SCRIPT_PATH);
            if path.is_file() {
                read_script(path).map(Some)
            } else {
                warn!(
                    "No credential script at {}, skipping credential store",
                    DEFAULT_SCRIPT_PATH
                );
                Ok(None)
            }
        }
    }
}

fn read_script(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|source| ScanError::ScriptError {
        path: path.to_path_buf(),
        source,
    })
}

/// Worker count from `--threads`; zero or absent falls back to the default.
pub fn resolve_threads(requested: Option<usize>) -> usize {
    requested
        .filter(|&n| n > 0)
        .map(|n| n.min(MAX_THREADS))
        .unwrap_or_else(default_threads)
}

fn build_options(matches: &ArgMatches) -> Result<DispatchOptions> {
    let credentials = resolve_credentials(
        matches.get_one::<String>("user"),
        matches.get_one::<String>("password"),
        prompt_password,
    )?;

    // Only auto mode talks to the script console.
    let script = if matches.contains_id("auto") {
        load_script(matches.get_one::<String>("script").map(String::as_str))?
    } else {
        None
    };

    let output_dir = matches
        .get_one::<String>("output-dir")
        .map(|dir| expand_path(dir))
        .unwrap_or_else(|| PathBuf::from("."));

    Ok(DispatchOptions {
        transport: TransportOptions {
            accept_invalid_certs: !matches.get_flag("verify-tls"),
            ..TransportOptions::default()
        },
        credentials,
        force_host: matches.get_flag("force"),
        threads: resolve_threads(matches.get_one::<usize>("threads").copied()),
        output_dir,
        script,
        show_progress_bars: !matches.get_flag("quiet"),
    })
}

fn print_link(link: &BuildLink) {
    println!("{}", link);
}

/// Runs every requested mode in order: auto, list, build.
pub async fn run(matches: &ArgMatches) -> Result<()> {
    let options = build_options(matches)?;

    if let Some(root) = matches.get_one::<String>("auto") {
        handle_auto(root, &options).await?;
    }

    if let Some(root) = matches.get_one::<String>("list") {
        handle_list(root, &options).await?;
    }

    if let Some(build_url) = matches.get_one::<String>("buildurl") {
        handle_build(build_url, &options).await?;
    }

    Ok(())
}

pub async fn handle_auto(root: &str, options: &DispatchOptions) -> Result<()> {
    println!("Getting a list of all build URLs");
    println!(
        "{} Workers: {}",
        "→".blue(),
        options.threads.to_string().bright_white()
    );

    let summary = run_auto(root, options, Arc::new(print_link)).await?;

    println!("\n{} Pillage complete!\n", "✓".green().bold());
    print!("{}", generate_run_report(&summary));
    Ok(())
}

pub async fn handle_list(root: &str, options: &DispatchOptions) -> Result<()> {
    let links = run_list(root, options, Arc::new(print_link)).await?;
    if links.is_empty() {
        eprintln!("{} No builds found under {}", "⚠".yellow().bold(), root);
    }
    Ok(())
}

pub async fn handle_build(build_url: &str, options: &DispatchOptions) -> Result<()> {
    let report = run_build(build_url, options).await?;
    if report.found_kinds().is_empty() {
        eprintln!(
            "{} Nothing retrievable from {}",
            "⚠".yellow().bold(),
            build_url
        );
    }
    Ok(())
}
