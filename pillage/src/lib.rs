// Include handlers module directly from handlers.rs
#[path = "handlers.rs"]
pub mod handlers;

pub use handlers::{load_script, log_level, parse_jenkins_url, resolve_credentials, resolve_threads};
