pub mod client;
pub mod discover;
pub mod error;
pub mod extract;
pub mod result;

pub use client::{Credentials, JenkinsClient, JenkinsEndpoint, TransportOptions};
pub use discover::{DiscoveryOptions, Discoverer};
pub use error::ScanError;
pub use extract::Extractor;
pub use result::{ArtifactKind, BuildLink, BuildReport, Outcome};
