//! Fetch client: one classified network fetch per document, with artifact
//! discovery for HTML pages and a validation gate for fetched bytes.

pub mod client;
pub mod discover;
pub mod validate;

pub use self::client::{classify_status, HttpFetcher};
pub use self::discover::{discover_artifact_url, strategies, Strategy};
pub use self::validate::validate_artifact;
