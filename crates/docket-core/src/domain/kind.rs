//! Document kind classification.

use std::fmt;

use serde::{Deserialize, Serialize};

/// What shape of resource a source URL points at.
///
/// Determined once from the URL at ingestion and never changed:
/// - `DirectPdf`: the URL is the artifact itself, no page parse needed.
/// - `FullDocument`: an HTML page that embeds a reference to the artifact.
/// - `Fragment`: a sub-page anchor that is known to never expose a
///   downloadable artifact. Fragments are permanently ineligible for
///   download; attempting them burns a rate-limited request slot for
///   nothing and skews the observed success rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocKind {
    FullDocument,
    Fragment,
    DirectPdf,
}

impl DocKind {
    /// Classify a source URL by shape.
    pub fn classify(url: &str) -> Self {
        if url.contains('#') {
            return DocKind::Fragment;
        }
        // Query-less ".pdf" suffix or an explicit pdf download query both
        // mark a direct artifact URL.
        let path = url.split('?').next().unwrap_or(url);
        if path.to_ascii_lowercase().ends_with(".pdf") {
            return DocKind::DirectPdf;
        }
        DocKind::FullDocument
    }

    /// Fragments never carry a downloadable artifact.
    pub fn is_downloadable(self) -> bool {
        !matches!(self, DocKind::Fragment)
    }

    /// Stable string code used for persistence.
    pub fn as_str(self) -> &'static str {
        match self {
            DocKind::FullDocument => "full_document",
            DocKind::Fragment => "fragment",
            DocKind::DirectPdf => "direct_pdf",
        }
    }

    /// Parse a persisted string code.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "full_document" => Some(DocKind::FullDocument),
            "fragment" => Some(DocKind::Fragment),
            "direct_pdf" => Some(DocKind::DirectPdf),
            _ => None,
        }
    }
}

impl fmt::Display for DocKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
