//! Artifact quality gate.

use crate::domain::ErrorKind;

const PDF_MAGIC: &[u8] = b"%PDF-";

/// Validate fetched artifact bytes before they may be persisted.
///
/// A successfully fetched but invalid artifact is a fetch failure, never a
/// success: hosts under load are known to return HTTP 200 with an HTML
/// error page where the PDF should be, and counting those as downloads
/// would corrupt the success-rate signal.
pub fn validate_artifact(bytes: &[u8], content_type: Option<&str>) -> Result<(), ErrorKind> {
    if bytes.is_empty() {
        return Err(ErrorKind::InvalidArtifact);
    }

    let declared_pdf = content_type
        .map(|ct| ct.to_ascii_lowercase().contains("pdf"))
        .unwrap_or(false);

    if declared_pdf && !bytes.starts_with(PDF_MAGIC) {
        return Err(ErrorKind::InvalidArtifact);
    }

    // An HTML body where an artifact was expected is an error page.
    if !bytes.starts_with(PDF_MAGIC) && looks_like_html(bytes) {
        return Err(ErrorKind::InvalidArtifact);
    }

    Ok(())
}

fn looks_like_html(bytes: &[u8]) -> bool {
    let head: Vec<u8> = bytes
        .iter()
        .copied()
        .skip_while(|b| b.is_ascii_whitespace())
        .take(16)
        .map(|b| b.to_ascii_lowercase())
        .collect();
    head.starts_with(b"<!doctype") || head.starts_with(b"<html")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_pdf_passes() {
        assert!(validate_artifact(b"%PDF-1.7 rest of file", Some("application/pdf")).is_ok());
    }

    #[test]
    fn empty_body_is_invalid() {
        assert_eq!(
            validate_artifact(b"", Some("application/pdf")),
            Err(ErrorKind::InvalidArtifact)
        );
    }

    #[test]
    fn declared_pdf_without_magic_is_invalid() {
        assert_eq!(
            validate_artifact(b"not a pdf at all", Some("application/pdf")),
            Err(ErrorKind::InvalidArtifact)
        );
    }

    #[test]
    fn html_error_page_is_invalid() {
        let body = b"  <!DOCTYPE html><html><body>503 try later</body></html>";
        assert_eq!(
            validate_artifact(body, Some("text/html")),
            Err(ErrorKind::InvalidArtifact)
        );
    }

    #[test]
    fn pdf_with_missing_content_type_passes() {
        assert!(validate_artifact(b"%PDF-1.4 ...", None).is_ok());
    }

    #[test]
    fn non_pdf_binary_without_declared_type_passes() {
        // e.g. a scanned TIFF served with a generic content type
        assert!(validate_artifact(&[0x49, 0x49, 0x2a, 0x00, 9, 9], Some("application/octet-stream")).is_ok());
    }
}
