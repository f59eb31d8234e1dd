//! Local filesystem artifact store.

use std::path::PathBuf;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio::io::AsyncWriteExt;

use crate::domain::DocId;
use crate::ports::{ArtifactStore, StoredArtifact};

/// Stores artifacts under a root directory, one file per record id.
///
/// Layout: `<root>/<id>.pdf`. Writes go to a `.part` file first and are
/// renamed into place, so a crash mid-write never leaves a truncated file
/// at the final path.
pub struct LocalArtifactStore {
    root: PathBuf,
}

impl LocalArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, id: DocId) -> PathBuf {
        self.root.join(format!("{id}.pdf"))
    }
}

#[async_trait]
impl ArtifactStore for LocalArtifactStore {
    async fn put(&self, id: DocId, bytes: &[u8]) -> Result<StoredArtifact, std::io::Error> {
        tokio::fs::create_dir_all(&self.root).await?;

        let final_path = self.path_for(id);
        let tmp_path = final_path.with_extension("pdf.part");

        let mut file = tokio::fs::File::create(&tmp_path).await?;
        file.write_all(bytes).await?;
        file.sync_all().await?;
        drop(file);
        tokio::fs::rename(&tmp_path, &final_path).await?;

        let sha256 = format!("{:x}", Sha256::digest(bytes));
        Ok(StoredArtifact {
            path: final_path.to_string_lossy().into_owned(),
            size: bytes.len() as u64,
            sha256,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_root(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!("docket-store-{tag}-{}", DocId::new()))
    }

    #[tokio::test]
    async fn put_writes_file_and_reports_metadata() {
        let root = temp_root("put");
        let store = LocalArtifactStore::new(&root);
        let id = DocId::new();

        let stored = store.put(id, b"%PDF-1.7 body").await.unwrap();
        assert_eq!(stored.size, 13);
        assert!(stored.path.ends_with(&format!("{id}.pdf")));
        assert_eq!(stored.sha256.len(), 64);

        let on_disk = tokio::fs::read(&stored.path).await.unwrap();
        assert_eq!(on_disk, b"%PDF-1.7 body");

        tokio::fs::remove_dir_all(&root).await.unwrap();
    }

    #[tokio::test]
    async fn put_overwrites_previous_content() {
        let root = temp_root("overwrite");
        let store = LocalArtifactStore::new(&root);
        let id = DocId::new();

        store.put(id, b"%PDF- old").await.unwrap();
        let stored = store.put(id, b"%PDF- newer contents").await.unwrap();

        let on_disk = tokio::fs::read(&stored.path).await.unwrap();
        assert_eq!(on_disk, b"%PDF- newer contents");

        tokio::fs::remove_dir_all(&root).await.unwrap();
    }
}
