use anyhow::Result;
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::info;
use uuid::Uuid;

/// On-disk storage for uploaded evidence files.
///
/// Files land at `{dir}/{uuid}_{sanitized_name}` — the uuid prefix avoids
/// collisions, the sanitization strips path separators so a hostile
/// filename cannot traverse out of the vault. Stored bytes survive a wipe.
pub struct Vault {
    dir: PathBuf,
}

impl Vault {
    pub async fn new(dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&dir).await?;
        info!("Upload vault directory: {}", dir.display());
        Ok(Self { dir })
    }

    /// Start writing a new file. Bytes are hashed incrementally as they are
    /// written, so arbitrarily large uploads hash in bounded memory.
    pub async fn writer(&self, original_name: &str) -> Result<FileSink> {
        let name = sanitize_name(original_name);
        let stored_name = format!("{}_{}", Uuid::new_v4(), name);
        let path = self.dir.join(&stored_name);
        let file = fs::File::create(&path).await?;

        Ok(FileSink {
            name,
            path,
            file,
            hasher: Sha256::new(),
            size: 0,
        })
    }
}

/// In-progress vault write: file handle plus a running SHA-256.
pub struct FileSink {
    name: String,
    path: PathBuf,
    file: fs::File,
    hasher: Sha256,
    size: i64,
}

impl FileSink {
    pub async fn write(&mut self, chunk: &[u8]) -> Result<()> {
        self.file.write_all(chunk).await?;
        self.hasher.update(chunk);
        self.size += chunk.len() as i64;
        Ok(())
    }

    pub async fn finish(mut self) -> Result<StoredFile> {
        self.file.flush().await?;
        let sha256 = hex::encode(self.hasher.finalize());

        Ok(StoredFile {
            name: self.name,
            path: self.path.to_string_lossy().into_owned(),
            size: self.size,
            sha256,
        })
    }
}

/// Metadata for a file that made it into the vault.
#[derive(Debug, Clone)]
pub struct StoredFile {
    pub name: String,
    pub path: String,
    pub size: i64,
    pub sha256: String,
}

/// Strip path separators out of a client-supplied filename.
pub fn sanitize_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if c == '/' || c == '\\' { '_' } else { c })
        .collect();
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn temp_vault() -> Vault {
        let dir = std::env::temp_dir().join(format!("lynx-vault-test-{}", Uuid::new_v4()));
        Vault::new(dir).await.unwrap()
    }

    #[test]
    fn sanitize_strips_path_separators() {
        assert_eq!(sanitize_name("report.pdf"), "report.pdf");
        assert_eq!(sanitize_name("../../etc/passwd"), ".._.._etc_passwd");
        assert_eq!(sanitize_name("a\\b/c"), "a_b_c");
        assert_eq!(sanitize_name(""), "upload");
    }

    #[tokio::test]
    async fn incremental_hash_matches_one_shot_digest() {
        let vault = temp_vault().await;
        let bytes = b"dashcam footage, allegedly";

        let mut sink = vault.writer("clip.bin").await.unwrap();
        // Feed in small pieces to exercise the incremental path.
        for chunk in bytes.chunks(5) {
            sink.write(chunk).await.unwrap();
        }
        let stored = sink.finish().await.unwrap();

        let expected = hex::encode(Sha256::digest(bytes));
        assert_eq!(stored.sha256, expected);
        assert_eq!(stored.size, bytes.len() as i64);

        let on_disk = tokio::fs::read(&stored.path).await.unwrap();
        assert_eq!(on_disk, bytes);
    }

    #[tokio::test]
    async fn identical_bytes_produce_identical_hashes_distinct_paths() {
        let vault = temp_vault().await;
        let bytes = b"same bytes twice";

        let mut a = vault.writer("one.bin").await.unwrap();
        a.write(bytes).await.unwrap();
        let a = a.finish().await.unwrap();

        let mut b = vault.writer("one.bin").await.unwrap();
        b.write(bytes).await.unwrap();
        let b = b.finish().await.unwrap();

        assert_eq!(a.sha256, b.sha256);
        assert_ne!(a.path, b.path);
    }
}
