//! Bill documents: the PDF handed to the user on download.

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::debug;

use crate::error::DocumentError;

/// A loaded bill PDF.
#[derive(Debug, Clone)]
pub struct BillDocument {
    /// File name the client should save it under.
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl BillDocument {
    pub fn size_bytes(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// Where bill PDFs come from.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// Load the bill for `ban`, or the consumer bill when `None`.
    async fn load_bill(&self, ban: Option<&str>) -> Result<BillDocument, DocumentError>;
}

/// Serves one PDF asset from disk for every account.
pub struct AssetDirectory {
    path: PathBuf,
}

impl AssetDirectory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl DocumentSource for AssetDirectory {
    async fn load_bill(&self, ban: Option<&str>) -> Result<BillDocument, DocumentError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(DocumentError::NotFound(self.path.display().to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        if bytes.is_empty() {
            return Err(DocumentError::Empty {
                path: self.path.display().to_string(),
            });
        }

        let file_name = match ban {
            Some(ban) => format!("bill-{ban}.pdf"),
            None => self
                .path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "bill.pdf".to_string()),
        };
        debug!(file = %file_name, size = bytes.len(), "Loaded bill document");
        Ok(BillDocument { file_name, bytes })
    }
}
