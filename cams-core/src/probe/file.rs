//! File source probe: the path must be a readable regular file.

use super::{ConnectionProbe, ProbeOutcome, ProbeSettings, bounded, wrong_descriptor};
use crate::connection::{ConnectionDescriptor, FileDescriptor};
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Checks that a file source can be opened for reading.
#[derive(Debug, Clone)]
pub struct FileProbe {
    settings: ProbeSettings,
    cancel: CancellationToken,
}

impl FileProbe {
    /// Creates a probe bounded by `settings` and observing `cancel`.
    pub fn new(settings: ProbeSettings, cancel: CancellationToken) -> Self {
        Self { settings, cancel }
    }
}

#[async_trait]
impl ConnectionProbe for FileProbe {
    async fn test_connection(&self, descriptor: &ConnectionDescriptor) -> ProbeOutcome {
        let ConnectionDescriptor::File(d) = descriptor else {
            return wrong_descriptor("File", descriptor);
        };
        bounded(descriptor, &self.settings, &self.cancel, check(d)).await
    }
}

async fn check(d: &FileDescriptor) -> Result<String, String> {
    let path = d.path.display();
    let metadata = match tokio::fs::metadata(&d.path).await {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(format!("File not found: {path}"));
        }
        Err(e) => return Err(format!("Cannot inspect {path}: {e}")),
    };
    if !metadata.is_file() {
        return Err(format!("Not a regular file: {path}"));
    }
    tokio::fs::File::open(&d.path)
        .await
        .map_err(|e| format!("File is not readable: {path}: {e}"))?;
    Ok(format!("File accessible ({} bytes)", metadata.len()))
}
