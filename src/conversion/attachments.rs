use std::{
    io,
    path::{Path, PathBuf},
};
use tokio::{fs, io::AsyncWriteExt};
use tracing::{debug, warn};

use super::flatten::AttachmentSpec;
use crate::{error::AdapterError, utils::unique_token};

/// A file written for one backend invocation. Removed when dropped unless `keep` is set.
#[derive(Debug)]
pub struct AttachmentFile {
    path: PathBuf,
    keep: bool,
}

impl AttachmentFile {
    /// Writes `data` to `path`, then flushes, syncs and checks the size on disk.
    ///
    /// # Errors
    /// Returns [`AdapterError::Attachment`] when any step fails. A partially written
    /// file is removed before returning.
    pub async fn write(path: PathBuf, data: &[u8], keep: bool) -> Result<Self, AdapterError> {
        let file = Self { path, keep };
        if let Err(source) = write_synced(&file.path, data).await {
            return Err(AdapterError::Attachment {
                path: file.path.clone(),
                source,
            });
        }
        debug!("Wrote attachment file: {}", file.path.display());
        Ok(file)
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

async fn write_synced(path: &Path, data: &[u8]) -> io::Result<()> {
    let mut handle = fs::File::create(path).await?;
    handle.write_all(data).await?;
    handle.flush().await?;
    handle.sync_all().await?;
    let written = fs::metadata(path).await?.len();
    if u64::try_from(data.len()).ok() == Some(written) {
        Ok(())
    } else {
        Err(io::Error::other(format!(
            "expected {} bytes on disk, found {written}",
            data.len()
        )))
    }
}

impl Drop for AttachmentFile {
    fn drop(&mut self) {
        if self.keep {
            debug!("Keeping attachment file: {}", self.path.display());
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!("Removed attachment file: {}", self.path.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                "Failed to remove attachment file {}: {e}",
                self.path.display()
            ),
        }
    }
}

/// The prompt sent to the backend together with the files it refers to.
///
/// The files live exactly as long as this value.
#[derive(Debug, Default)]
pub struct MaterializedPrompt {
    pub prompt: String,
    pub files: Vec<AttachmentFile>,
}

impl MaterializedPrompt {
    #[must_use]
    pub fn paths(&self) -> Vec<PathBuf> {
        self.files.iter().map(|f| f.path().to_path_buf()).collect()
    }
}

/// Writes inline attachments under `dir` and points the prompt at them.
///
/// URL attachments are referenced by URL only.
///
/// # Errors
/// Returns [`AdapterError::Attachment`] when a file cannot be written. Files
/// already written for this prompt are removed before returning.
pub async fn materialize(
    user_text: &str,
    attachments: &[AttachmentSpec],
    dir: &Path,
    keep: bool,
) -> Result<MaterializedPrompt, AdapterError> {
    if attachments.is_empty() {
        return Ok(MaterializedPrompt {
            prompt: user_text.to_string(),
            files: Vec::new(),
        });
    }

    let token = unique_token();
    let mut parts = vec![user_text.to_string()];
    let mut files = Vec::new();

    for (index, attachment) in attachments.iter().enumerate() {
        match attachment {
            AttachmentSpec::Inline { data, media_type } => {
                let name = format!(
                    "vision_input_{token}_{index}.{}",
                    extension_for(media_type)
                );
                let path = dir.join(name);
                let path = std::path::absolute(&path).unwrap_or(path);
                let file = AttachmentFile::write(path, data, keep).await?;
                parts.push(format!(
                    "Please read and analyze the image file at this exact path: {}",
                    file.path().display()
                ));
                files.push(file);
            }
            AttachmentSpec::Url(url) => {
                parts.push(format!("Please analyze the image at this URL: {url}"));
            }
        }
    }

    Ok(MaterializedPrompt {
        prompt: parts.join("\n\n"),
        files,
    })
}

#[must_use]
pub fn extension_for(media_type: &str) -> String {
    media_type
        .split_once('/')
        .map(|(_, subtype)| subtype.split(['+', ';']).next().unwrap_or_default().trim())
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map_or_else(|| "bin".to_string(), str::to_ascii_lowercase)
}
