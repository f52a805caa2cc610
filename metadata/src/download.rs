//! The weights-download client: `list_repo_files(repo_id) -> [paths]` and
//! `download(repo_id, filename) -> local_path` (spec §1, §4.4 GGUF handling).

use futures::StreamExt;
use std::path::{Path, PathBuf};

use crate::error::MetadataError;

const HUGGINGFACE_BASE: &str = "https://huggingface.co";

pub struct WeightsDownloadClient {
    client: reqwest::Client,
    cache_dir: PathBuf,
    auth_token: Option<String>,
}

impl WeightsDownloadClient {
    pub fn new(cache_dir: impl Into<PathBuf>, auth_token: Option<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .user_agent("vram-gateway/0.1")
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            cache_dir: cache_dir.into(),
            auth_token,
        }
    }

    /// List every file path in a repo (spec's `list_repo_files`).
    pub async fn list_repo_files(&self, repo_id: &str) -> Result<Vec<String>, MetadataError> {
        if !is_valid_repo_id(repo_id) {
            return Err(MetadataError::InvalidRepoId(repo_id.to_string()));
        }

        let url = format!("{HUGGINGFACE_BASE}/api/models/{repo_id}");
        let mut request = self.client.get(&url);
        if let Some(token) = &self.auth_token {
            request = request.header("Authorization", format!("Bearer {token}"));
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(MetadataError::UpstreamStatus {
                status: response.status().as_u16(),
                action: format!("listing files for {repo_id}"),
            });
        }

        #[derive(serde::Deserialize)]
        struct Model {
            #[serde(default)]
            siblings: Vec<Sibling>,
        }
        #[derive(serde::Deserialize)]
        struct Sibling {
            rfilename: String,
        }

        let model: Model = response.json().await?;
        Ok(model.siblings.into_iter().map(|s| s.rfilename).collect())
    }

    /// Download `filename` from `repo_id` into the host cache dir,
    /// returning the local path (spec's `download`). Dispatched from an
    /// async context but performs its own streamed write, never buffering
    /// the whole file in memory (weight files run into the gigabytes).
    pub async fn download(&self, repo_id: &str, filename: &str) -> Result<PathBuf, MetadataError> {
        if !is_valid_repo_id(repo_id) {
            return Err(MetadataError::InvalidRepoId(repo_id.to_string()));
        }
        if !is_safe_file_path(filename) {
            return Err(MetadataError::UnsafePath(filename.to_string()));
        }

        let url = format!("{HUGGINGFACE_BASE}/{repo_id}/resolve/main/{filename}");
        let mut request = self.client.get(&url);
        if let Some(token) = &self.auth_token {
            request = request.header("Authorization", format!("Bearer {token}"));
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(MetadataError::UpstreamStatus {
                status: response.status().as_u16(),
                action: format!("downloading {filename} from {repo_id}"),
            });
        }

        let dest_dir = self.cache_dir.join(repo_id);
        tokio::fs::create_dir_all(&dest_dir).await?;
        let dest_path = dest_dir.join(filename_tail(filename));

        let mut file = tokio::fs::File::create(&dest_path).await?;
        let mut stream = response.bytes_stream();
        use tokio::io::AsyncWriteExt;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
        }
        file.flush().await?;

        Ok(dest_path)
    }
}

fn filename_tail(path: &str) -> &str {
    Path::new(path)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(path)
}

fn is_valid_repo_id(repo_id: &str) -> bool {
    let parts: Vec<&str> = repo_id.split('/').collect();
    if parts.len() != 2 || parts[0].is_empty() || parts[1].is_empty() {
        return false;
    }
    if repo_id.contains("..") || repo_id.contains("//") {
        return false;
    }
    repo_id
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '.' | '/'))
}

fn is_safe_file_path(file_path: &str) -> bool {
    !file_path.is_empty()
        && !file_path.contains("..")
        && !file_path.starts_with('/')
        && !file_path.starts_with('\\')
        && !file_path.contains("//")
        && !file_path.contains('\0')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_repo_ids() {
        assert!(is_valid_repo_id("owner/repo"));
        assert!(!is_valid_repo_id("justowner"));
        assert!(!is_valid_repo_id("owner/../etc"));
        assert!(!is_valid_repo_id(""));
    }

    #[test]
    fn unsafe_file_paths_rejected() {
        assert!(is_safe_file_path("model.gguf"));
        assert!(!is_safe_file_path("../model.gguf"));
        assert!(!is_safe_file_path("/etc/passwd"));
    }

    #[test]
    fn filename_tail_strips_directories() {
        assert_eq!(filename_tail("onnx/model_q4.gguf"), "model_q4.gguf");
        assert_eq!(filename_tail("model.gguf"), "model.gguf");
    }
}
