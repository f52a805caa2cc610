//! The model-metadata client: `fetch_config(repo_id) -> {max_position_embeddings?, ...}`.

use serde::Deserialize;

use crate::error::MetadataError;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModelConfig {
    pub max_position_embeddings: Option<i64>,
    pub n_positions: Option<i64>,
    pub model_max_length: Option<i64>,
}

impl ModelConfig {
    /// First of `max_position_embeddings`, `n_positions`, `model_max_length`
    /// that is present AND positive, in that order (spec §4.4 "Max-length
    /// discovery"). A key present with a non-positive value is treated as
    /// absent and the search continues to the next key. 0 if none qualify.
    pub fn max_len(&self) -> u64 {
        self.max_position_embeddings
            .filter(|n| *n > 0)
            .or(self.n_positions.filter(|n| *n > 0))
            .or(self.model_max_length.filter(|n| *n > 0))
            .map(|n| n as u64)
            .unwrap_or(0)
    }
}

pub struct ModelMetadataClient {
    client: reqwest::Client,
    auth_token: Option<String>,
}

impl ModelMetadataClient {
    pub fn new(auth_token: Option<String>) -> Self {
        Self { client: reqwest::Client::new(), auth_token }
    }

    /// Fetch `config.json` for `repo` from the HuggingFace resolve endpoint.
    /// Network errors or absent keys are the caller's problem to default to
    /// 0 (spec §4.4): this returns `Err` on any failure so the launcher can
    /// log it, but callers should treat failure as "max_len unknown".
    pub async fn fetch_config(&self, repo: &str) -> Result<ModelConfig, MetadataError> {
        let url = format!("https://huggingface.co/{repo}/raw/main/config.json");

        let mut request = self.client.get(&url);
        if let Some(token) = &self.auth_token {
            request = request.header("Authorization", format!("Bearer {token}"));
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(MetadataError::UpstreamStatus {
                status: response.status().as_u16(),
                action: format!("fetching config.json for {repo}"),
            });
        }

        Ok(response.json::<ModelConfig>().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_len_prefers_max_position_embeddings() {
        let cfg = ModelConfig {
            max_position_embeddings: Some(4096),
            n_positions: Some(2048),
            model_max_length: Some(1024),
        };
        assert_eq!(cfg.max_len(), 4096);
    }

    #[test]
    fn max_len_falls_back_through_keys() {
        let cfg = ModelConfig { max_position_embeddings: None, n_positions: None, model_max_length: Some(8192) };
        assert_eq!(cfg.max_len(), 8192);
    }

    #[test]
    fn max_len_zero_when_all_absent() {
        let cfg = ModelConfig::default();
        assert_eq!(cfg.max_len(), 0);
    }

    #[test]
    fn max_len_ignores_non_positive_values() {
        let cfg = ModelConfig { max_position_embeddings: Some(0), n_positions: Some(-1), model_max_length: Some(2048) };
        assert_eq!(cfg.max_len(), 2048);
    }
}
