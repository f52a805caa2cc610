//! The model-metadata client, weights-download client, GGUF repo logic, and
//! the footprint store (spec §1 external collaborators, §4.2, §4.4).

pub mod download;
pub mod error;
pub mod footprint;
pub mod gguf;
pub mod hf_client;

pub use download::WeightsDownloadClient;
pub use error::MetadataError;
pub use footprint::FootprintStore;
pub use hf_client::{ModelConfig, ModelMetadataClient};
