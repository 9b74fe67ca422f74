//! Playing-card classification bridge.
//!
//! Takes a base64 image out of an HTTP event, brings it to the 224x224 RGB
//! shape the card model wants, asks a remote inference endpoint for class
//! scores, stores the normalized image and the verdict, and answers with the
//! label and its confidence.

pub mod config;
pub mod cors;
pub mod error;
pub mod handler;
pub mod inference;
pub mod labels;
pub mod normalize;
pub mod store;
pub mod timer;

pub use config::Config;
pub use cors::{CorsDecision, OriginPolicy};
pub use error::{Error, ErrorKind, Result};
pub use handler::{CardClassifier, InboundRequest, OutboundResponse};
pub use inference::{HttpBackend, InferenceBackend, InferenceClient, SageMakerBackend};
pub use labels::{PredictionResult, CLASS_TABLE};
pub use normalize::NormalizedImage;
pub use store::{ArtifactStore, LocalStore, S3Store};

/// Pick the inference transport the configuration asks for
pub fn inference_backend(
    config: &Config,
    sdk_config: &aws_config::SdkConfig,
) -> Box<dyn InferenceBackend> {
    match &config.inference_url {
        Some(url) => Box::new(HttpBackend::new(url)),
        None => Box::new(SageMakerBackend::new(sdk_config, &config.endpoint_name)),
    }
}
