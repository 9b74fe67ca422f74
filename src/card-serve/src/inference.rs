use async_trait::async_trait;
use aws_sdk_sagemakerruntime::error::DisplayErrorContext;
use aws_sdk_sagemakerruntime::primitives::Blob;
use log::debug;
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::normalize::NormalizedImage;

/// Transport to a model endpoint: JSON bytes in, JSON bytes out
#[async_trait]
pub trait InferenceBackend: Send + Sync {
    async fn invoke(&self, body: Vec<u8>) -> Result<Vec<u8>>;
}

#[derive(Serialize)]
struct EndpointRequest {
    keras_tensor: Vec<Vec<[u8; 3]>>,
}

#[derive(Deserialize)]
struct EndpointResponse {
    predictions: Vec<Vec<f64>>,
}

/// Serialize an image into the body the endpoint expects
pub fn request_body(image: &NormalizedImage) -> Result<Vec<u8>> {
    serde_json::to_vec(&EndpointRequest {
        keras_tensor: image.tensor(),
    })
    .map_err(|e| Error::InferenceInvocation(format!("could not serialize payload: {}", e)))
}

/// Extract the score vector of the first (and only) input
pub fn parse_predictions(body: &[u8]) -> Result<Vec<f64>> {
    let response: EndpointResponse =
        serde_json::from_slice(body).map_err(|e| Error::ResponseShape(e.to_string()))?;

    response
        .predictions
        .into_iter()
        .next()
        .ok_or_else(|| Error::ResponseShape("'predictions' is empty".to_owned()))
}

pub struct InferenceClient {
    backend: Box<dyn InferenceBackend>,
}

impl InferenceClient {
    pub fn new(backend: Box<dyn InferenceBackend>) -> Self {
        InferenceClient { backend }
    }

    pub async fn predict(&self, image: &NormalizedImage) -> Result<Vec<f64>> {
        let body = request_body(image)?;
        debug!("Sending {} byte payload to inference endpoint", body.len());

        let response = self.backend.invoke(body).await?;
        parse_predictions(&response)
    }
}

/// A model deployed as a SageMaker real-time endpoint
pub struct SageMakerBackend {
    client: aws_sdk_sagemakerruntime::Client,
    endpoint_name: String,
}

impl SageMakerBackend {
    pub fn new(sdk_config: &aws_config::SdkConfig, endpoint_name: &str) -> Self {
        SageMakerBackend {
            client: aws_sdk_sagemakerruntime::Client::new(sdk_config),
            endpoint_name: endpoint_name.to_owned(),
        }
    }
}

#[async_trait]
impl InferenceBackend for SageMakerBackend {
    async fn invoke(&self, body: Vec<u8>) -> Result<Vec<u8>> {
        let output = self
            .client
            .invoke_endpoint()
            .endpoint_name(&self.endpoint_name)
            .content_type("application/json")
            .body(Blob::new(body))
            .send()
            .await
            .map_err(|e| Error::InferenceInvocation(DisplayErrorContext(&e).to_string()))?;

        endpoint_body(output.body, &self.endpoint_name)
    }
}

/// Bytes of an endpoint reply; an absent or empty body is a failed invocation
fn endpoint_body(body: Option<Blob>, endpoint_name: &str) -> Result<Vec<u8>> {
    let bytes = body.map(Blob::into_inner).unwrap_or_default();
    if bytes.is_empty() {
        return Err(Error::InferenceInvocation(format!(
            "endpoint '{}' returned an empty body",
            endpoint_name
        )));
    }

    Ok(bytes)
}

/// A model served over plain HTTP, e.g. a local serving container
pub struct HttpBackend {
    client: reqwest::Client,
    url: String,
}

impl HttpBackend {
    pub fn new(url: &str) -> Self {
        HttpBackend {
            client: reqwest::Client::new(),
            url: url.to_owned(),
        }
    }
}

#[async_trait]
impl InferenceBackend for HttpBackend {
    async fn invoke(&self, body: Vec<u8>) -> Result<Vec<u8>> {
        let response = self
            .client
            .post(&self.url)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| Error::InferenceInvocation(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::InferenceInvocation(format!(
                "{} answered with status {}",
                self.url, status
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::InferenceInvocation(e.to_string()))?;

        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize_bytes;
    use image::{DynamicImage, ImageOutputFormat, Rgb, RgbImage};
    use serde_json::Value;
    use std::io::Cursor;
    use std::sync::{Arc, Mutex};

    struct Canned {
        reply: Vec<u8>,
        seen: Arc<Mutex<Vec<Vec<u8>>>>,
    }

    #[async_trait]
    impl InferenceBackend for Canned {
        async fn invoke(&self, body: Vec<u8>) -> Result<Vec<u8>> {
            self.seen.lock().unwrap().push(body);
            Ok(self.reply.clone())
        }
    }

    fn red_image() -> NormalizedImage {
        let mut data = Vec::new();
        DynamicImage::ImageRgb8(RgbImage::from_pixel(10, 20, Rgb([255, 0, 0])))
            .write_to(&mut Cursor::new(&mut data), ImageOutputFormat::Png)
            .unwrap();
        normalize_bytes(&data).unwrap()
    }

    #[test]
    fn payload_is_a_224_by_224_by_3_tensor() {
        let body: Value = serde_json::from_slice(&request_body(&red_image()).unwrap()).unwrap();
        let tensor = body["keras_tensor"].as_array().unwrap();

        assert_eq!(tensor.len(), 224);
        let row = tensor[0].as_array().unwrap();
        assert_eq!(row.len(), 224);
        assert_eq!(row[0], serde_json::json!([255, 0, 0]));
    }

    #[test]
    fn first_prediction_row_is_returned() {
        let scores = parse_predictions(br#"{"predictions": [[0.25, 0.75]]}"#).unwrap();
        assert_eq!(scores, vec![0.25, 0.75]);
    }

    #[test]
    fn missing_or_empty_predictions_are_shape_errors() {
        let bodies: [&[u8]; 4] = [
            br#"{"foo": 1}"#,
            br#"{"predictions": []}"#,
            br#"{"predictions": [0.1, 0.2]}"#,
            b"<html>oops</html>",
        ];
        for body in bodies {
            assert!(matches!(
                parse_predictions(body),
                Err(Error::ResponseShape(_))
            ));
        }
    }

    #[tokio::test]
    async fn client_sends_payload_and_parses_reply() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let backend = Canned {
            reply: br#"{"predictions": [[0.1, 0.9]]}"#.to_vec(),
            seen: Arc::clone(&seen),
        };
        let client = InferenceClient::new(Box::new(backend));

        let scores = client.predict(&red_image()).await.unwrap();
        assert_eq!(scores, vec![0.1, 0.9]);

        let sent = seen.lock().unwrap();
        assert_eq!(sent.len(), 1);
        let body: Value = serde_json::from_slice(&sent[0]).unwrap();
        assert!(body.get("keras_tensor").is_some());
    }

    #[test]
    fn endpoint_reply_without_body_is_an_invocation_error() {
        for body in [None, Some(Blob::new(Vec::new()))] {
            let err = endpoint_body(body, "cards").unwrap_err();
            assert!(matches!(err, Error::InferenceInvocation(_)));
            assert!(err.to_string().contains("'cards' returned an empty body"));
        }

        let bytes = endpoint_body(Some(Blob::new(b"{}".to_vec())), "cards").unwrap();
        assert_eq!(bytes, b"{}".to_vec());
    }

    #[tokio::test]
    async fn unreachable_http_endpoint_is_an_invocation_error() {
        let backend = HttpBackend::new("http://127.0.0.1:9/invocations");
        let err = backend.invoke(b"{}".to_vec()).await.unwrap_err();
        assert!(matches!(err, Error::InferenceInvocation(_)));
    }
}
