use log::{debug, error, info};
use serde_json::{json, Value};

use crate::cors::{CorsDecision, OriginPolicy};
use crate::error::{Error, Result};
use crate::inference::InferenceClient;
use crate::labels::{self, PredictionResult};
use crate::normalize;
use crate::store::{self, ArtifactStore};
use crate::timer::StageTimer;

pub const IMAGE_FIELD: &str = "image_base64";
pub const MISSING_IMAGE: &str = "Missing 'image_base64' in request.";
pub const PREFLIGHT_OK: &str = "CORS preflight OK";

/// Transport-neutral view of an incoming HTTP event
#[derive(Debug, Clone, Default)]
pub struct InboundRequest {
    pub method: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl InboundRequest {
    pub fn new(method: &str) -> Self {
        InboundRequest {
            method: method.to_owned(),
            ..Default::default()
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_owned(), value.to_owned()));
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// First value of the named header, ignoring case
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn is_preflight(&self) -> bool {
        self.method.eq_ignore_ascii_case("OPTIONS")
    }

    /// The image field of the JSON body, unless the body is absent, not JSON,
    /// or the field is missing or null
    fn image_field(&self) -> Option<Value> {
        let body: Value = serde_json::from_str(self.body.as_deref()?).ok()?;
        match body.get(IMAGE_FIELD)? {
            Value::Null => None,
            value => Some(value.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutboundResponse {
    pub status: u16,
    pub headers: Vec<(&'static str, String)>,
    pub body: String,
}

impl OutboundResponse {
    fn json(status: u16, cors: &CorsDecision, body: Value) -> Self {
        let mut headers = vec![("Content-Type", "application/json".to_owned())];
        headers.extend(cors.headers());

        OutboundResponse {
            status,
            headers,
            body: body.to_string(),
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// The whole request pipeline: CORS, normalization, inference, label lookup
/// and artifact persistence.
pub struct CardClassifier {
    policy: OriginPolicy,
    inference: InferenceClient,
    store: Box<dyn ArtifactStore>,
    prefix: String,
}

impl CardClassifier {
    pub fn new(
        policy: OriginPolicy,
        inference: InferenceClient,
        store: Box<dyn ArtifactStore>,
        prefix: &str,
    ) -> Self {
        CardClassifier {
            policy,
            inference,
            store,
            prefix: prefix.to_owned(),
        }
    }

    /// Answer one request. Every response, errors included, carries the CORS
    /// headers decided up front.
    pub async fn handle(&self, request: &InboundRequest, request_id: &str) -> OutboundResponse {
        debug!("[{}] Received {} request", request_id, request.method);

        let cors = self.policy.decide(request);

        if request.is_preflight() {
            return OutboundResponse::json(200, &cors, json!({ "message": PREFLIGHT_OK }));
        }

        let image = match request.image_field() {
            Some(image) => image,
            None => {
                info!("[{}] Rejecting request without image", request_id);
                return OutboundResponse::json(400, &cors, json!({ "error": MISSING_IMAGE }));
            }
        };

        match self.classify(&image, request_id).await {
            Ok(result) => {
                info!(
                    "[{}] Classified as '{}' ({:.4})",
                    request_id, result.label, result.confidence
                );
                OutboundResponse::json(
                    200,
                    &cors,
                    json!({ "label": result.label, "confidence": result.confidence }),
                )
            }
            Err(err) => {
                error!("[{}] {:?} failure: {}", request_id, err.kind(), err);
                OutboundResponse::json(500, &cors, json!({ "error": err.to_string() }))
            }
        }
    }

    /// A 500 for failures outside the pipeline, e.g. a transport that could
    /// not read the request body
    pub fn error_response(&self, request: &InboundRequest, message: &str) -> OutboundResponse {
        let cors = self.policy.decide(request);
        OutboundResponse::json(500, &cors, json!({ "error": message }))
    }

    async fn classify(&self, image: &Value, request_id: &str) -> Result<PredictionResult> {
        let encoded = image
            .as_str()
            .ok_or_else(|| Error::Decode(format!("'{}' must be a string", IMAGE_FIELD)))?;

        // Nothing could be persisted, so do not pay for inference
        self.store.check()?;

        let t = StageTimer::start("Normalizing image", request_id);
        let normalized = normalize::normalize_base64(encoded)?;
        t.finish();

        let t = StageTimer::start("Invoking inference endpoint", request_id);
        let scores = self.inference.predict(&normalized).await?;
        t.finish();

        let result = labels::resolve(&scores)?;

        let t = StageTimer::start("Persisting artifacts", request_id);
        store::persist(
            self.store.as_ref(),
            &self.prefix,
            request_id,
            &normalized,
            &result,
        )
        .await?;
        t.finish();

        Ok(result)
    }
}
