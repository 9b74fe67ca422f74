use hyper::server::conn::AddrStream;
use hyper::service::{make_service_fn, service_fn};
use hyper::{body, Body, Request, Response, Server};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use card_serve::{
    CardClassifier, Config, InboundRequest, InferenceClient, LocalStore, OriginPolicy,
    OutboundResponse,
};
use chrono::Utc;
use log::{error, info};

static NEXT_REQUEST: AtomicU64 = AtomicU64::new(0);

fn next_request_id() -> String {
    format!(
        "{}-{}",
        Utc::now().format("%Y%m%dT%H%M%S%3f"),
        NEXT_REQUEST.fetch_add(1, Ordering::SeqCst)
    )
}

async fn handle(
    req: Request<Body>,
    classifier: Arc<CardClassifier>,
) -> Result<Response<Body>, Infallible> {
    let request_id = next_request_id();
    let (parts, body) = req.into_parts();

    let mut inbound = InboundRequest {
        method: parts.method.as_str().to_owned(),
        headers: parts
            .headers
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_owned(), value.to_owned()))
            })
            .collect(),
        body: None,
    };

    let raw = match body::to_bytes(body).await {
        Ok(raw) => raw,
        Err(err) => {
            error!("[{}] Could not read request body: {}", request_id, err);
            let message = format!("Could not read request body: {}", err);
            return Ok(render(classifier.error_response(&inbound, &message), &request_id));
        }
    };

    if !raw.is_empty() {
        inbound.body = Some(String::from_utf8_lossy(&raw).into_owned());
    }

    let response = classifier.handle(&inbound, &request_id).await;

    Ok(render(response, &request_id))
}

fn render(response: OutboundResponse, request_id: &str) -> Response<Body> {
    let mut builder = Response::builder().status(response.status);
    for (name, value) in &response.headers {
        builder = builder.header(*name, value.as_str());
    }

    builder
        .body(Body::from(response.body))
        .unwrap_or_else(|err| {
            error!("[{}] Could not render response: {}", request_id, err);
            let mut fallback = Response::new(Body::empty());
            *fallback.status_mut() = hyper::StatusCode::INTERNAL_SERVER_ERROR;
            fallback
        })
}

#[tokio::main]
async fn main() {
    env_logger::init();

    let config = Config::from_env();
    let sdk_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;

    let classifier = Arc::new(CardClassifier::new(
        OriginPolicy::new(config.allowed_origins.clone()),
        InferenceClient::new(card_serve::inference_backend(&config, &sdk_config)),
        Box::new(LocalStore::new(&config.artifact_dir)),
        &config.prefix,
    ));

    let make_service = make_service_fn(move |_conn: &AddrStream| {
        let classifier = Arc::clone(&classifier);

        let service = service_fn(move |req| handle(req, classifier.clone()));

        async move { Ok::<_, Infallible>(service) }
    });

    let addr = SocketAddr::from(([127, 0, 0, 1], 3000));
    info!(
        "Serving on http://{}, artifacts under {}",
        addr, config.artifact_dir
    );

    let server = Server::bind(&addr).serve(make_service);

    if let Err(e) = server.await {
        error!("server error: {}", e);
    }
}
