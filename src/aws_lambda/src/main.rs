use card_serve::{CardClassifier, Config, InboundRequest, InferenceClient, OriginPolicy, S3Store};
use lambda_http::{run, service_fn, Body, Error, Request, RequestExt, Response};
use log::debug;

#[tokio::main]
async fn main() -> Result<(), Error> {
    env_logger::init();

    let config = Config::from_env();
    let sdk_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;

    let classifier = CardClassifier::new(
        OriginPolicy::new(config.allowed_origins.clone()),
        InferenceClient::new(card_serve::inference_backend(&config, &sdk_config)),
        Box::new(S3Store::new(&sdk_config, config.bucket.clone())),
        &config.prefix,
    );

    debug!("Loaded configuration: {:?}", config);

    let classifier_ref = &classifier;

    let handler_closure =
        move |event: Request| async move { handle_request(event, classifier_ref).await };

    debug!("Dispatching handler");
    run(service_fn(handler_closure)).await
}

/// Invocation id used to namespace artifacts. Without it two requests could
/// share a key, so refuse the event instead.
fn request_id(event: &Request) -> Result<String, Error> {
    event
        .lambda_context_ref()
        .map(|ctx| ctx.request_id.clone())
        .filter(|id| !id.is_empty())
        .ok_or_else(|| Error::from("invocation has no Lambda request id"))
}

async fn handle_request(
    event: Request,
    classifier: &CardClassifier,
) -> Result<Response<Body>, Error> {
    let request_id = request_id(&event)?;

    let inbound = InboundRequest {
        method: event.method().as_str().to_owned(),
        headers: event
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_owned(), value.to_owned()))
            })
            .collect(),
        body: match event.body() {
            Body::Empty => None,
            Body::Text(text) => Some(text.clone()),
            Body::Binary(bytes) => Some(String::from_utf8_lossy(bytes).into_owned()),
        },
    };

    let response = classifier.handle(&inbound, &request_id).await;

    let mut builder = Response::builder().status(response.status);
    for (name, value) in &response.headers {
        builder = builder.header(*name, value.as_str());
    }

    Ok(builder.body(Body::Text(response.body))?)
}
