use std::error::Error;
use std::path::PathBuf;

use card_serve::{inference, labels, normalize, HttpBackend, InferenceBackend, SageMakerBackend};
use log::info;
use structopt::StructOpt;

#[derive(StructOpt, Debug)]
#[structopt(
    name = "card-classify",
    about = "Send one image straight to the card classification endpoint"
)]
struct CmdArgs {
    #[structopt(help = "Path to the card image")]
    image_path: PathBuf,

    #[structopt(
        long,
        default_value = "playing-card-classification-endpoint",
        help = "SageMaker endpoint to invoke"
    )]
    endpoint_name: String,

    #[structopt(long, help = "Plain HTTP inference URL to use instead of SageMaker")]
    url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let args = CmdArgs::from_args();

    let data = std::fs::read(&args.image_path)?;
    let image = normalize::normalize_bytes(&data)?;

    let backend: Box<dyn InferenceBackend> = match &args.url {
        Some(url) => Box::new(HttpBackend::new(url)),
        None => {
            let sdk_config =
                aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
            Box::new(SageMakerBackend::new(&sdk_config, &args.endpoint_name))
        }
    };

    let raw = backend.invoke(inference::request_body(&image)?).await?;
    info!("Endpoint response: {}", String::from_utf8_lossy(&raw));

    let result = labels::resolve(&inference::parse_predictions(&raw)?)?;

    println!("{}", serde_json::to_string(&result)?);

    Ok(())
}
