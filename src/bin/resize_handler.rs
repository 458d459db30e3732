use aws_lambda_events::event::s3::S3Event;
use dotenvy::dotenv;
use lambda_runtime::{Error, LambdaEvent, run, service_fn};
use rust_image_resizer::config::HandlerConfig;
use rust_image_resizer::infrastructure::storage;
use rust_image_resizer::services::handler::ResizeHandler;
use rust_image_resizer::services::notification::{HandlerResponse, records_from_event};
use tracing::info;

async fn function_handler(
    event: LambdaEvent<S3Event>,
    handler: &ResizeHandler,
) -> Result<HandlerResponse, Error> {
    let (records, rejected) = records_from_event(&event.payload);
    info!(
        request_id = %event.context.request_id,
        "Received {} records ({} malformed)",
        records.len() + rejected,
        rejected
    );

    let result = handler.handle_with_rejected(&records, rejected).await;
    Ok(HandlerResponse::from_result(result))
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    dotenv().ok();
    rust_image_resizer::init_tracing(true);

    let config = HandlerConfig::from_env();
    let store = storage::setup_storage(&config.store).await?;
    let handler = ResizeHandler::new(store, &config);

    run(service_fn(|event| function_handler(event, &handler))).await
}
