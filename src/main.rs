use clap::Parser;
use dotenvy::dotenv;
use rust_image_resizer::config::ClientConfig;
use rust_image_resizer::infrastructure::storage;
use rust_image_resizer::workflow::{ClientWorkflow, Failure, WorkflowState};
use std::path::PathBuf;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(author, version, about = "Upload an image for resizing and download the result", long_about = None)]
struct Args {
    /// JPEG or PNG image to upload
    file: PathBuf,

    /// Where to save the resized image (default: ./resized_<file name>)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Override the number of existence probes
    #[arg(long)]
    max_attempts: Option<u32>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    let args = Args::parse();
    rust_image_resizer::init_tracing(false);

    let mut config = ClientConfig::from_env();
    if let Some(max_attempts) = args.max_attempts {
        config.max_attempts = max_attempts;
    }

    // Config problems are reported before any store access
    config.validate()?;
    info!(
        "🖼️  Source bucket: {:?}, target bucket: {:?}, polling {} x {:?}",
        config.source_bucket, config.target_bucket, config.max_attempts, config.poll_interval
    );

    let store = storage::setup_storage(&config.store).await?;
    let mut workflow = ClientWorkflow::new(store, &config)?;
    workflow.select(&args.file)?;
    info!("{}", workflow.status());

    let state = workflow
        .run(|wf| info!("{}", wf.status()))
        .await?;

    match state {
        WorkflowState::Ready => {
            let output = match args.output {
                Some(path) => path,
                None => workflow
                    .suggested_filename()
                    .map(PathBuf::from)
                    .ok_or(rust_image_resizer::PipelineError::NoResult)?,
            };
            let saved = workflow.save_as(&output).await?;
            info!("✅ Image saved to {}", saved.display());
            Ok(())
        }
        _ => {
            match workflow.failure() {
                Some(Failure::TimedOut { attempts }) => error!(
                    "❌ Resized image was not found in the target bucket after {} attempts",
                    attempts
                ),
                Some(Failure::Aborted(e)) => error!("❌ Processing failed: {}", e),
                None => error!("❌ {}", workflow.status()),
            }
            anyhow::bail!("{}", workflow.status())
        }
    }
}
