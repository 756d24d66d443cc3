use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::batch::BatchSource;
use crate::error::{LedgerError, Result};

#[derive(Parser, Debug)]
#[command(name = "digit-ledger")]
#[command(version)]
#[command(about = "Handwritten digit classifier with a Postgres-backed prediction ledger", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Directory holding default.toml and per-environment overrides
    #[arg(short, long, global = true, default_value = "config", env = "LEDGER_CONFIG_DIR")]
    pub config: PathBuf,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP prediction service
    Serve,
    /// Store, verify and classify a single sample, then exit
    Batch(BatchArgs),
    /// Create the database and tables, then exit
    InitDb,
}

#[derive(Args, Debug, Clone)]
pub struct BatchArgs {
    /// MNIST IDX image file (e.g. t10k-images-idx3-ubyte)
    #[arg(long, requires = "idx_labels", conflicts_with = "image")]
    pub idx_images: Option<PathBuf>,

    /// MNIST IDX label file matching --idx-images
    #[arg(long, requires = "idx_images")]
    pub idx_labels: Option<PathBuf>,

    /// Sample index within the IDX files
    #[arg(long, default_value_t = 0)]
    pub index: usize,

    /// Image file to classify instead of an IDX sample
    #[arg(long, requires = "label")]
    pub image: Option<PathBuf>,

    /// True label for --image
    #[arg(long, allow_hyphen_values = true)]
    pub label: Option<i32>,

    /// Write the sample as a PNG before storing it
    #[arg(long)]
    pub save_sample: Option<PathBuf>,
}

impl BatchArgs {
    pub fn source(&self) -> Result<BatchSource> {
        match (&self.idx_images, &self.idx_labels, &self.image, self.label) {
            (Some(images), Some(labels), None, _) => Ok(BatchSource::Idx {
                images: images.clone(),
                labels: labels.clone(),
                index: self.index,
            }),
            (None, None, Some(path), Some(label)) => Ok(BatchSource::Image {
                path: path.clone(),
                label,
            }),
            _ => Err(LedgerError::InvalidInput(
                "batch needs either --idx-images/--idx-labels or --image/--label".to_string(),
            )),
        }
    }
}
