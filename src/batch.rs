//! One-shot store-and-classify run over a single sample.

use std::fmt;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::adapters::{PostgresStore, RecordStore};
use crate::config::AppConfig;
use crate::dataset::{load_image_sample, load_mnist_sample, Sample};
use crate::domain::{NewInput, NewPrediction};
use crate::error::{LedgerError, Result};
use crate::ml::{load_classifier, Classifier};
use crate::preprocess::array_to_gray_image;

/// Where the batch run takes its sample from
#[derive(Debug, Clone)]
pub enum BatchSource {
    /// Image `index` of an MNIST IDX image/label file pair
    Idx {
        images: PathBuf,
        labels: PathBuf,
        index: usize,
    },
    /// A single image file with a known label
    Image { path: PathBuf, label: i32 },
}

impl BatchSource {
    pub fn load(&self) -> Result<Sample> {
        match self {
            Self::Idx {
                images,
                labels,
                index,
            } => load_mnist_sample(images, labels, *index),
            Self::Image { path, label } => load_image_sample(path, *label),
        }
    }
}

/// Outcome of a batch run
#[derive(Debug, Clone, PartialEq)]
pub struct BatchReport {
    pub input_data_id: i32,
    pub prediction_id: i32,
    /// `input_data_id` as read back from the stored prediction
    pub linked_input_id: i32,
    pub true_label: i32,
    pub predicted_label: i32,
    pub confidence: f32,
}

impl BatchReport {
    pub fn is_linked(&self) -> bool {
        self.linked_input_id == self.input_data_id
    }
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Input data ID:      {}", self.input_data_id)?;
        writeln!(f, "Prediction ID:      {}", self.prediction_id)?;
        writeln!(
            f,
            "Linked input ID:    {} ({})",
            self.linked_input_id,
            if self.is_linked() { "ok" } else { "MISMATCH" }
        )?;
        writeln!(f, "True label:         {}", self.true_label)?;
        writeln!(f, "Predicted label:    {}", self.predicted_label)?;
        write!(f, "Confidence:         {:.4}", self.confidence)
    }
}

/// Store `sample`, read it back and verify it, classify it and store the prediction
pub async fn run_pipeline(
    store: &dyn RecordStore,
    classifier: &dyn Classifier,
    sample: Sample,
) -> Result<BatchReport> {
    let input = NewInput::new(sample.image, sample.label);
    let input_data_id = store.insert_input(&input).await?;

    let stored = store.get_input(input_data_id).await?;
    if !stored.matches(&input) {
        return Err(LedgerError::Validation(format!(
            "input {} read back differently from what was written",
            input_data_id
        )));
    }
    info!("Retrieved image matches original: true");

    let image = stored.image.into_f32().ok_or_else(|| {
        LedgerError::Validation(format!("input {} is not float32", input_data_id))
    })?;
    let prediction = classifier.predict(&image)?;

    let prediction_id = store
        .insert_prediction(&NewPrediction {
            input_data_id,
            prediction: prediction.clone(),
        })
        .await?;
    let linked = store.get_prediction(prediction_id).await?;

    let report = BatchReport {
        input_data_id,
        prediction_id,
        linked_input_id: linked.input_data_id,
        true_label: input.true_label,
        predicted_label: prediction.label_i32(),
        confidence: prediction.confidence,
    };
    if !report.is_linked() {
        return Err(LedgerError::Validation(format!(
            "prediction {} references input {}, expected {}",
            prediction_id, report.linked_input_id, input_data_id
        )));
    }
    Ok(report)
}

fn save_sample(sample: &Sample, path: &Path) -> Result<()> {
    array_to_gray_image(&sample.image)?.save(path)?;
    info!("Sample image saved to {}", path.display());
    Ok(())
}

/// Full batch run against the configured database and model
pub async fn run_batch(
    config: &AppConfig,
    source: &BatchSource,
    save_sample_to: Option<&Path>,
) -> Result<BatchReport> {
    info!("Step 1: Connecting to database");
    let store = PostgresStore::bootstrap(&config.database, config.retry.policy()).await?;

    info!("Step 2: Loading model from {}", config.model.path().display());
    let classifier = load_classifier(config.model.path())?;

    info!("Step 3: Loading sample");
    let sample = source.load()?;
    info!(
        "Sample shape: {:?}, true label: {}",
        sample.image.shape(),
        sample.label
    );
    if let Some(path) = save_sample_to {
        save_sample(&sample, path)?;
    }

    info!("Step 4: Storing, verifying and classifying");
    let report = run_pipeline(&store, classifier.as_ref(), sample).await?;

    info!(
        input_data_id = report.input_data_id,
        prediction_id = report.prediction_id,
        predicted_label = report.predicted_label,
        confidence = report.confidence,
        "Batch run complete"
    );
    Ok(report)
}
