//! Trainable next-token model and autoregressive generation.
//!
//! - The model boundary (`Predictor`, `LanguageModel`)
//! - A built-in dense network (`FeedForwardModel`) and its checkpoint format
//! - Temperature sampling and the generation loop (`Generator`)

use std::path::{Path, PathBuf};

use rand::Rng;

use crate::config::{ConfigError, ModelConfig, TrainingOptions};
use crate::text::{TokenId, TrainingPair};

/// Checkpoint directory layout and load policy.
///
/// A missing checkpoint, a corrupt one and a mismatched one are three
/// distinct errors.
pub mod checkpoint;

/// Generation loop: window, predict, rescale, draw, stop.
pub mod generator;

/// Per-call generation parameters (length cap, temperature).
pub mod generation_input;

/// Embedding → dense blocks → softmax network on `burn`.
pub mod network;

/// Temperature scaling and multinomial draws with an explicit rng.
pub mod sampling;

pub use generation_input::GenerationInput;
pub use generator::{Generation, Generator, StopReason};
pub use network::FeedForwardModel;

/// Errors raised by models and checkpoints.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
	#[error(transparent)]
	InvalidConfig(#[from] ConfigError),

	#[error("window must hold {expected} ids, got {got}")]
	InvalidWindow {
		expected: usize,
		got: usize,
	},

	#[error("token id {id} is outside the vocabulary (size {vocab_size})")]
	TokenOutOfRange {
		id: TokenId,
		vocab_size: usize,
	},

	#[error("no training pairs: the corpus is too short for the window length")]
	EmptyTrainingSet,

	#[error("no checkpoint in {0}")]
	CheckpointNotFound(PathBuf),

	#[error("checkpoint in {path} is unreadable: {reason}")]
	CorruptCheckpoint {
		path: PathBuf,
		reason: String,
	},

	#[error("checkpoint configuration {stored:?} does not match declared configuration {declared:?}")]
	ConfigMismatch {
		declared: Box<ModelConfig>,
		stored: Box<ModelConfig>,
	},

	#[error("tensor read-back failed: {0}")]
	Tensor(String),

	#[error("serialization failed: {0}")]
	Serialization(String),

	#[error("checkpoint I/O failed: {0}")]
	Io(#[from] std::io::Error),
}

/// Anything that maps a fixed-length id window to a distribution over ids.
///
/// This is all the generator needs from a model.
pub trait Predictor {
	/// Number of ids the model expects per window.
	fn window_len(&self) -> usize;

	/// Returns a probability distribution over vocabulary ids (sums to 1).
	fn predict(&self, window: &[TokenId]) -> Result<Vec<f32>, ModelError>;
}

/// Metrics of one training epoch.
#[derive(Clone, Debug, PartialEq)]
pub struct EpochMetrics {
	pub epoch: usize,
	pub loss: f32,
	pub accuracy: f32,
	pub val_loss: Option<f32>,
	pub val_accuracy: Option<f32>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct TrainingMetrics {
	pub epochs: Vec<EpochMetrics>,
}

impl TrainingMetrics {
	/// Training loss of the last epoch.
	pub fn final_loss(&self) -> Option<f32> {
		self.epochs.last().map(|e| e.loss)
	}
}

/// A trainable, persistable [`Predictor`].
///
/// Training mutates the model and runs to completion; there is no
/// cancellation. Once trained, the model is only read.
pub trait LanguageModel: Predictor {
	fn config(&self) -> &ModelConfig;

	/// Fits the model on `pairs` and returns per-epoch metrics.
	///
	/// # Errors
	/// - [`ModelError::EmptyTrainingSet`] if there is nothing to train on.
	/// - [`ModelError::InvalidWindow`] / [`ModelError::TokenOutOfRange`] for malformed pairs.
	fn train<R: Rng + ?Sized>(
		&mut self,
		pairs: &[TrainingPair],
		options: &TrainingOptions,
		rng: &mut R,
	) -> Result<TrainingMetrics, ModelError>;

	/// Writes a checkpoint into directory `dir`.
	fn save<P: AsRef<Path>>(&self, dir: P) -> Result<(), ModelError>;

	/// Restores a checkpoint whose stored configuration must equal `declared`.
	fn load<P: AsRef<Path>>(dir: P, declared: &ModelConfig) -> Result<Self, ModelError>
	where
		Self: Sized;
}
