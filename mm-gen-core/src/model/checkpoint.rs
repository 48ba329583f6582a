//! On-disk checkpoint layout.
//!
//! A checkpoint is a directory holding:
//! - `model.json`: topology descriptor (format version + [`ModelConfig`])
//! - `weights.mpk`: network record (full-precision named MessagePack)
//! - `vocab.bin`: the vocabulary the model was trained with (written by the trainer)
//!
//! Loading distinguishes a missing checkpoint (no descriptor) from a present
//! but unusable one, and refuses a stored configuration that differs from the
//! declared one.

use std::path::{Path, PathBuf};

use burn::module::Module;
use burn::record::{FullPrecisionSettings, NamedMpkFileRecorder, Recorder};
use burn::tensor::backend::Backend;
use log::debug;
use serde::{Deserialize, Serialize};

use super::network::Network;
use super::ModelError;
use crate::config::ModelConfig;
use crate::io;

pub const DESCRIPTOR_FILE: &str = "model.json";
pub const WEIGHTS_FILE: &str = "weights.mpk";
pub const VOCABULARY_FILE: &str = "vocab.bin";

const FORMAT_NAME: &str = "mm-gen-feed-forward";
const FORMAT_VERSION: u32 = 2;
/// Weights path without extension; the recorder appends `.mpk`.
const WEIGHTS_STEM: &str = "weights";

/// Full precision so a reloaded model predicts what the saved one did.
fn recorder() -> NamedMpkFileRecorder<FullPrecisionSettings> {
	NamedMpkFileRecorder::<FullPrecisionSettings>::new()
}

#[derive(Serialize, Deserialize, Debug)]
struct Descriptor {
	format: String,
	version: u32,
	config: ModelConfig,
}

/// Returns `true` if `dir` holds a checkpoint descriptor.
pub fn exists<P: AsRef<Path>>(dir: P) -> bool {
	dir.as_ref().join(DESCRIPTOR_FILE).is_file()
}

/// Path of the vocabulary file stored beside the model.
pub fn vocabulary_path<P: AsRef<Path>>(dir: P) -> PathBuf {
	dir.as_ref().join(VOCABULARY_FILE)
}

pub(crate) fn save<B: Backend>(dir: &Path, config: &ModelConfig, network: &Network<B>) -> Result<(), ModelError> {
	io::ensure_dir(dir)?;

	let descriptor = Descriptor {
		format: FORMAT_NAME.to_owned(),
		version: FORMAT_VERSION,
		config: config.clone(),
	};
	let json = serde_json::to_string_pretty(&descriptor)
		.map_err(|e| ModelError::Serialization(e.to_string()))?;

	// Weights first: a descriptor only appears once its weights are on disk.
	recorder()
		.record(network.clone().into_record(), dir.join(WEIGHTS_STEM))
		.map_err(|e| ModelError::Serialization(format!("{WEIGHTS_FILE}: {e}")))?;
	std::fs::write(dir.join(DESCRIPTOR_FILE), json)?;
	debug!("Checkpoint written to {}", dir.display());
	Ok(())
}

pub(crate) fn load<B: Backend>(
	dir: &Path,
	declared: &ModelConfig,
	device: &B::Device,
) -> Result<(ModelConfig, Network<B>), ModelError> {
	let descriptor_path = dir.join(DESCRIPTOR_FILE);
	if !descriptor_path.is_file() {
		return Err(ModelError::CheckpointNotFound(dir.to_path_buf()));
	}
	let corrupt = |reason: String| ModelError::CorruptCheckpoint { path: dir.to_path_buf(), reason };

	let json = std::fs::read_to_string(&descriptor_path).map_err(|e| corrupt(format!("{DESCRIPTOR_FILE}: {e}")))?;
	let descriptor: Descriptor =
		serde_json::from_str(&json).map_err(|e| corrupt(format!("{DESCRIPTOR_FILE}: {e}")))?;
	if descriptor.format != FORMAT_NAME || descriptor.version != FORMAT_VERSION {
		return Err(corrupt(format!(
			"unsupported format {} v{}",
			descriptor.format, descriptor.version
		)));
	}
	if descriptor.config != *declared {
		return Err(ModelError::ConfigMismatch {
			declared: Box::new(declared.clone()),
			stored: Box::new(descriptor.config),
		});
	}

	if !dir.join(WEIGHTS_FILE).is_file() {
		return Err(corrupt(format!("{WEIGHTS_FILE} is missing")));
	}
	let record = recorder()
		.load(dir.join(WEIGHTS_STEM), device)
		.map_err(|e| corrupt(format!("{WEIGHTS_FILE}: {e}")))?;
	let network = Network::<B>::init(&descriptor.config, device).load_record(record);
	network
		.check_shapes(&descriptor.config)
		.map_err(|reason| corrupt(format!("{WEIGHTS_FILE}: {reason}")))?;

	debug!("Checkpoint loaded from {}", dir.display());
	Ok((descriptor.config, network))
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::config::TrainingOptions;
	use crate::model::{FeedForwardModel, LanguageModel, Predictor};
	use crate::text::TrainingPair;
	use rand::SeedableRng;
	use rand::rngs::StdRng;

	fn config() -> ModelConfig {
		ModelConfig {
			window_len: 3,
			embed_dim: 4,
			num_heads: 1,
			ff_dim: 8,
			num_blocks: 1,
			dropout_rate: 0.1,
			vocab_size: 9,
		}
	}

	fn temp_checkpoint(name: &str) -> PathBuf {
		let dir = std::env::temp_dir().join(format!("mm_gen_checkpoint_{name}"));
		let _ = std::fs::remove_dir_all(&dir);
		dir
	}

	#[test]
	fn round_trip_preserves_predictions() {
		let dir = temp_checkpoint("round_trip");
		let mut rng = StdRng::seed_from_u64(11);
		let mut model = FeedForwardModel::new(config()).unwrap();
		let pairs = vec![
			TrainingPair { window: vec![0, 5, 6], target: 7 },
			TrainingPair { window: vec![5, 6, 7], target: 8 },
		];
		let options = TrainingOptions { epochs: 3, batch_size: 2, ..TrainingOptions::default() };
		model.train(&pairs, &options, &mut rng).unwrap();

		model.save(&dir).unwrap();
		assert!(exists(&dir));
		let loaded = FeedForwardModel::load(&dir, &config());
		let _ = std::fs::remove_dir_all(&dir);
		let loaded = loaded.unwrap();

		let before = model.predict(&[5, 6, 7]).unwrap();
		let after = loaded.predict(&[5, 6, 7]).unwrap();
		for (a, b) in before.iter().zip(&after) {
			assert!((a - b).abs() < 1e-6);
		}
	}

	#[test]
	fn missing_checkpoint_is_not_found() {
		let dir = temp_checkpoint("missing");
		assert!(!exists(&dir));
		assert!(matches!(FeedForwardModel::load(&dir, &config()), Err(ModelError::CheckpointNotFound(_))));
	}

	#[test]
	fn config_mismatch_is_refused() {
		let dir = temp_checkpoint("mismatch");
		FeedForwardModel::new(config()).unwrap().save(&dir).unwrap();

		let declared = ModelConfig { vocab_size: 10, ..config() };
		let result = FeedForwardModel::load(&dir, &declared);
		let _ = std::fs::remove_dir_all(&dir);
		assert!(matches!(result, Err(ModelError::ConfigMismatch { .. })));
	}

	#[test]
	fn missing_weights_are_corrupt() {
		let dir = temp_checkpoint("no_weights");
		FeedForwardModel::new(config()).unwrap().save(&dir).unwrap();
		std::fs::remove_file(dir.join(WEIGHTS_FILE)).unwrap();
		let result = FeedForwardModel::load(&dir, &config());
		let _ = std::fs::remove_dir_all(&dir);
		assert!(matches!(result, Err(ModelError::CorruptCheckpoint { .. })));
	}

	#[test]
	fn corrupt_files_are_not_treated_as_missing() {
		let dir = temp_checkpoint("corrupt");
		FeedForwardModel::new(config()).unwrap().save(&dir).unwrap();
		std::fs::write(dir.join(WEIGHTS_FILE), [1, 2, 3]).unwrap();
		let bad_weights = FeedForwardModel::load(&dir, &config());

		std::fs::write(dir.join(DESCRIPTOR_FILE), "{ not json").unwrap();
		let bad_descriptor = FeedForwardModel::load(&dir, &config());
		let _ = std::fs::remove_dir_all(&dir);

		assert!(matches!(bad_weights, Err(ModelError::CorruptCheckpoint { .. })));
		assert!(matches!(bad_descriptor, Err(ModelError::CorruptCheckpoint { .. })));
	}
}
