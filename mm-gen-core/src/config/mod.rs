//! Configuration for the model, training, generation and serving.
//!
//! Load from the environment with [`from_env`]; every value has a default
//! tuned for a small Myanmar corpus (window 32, 2 blocks, 30 epochs...).

mod builder;
mod constants;
mod error;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use constants::{
	DEFAULT_BATCH_SIZE, DEFAULT_CHECKPOINT_DIR, DEFAULT_CORPUS_PATH, DEFAULT_DROPOUT_RATE, DEFAULT_EMBED_DIM,
	DEFAULT_EPOCHS, DEFAULT_FF_DIM, DEFAULT_HOST, DEFAULT_LEARNING_RATE, DEFAULT_MAX_LENGTH, DEFAULT_MAX_LENGTH_LIMIT,
	DEFAULT_NUM_BLOCKS, DEFAULT_NUM_HEADS, DEFAULT_PORT, DEFAULT_SEED, DEFAULT_TEMPERATURE, DEFAULT_VALIDATION_FRACTION,
	DEFAULT_WINDOW_LEN,
};

pub use builder::{env_key, env_parsed, env_string, from_env};
pub use error::ConfigError;

use crate::text::{ReservedTokens, WindowMode};

/// Hyperparameters fixed when a model is constructed.
///
/// Stored inside every checkpoint. Loading a checkpoint with a different
/// declared configuration is refused, never reshaped.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ModelConfig {
	/// Number of token ids per input window.
	pub window_len: usize,
	/// Embedding width (also the width of every block output).
	pub embed_dim: usize,
	/// Declared head count. The dense network does not use it.
	pub num_heads: usize,
	/// Hidden width of each feed-forward block.
	pub ff_dim: usize,
	pub num_blocks: usize,
	/// Dropout probability applied during training, in `[0, 1)`.
	pub dropout_rate: f32,
	/// Number of ids the model predicts over.
	pub vocab_size: usize,
}

impl ModelConfig {
	pub fn validate(&self) -> Result<(), ConfigError> {
		let positive = [
			("window_len", self.window_len),
			("embed_dim", self.embed_dim),
			("ff_dim", self.ff_dim),
			("num_blocks", self.num_blocks),
			("vocab_size", self.vocab_size),
		];
		for (name, value) in positive {
			if value == 0 {
				return Err(ConfigError::Validation(format!("{name} must be greater than 0")));
			}
		}
		if !(0.0..1.0).contains(&self.dropout_rate) {
			return Err(ConfigError::Validation(format!(
				"dropout_rate must be in [0, 1), got {}",
				self.dropout_rate
			)));
		}
		Ok(())
	}
}

/// Parameters of one training run.
#[derive(Clone, Debug, PartialEq)]
pub struct TrainingOptions {
	pub epochs: usize,
	pub batch_size: usize,
	/// Fraction of pairs (taken from the end, before shuffling) held out for validation.
	pub validation_fraction: f32,
	pub learning_rate: f32,
	/// Shuffle training pairs at every epoch.
	pub shuffle: bool,
}

impl Default for TrainingOptions {
	fn default() -> Self {
		Self {
			epochs: DEFAULT_EPOCHS,
			batch_size: DEFAULT_BATCH_SIZE,
			validation_fraction: DEFAULT_VALIDATION_FRACTION,
			learning_rate: DEFAULT_LEARNING_RATE,
			shuffle: true,
		}
	}
}

impl TrainingOptions {
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.epochs == 0 {
			return Err(ConfigError::Validation("epochs must be greater than 0".to_owned()));
		}
		if self.batch_size == 0 {
			return Err(ConfigError::Validation("batch_size must be greater than 0".to_owned()));
		}
		if !(0.0..1.0).contains(&self.validation_fraction) {
			return Err(ConfigError::Validation(format!(
				"validation_fraction must be in [0, 1), got {}",
				self.validation_fraction
			)));
		}
		if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
			return Err(ConfigError::Validation("learning_rate must be positive".to_owned()));
		}
		Ok(())
	}
}

/// Everything the trainer and the server need, in one place.
#[derive(Clone, Debug)]
pub struct PipelineConfig {
	/// UTF-8 training corpus.
	pub corpus_path: PathBuf,
	/// Checkpoint directory (model descriptor, weights, vocabulary).
	pub checkpoint_dir: PathBuf,
	/// Seed for training shuffles.
	pub seed: u64,

	pub window_len: usize,
	pub embed_dim: usize,
	pub num_heads: usize,
	pub ff_dim: usize,
	pub num_blocks: usize,
	pub dropout_rate: f32,
	pub window_mode: WindowMode,
	pub reserved: ReservedTokens,

	pub training: TrainingOptions,

	/// Default sampling temperature for HTTP requests.
	pub temperature: f32,
	/// Default generation length cap for HTTP requests.
	pub max_length: usize,
	/// Largest `maxLength` a request may ask for.
	pub max_length_limit: usize,

	pub host: String,
	pub port: u16,
}

impl Default for PipelineConfig {
	fn default() -> Self {
		Self {
			corpus_path: PathBuf::from(DEFAULT_CORPUS_PATH),
			checkpoint_dir: PathBuf::from(DEFAULT_CHECKPOINT_DIR),
			seed: DEFAULT_SEED,
			window_len: DEFAULT_WINDOW_LEN,
			embed_dim: DEFAULT_EMBED_DIM,
			num_heads: DEFAULT_NUM_HEADS,
			ff_dim: DEFAULT_FF_DIM,
			num_blocks: DEFAULT_NUM_BLOCKS,
			dropout_rate: DEFAULT_DROPOUT_RATE,
			window_mode: WindowMode::Strict,
			reserved: ReservedTokens::Full,
			training: TrainingOptions::default(),
			temperature: DEFAULT_TEMPERATURE,
			max_length: DEFAULT_MAX_LENGTH,
			max_length_limit: DEFAULT_MAX_LENGTH_LIMIT,
			host: DEFAULT_HOST.to_owned(),
			port: DEFAULT_PORT,
		}
	}
}

impl PipelineConfig {
	/// Model hyperparameters for a vocabulary of `vocab_size` ids.
	pub fn model_config(&self, vocab_size: usize) -> ModelConfig {
		ModelConfig {
			window_len: self.window_len,
			embed_dim: self.embed_dim,
			num_heads: self.num_heads,
			ff_dim: self.ff_dim,
			num_blocks: self.num_blocks,
			dropout_rate: self.dropout_rate,
			vocab_size,
		}
	}

	/// Validates every section. The vocabulary size is not known yet, so the
	/// model part is checked with a placeholder size of 1.
	pub fn validate(&self) -> Result<(), ConfigError> {
		self.model_config(1).validate()?;
		self.training.validate()?;
		if !(self.temperature.is_finite() && self.temperature > 0.0) {
			return Err(ConfigError::Validation(format!(
				"temperature must be positive, got {}",
				self.temperature
			)));
		}
		if self.max_length == 0 || self.max_length > self.max_length_limit {
			return Err(ConfigError::Validation(format!(
				"max_length must be in 1..={}, got {}",
				self.max_length_limit, self.max_length
			)));
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::constants::{ENV_RESERVED, ENV_WINDOW_MODE};
	use super::*;

	#[test]
	fn default_config_is_valid() {
		let config = PipelineConfig::default();
		assert!(config.validate().is_ok());
		assert_eq!(config.model_config(7).vocab_size, 7);
		assert_eq!(config.model_config(7).window_len, 32);
	}

	#[test]
	fn invalid_values_are_rejected() {
		let config = PipelineConfig { dropout_rate: 1.0, ..PipelineConfig::default() };
		assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));

		let config = PipelineConfig { temperature: 0.0, ..PipelineConfig::default() };
		assert!(config.validate().is_err());

		let mut config = PipelineConfig::default();
		config.training.batch_size = 0;
		assert!(config.validate().is_err());

		let config = PipelineConfig { max_length: 600, max_length_limit: 500, ..PipelineConfig::default() };
		assert!(config.validate().is_err());

		assert!(PipelineConfig::default().model_config(0).validate().is_err());
	}

	#[test]
	fn env_key_uses_prefix() {
		assert_eq!(env_key("SEED"), "MM_GEN_SEED");
	}

	#[test]
	fn env_parsed_reports_bad_values() {
		let key = env_key("TEST_ONLY_BAD_NUMBER");
		// SAFETY: the key is unique to this test.
		unsafe { std::env::set_var(&key, "abc") };
		let result = env_parsed::<usize>(&key);
		unsafe { std::env::remove_var(&key) };
		assert!(matches!(result, Err(ConfigError::Parse { value, .. }) if value == "abc"));

		assert_eq!(env_parsed::<usize>(&env_key("TEST_ONLY_UNSET")).unwrap(), None);
	}

	// The only test that reads the real `MM_GEN_*` keys.
	#[test]
	fn window_mode_and_reserved_set_come_from_env() {
		let mode = env_key(ENV_WINDOW_MODE);
		let reserved = env_key(ENV_RESERVED);
		// SAFETY: no other test sets or reads these keys.
		unsafe {
			std::env::set_var(&mode, "padded");
			std::env::set_var(&reserved, "pad-only");
		}
		let parsed = from_env();
		unsafe { std::env::set_var(&mode, "sliding") };
		let rejected = from_env();
		unsafe {
			std::env::remove_var(&mode);
			std::env::remove_var(&reserved);
		}

		let parsed = parsed.unwrap();
		assert_eq!(parsed.window_mode, WindowMode::Padded);
		assert_eq!(parsed.reserved, ReservedTokens::PadOnly);
		assert!(matches!(rejected, Err(ConfigError::Parse { value, .. }) if value == "sliding"));
	}
}
