//! Build a [`PipelineConfig`] from `MM_GEN_*` environment variables.
//!
//! Unset variables keep their [`PipelineConfig::default`] value; a set but
//! unparsable variable is an error rather than a silent fallback.

use std::path::PathBuf;

use super::constants::{
	ENV_BATCH_SIZE, ENV_CHECKPOINT_DIR, ENV_CORPUS_PATH, ENV_DROPOUT_RATE, ENV_EMBED_DIM, ENV_EPOCHS,
	ENV_FF_DIM, ENV_HOST, ENV_LEARNING_RATE, ENV_MAX_LENGTH, ENV_MAX_LENGTH_LIMIT, ENV_NUM_BLOCKS, ENV_NUM_HEADS,
	ENV_PORT, ENV_PREFIX, ENV_RESERVED, ENV_SEED, ENV_TEMPERATURE, ENV_VALIDATION_FRACTION, ENV_WINDOW_LEN,
	ENV_WINDOW_MODE,
};
use super::{ConfigError, PipelineConfig};

/// Returns the full variable name for a suffix (`SEED` → `MM_GEN_SEED`).
pub fn env_key(suffix: &str) -> String {
	format!("{ENV_PREFIX}{suffix}")
}

/// Reads an environment variable as a string; `Ok(None)` when unset.
pub fn env_string(key: &str) -> Result<Option<String>, ConfigError> {
	match std::env::var(key) {
		Ok(s) => Ok(Some(s)),
		Err(std::env::VarError::NotPresent) => Ok(None),
		Err(e) => Err(ConfigError::EnvVar {
			key: key.to_owned(),
			message: e.to_string(),
		}),
	}
}

/// Reads an environment variable and parses it into `T`; `Ok(None)` when unset.
pub fn env_parsed<T>(key: &str) -> Result<Option<T>, ConfigError>
where
	T: std::str::FromStr,
	T::Err: std::fmt::Display,
{
	let Some(s) = env_string(key)? else {
		return Ok(None);
	};
	match s.trim().parse() {
		Ok(value) => Ok(Some(value)),
		Err(e) => Err(ConfigError::Parse {
			key: key.to_owned(),
			message: e.to_string(),
			value: s,
		}),
	}
}

/// Builds a validated [`PipelineConfig`] from the environment.
pub fn from_env() -> Result<PipelineConfig, ConfigError> {
	let default = PipelineConfig::default();

	let config = PipelineConfig {
		corpus_path: env_string(&env_key(ENV_CORPUS_PATH))?
			.map(PathBuf::from)
			.unwrap_or(default.corpus_path),
		checkpoint_dir: env_string(&env_key(ENV_CHECKPOINT_DIR))?
			.map(PathBuf::from)
			.unwrap_or(default.checkpoint_dir),
		seed: env_parsed(&env_key(ENV_SEED))?.unwrap_or(default.seed),
		window_len: env_parsed(&env_key(ENV_WINDOW_LEN))?.unwrap_or(default.window_len),
		embed_dim: env_parsed(&env_key(ENV_EMBED_DIM))?.unwrap_or(default.embed_dim),
		num_heads: env_parsed(&env_key(ENV_NUM_HEADS))?.unwrap_or(default.num_heads),
		ff_dim: env_parsed(&env_key(ENV_FF_DIM))?.unwrap_or(default.ff_dim),
		num_blocks: env_parsed(&env_key(ENV_NUM_BLOCKS))?.unwrap_or(default.num_blocks),
		dropout_rate: env_parsed(&env_key(ENV_DROPOUT_RATE))?.unwrap_or(default.dropout_rate),
		training: super::TrainingOptions {
			epochs: env_parsed(&env_key(ENV_EPOCHS))?.unwrap_or(default.training.epochs),
			batch_size: env_parsed(&env_key(ENV_BATCH_SIZE))?.unwrap_or(default.training.batch_size),
			validation_fraction: env_parsed(&env_key(ENV_VALIDATION_FRACTION))?
				.unwrap_or(default.training.validation_fraction),
			learning_rate: env_parsed(&env_key(ENV_LEARNING_RATE))?.unwrap_or(default.training.learning_rate),
			shuffle: default.training.shuffle,
		},
		temperature: env_parsed(&env_key(ENV_TEMPERATURE))?.unwrap_or(default.temperature),
		max_length: env_parsed(&env_key(ENV_MAX_LENGTH))?.unwrap_or(default.max_length),
		max_length_limit: env_parsed(&env_key(ENV_MAX_LENGTH_LIMIT))?.unwrap_or(default.max_length_limit),
		host: env_string(&env_key(ENV_HOST))?.unwrap_or(default.host),
		port: env_parsed(&env_key(ENV_PORT))?.unwrap_or(default.port),
		window_mode: env_parsed(&env_key(ENV_WINDOW_MODE))?.unwrap_or(default.window_mode),
		reserved: env_parsed(&env_key(ENV_RESERVED))?.unwrap_or(default.reserved),
	};

	config.validate()?;
	Ok(config)
}
