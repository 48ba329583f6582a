//! Default values and environment variable names used by the config builder.

/// Environment variable prefix (e.g. `MM_GEN_WINDOW_LEN`).
pub(crate) const ENV_PREFIX: &str = "MM_GEN_";

// Env key suffixes (full key = ENV_PREFIX + suffix)

pub(crate) const ENV_CORPUS_PATH: &str = "CORPUS_PATH";
pub(crate) const ENV_CHECKPOINT_DIR: &str = "CHECKPOINT_DIR";
pub(crate) const ENV_SEED: &str = "SEED";
pub(crate) const ENV_WINDOW_LEN: &str = "WINDOW_LEN";
pub(crate) const ENV_EMBED_DIM: &str = "EMBED_DIM";
pub(crate) const ENV_NUM_HEADS: &str = "NUM_HEADS";
pub(crate) const ENV_FF_DIM: &str = "FF_DIM";
pub(crate) const ENV_NUM_BLOCKS: &str = "NUM_BLOCKS";
pub(crate) const ENV_DROPOUT_RATE: &str = "DROPOUT_RATE";
pub(crate) const ENV_EPOCHS: &str = "EPOCHS";
pub(crate) const ENV_BATCH_SIZE: &str = "BATCH_SIZE";
pub(crate) const ENV_VALIDATION_FRACTION: &str = "VALIDATION_FRACTION";
pub(crate) const ENV_LEARNING_RATE: &str = "LEARNING_RATE";
pub(crate) const ENV_TEMPERATURE: &str = "TEMPERATURE";
pub(crate) const ENV_MAX_LENGTH: &str = "MAX_LENGTH";
pub(crate) const ENV_MAX_LENGTH_LIMIT: &str = "MAX_LENGTH_LIMIT";
pub(crate) const ENV_WINDOW_MODE: &str = "WINDOW_MODE";
pub(crate) const ENV_RESERVED: &str = "RESERVED";
pub(crate) const ENV_HOST: &str = "HOST";
pub(crate) const ENV_PORT: &str = "PORT";

// Defaults

pub(crate) const DEFAULT_CORPUS_PATH: &str = "input_myanmar.txt";
pub(crate) const DEFAULT_CHECKPOINT_DIR: &str = "transformer_checkpoint";
pub(crate) const DEFAULT_SEED: u64 = 42;
pub(crate) const DEFAULT_WINDOW_LEN: usize = 32;
pub(crate) const DEFAULT_EMBED_DIM: usize = 32;
pub(crate) const DEFAULT_NUM_HEADS: usize = 4;
pub(crate) const DEFAULT_FF_DIM: usize = 64;
pub(crate) const DEFAULT_NUM_BLOCKS: usize = 2;
pub(crate) const DEFAULT_DROPOUT_RATE: f32 = 0.1;
pub(crate) const DEFAULT_EPOCHS: usize = 30;
pub(crate) const DEFAULT_BATCH_SIZE: usize = 32;
pub(crate) const DEFAULT_VALIDATION_FRACTION: f32 = 0.0;
pub(crate) const DEFAULT_LEARNING_RATE: f32 = 0.001;
pub(crate) const DEFAULT_TEMPERATURE: f32 = 1.0;
pub(crate) const DEFAULT_MAX_LENGTH: usize = 50;
pub(crate) const DEFAULT_MAX_LENGTH_LIMIT: usize = 500;
pub(crate) const DEFAULT_HOST: &str = "127.0.0.1";
pub(crate) const DEFAULT_PORT: u16 = 3001;
