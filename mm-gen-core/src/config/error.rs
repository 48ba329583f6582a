/// Errors produced when building or validating configuration.
///
/// - `Validation`: values are out of range or inconsistent (e.g. `batch_size == 0`).
/// - `EnvVar`: an environment variable is set but unreadable (not Unicode).
/// - `Parse`: an environment variable is set but does not parse into the expected type.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
	#[error("config validation: {0}")]
	Validation(String),

	#[error("env var {key}: {message}")]
	EnvVar {
		key: String,
		message: String,
	},

	#[error("env var {key}={value:?}: {message}")]
	Parse {
		key: String,
		value: String,
		message: String,
	},
}
