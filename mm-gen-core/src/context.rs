use std::path::PathBuf;

use log::{info, warn};
use rand::Rng;

use crate::config::PipelineConfig;
use crate::io::read_corpus;
use crate::model::{checkpoint, FeedForwardModel, Generation, GenerationInput, Generator, LanguageModel, ModelError};
use crate::text::{split_words, TokenId, Tokenizer, Vocabulary, VocabularyError};

#[derive(Debug, thiserror::Error)]
pub enum ContextError {
	#[error("cannot read corpus {path}: {source}")]
	Corpus {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("cannot load vocabulary: {0}")]
	Vocabulary(#[from] VocabularyError),

	#[error(transparent)]
	Model(#[from] ModelError),
}

/// Tokenizes the corpus file named by `config`.
pub fn tokenize_corpus(config: &PipelineConfig, tokenizer: &Tokenizer) -> Result<Vec<String>, ContextError> {
	let text = read_corpus(&config.corpus_path).map_err(|source| ContextError::Corpus {
		path: config.corpus_path.clone(),
		source,
	})?;
	Ok(tokenizer.tokenize(&text))
}

/// Returns the vocabulary stored beside the checkpoint, or builds one from the corpus.
///
/// A model's output layer is tied to the ids it was trained with, so a stored
/// vocabulary always wins over a rebuild.
pub fn load_vocabulary(config: &PipelineConfig, tokenizer: &Tokenizer) -> Result<Vocabulary, ContextError> {
	let stored = checkpoint::vocabulary_path(&config.checkpoint_dir);
	if stored.is_file() {
		let vocabulary = Vocabulary::load(&stored)?;
		info!("Loaded vocabulary of {} tokens from {}", vocabulary.len(), stored.display());
		return Ok(vocabulary);
	}

	let tokens = tokenize_corpus(config, tokenizer)?;
	let vocabulary = Vocabulary::build(&tokens, config.reserved);
	info!(
		"Built vocabulary of {} tokens from {}",
		vocabulary.len(),
		config.corpus_path.display()
	);
	Ok(vocabulary)
}

/// Loads the checkpoint model, or builds a fresh untrained one when there is none.
///
/// Returns the model and whether it came from a checkpoint.
///
/// # Errors
/// Only a missing checkpoint falls back to a fresh model. A corrupt checkpoint
/// or one whose configuration differs from `config` is an error.
pub fn load_model(config: &PipelineConfig, vocabulary: &Vocabulary) -> Result<(FeedForwardModel, bool), ContextError> {
	let declared = config.model_config(vocabulary.len());

	match FeedForwardModel::load(&config.checkpoint_dir, &declared) {
		Ok(model) => {
			info!("Loaded model from {}", config.checkpoint_dir.display());
			Ok((model, true))
		}
		Err(ModelError::CheckpointNotFound(dir)) => {
			warn!("No checkpoint in {}, building a fresh model", dir.display());
			Ok((FeedForwardModel::new(declared)?, false))
		}
		Err(e) => Err(e.into()),
	}
}

/// Process-wide, read-only inference state.
///
/// Built once before serving starts and shared by every request. Nothing in
/// it is mutated afterwards, so it can be read from many threads at once.
pub struct ModelContext {
	vocabulary: Vocabulary,
	model: FeedForwardModel,
	model_loaded: bool,
}

impl ModelContext {
	pub fn new(vocabulary: Vocabulary, model: FeedForwardModel, model_loaded: bool) -> Self {
		Self { vocabulary, model, model_loaded }
	}

	/// Loads vocabulary and model as described by `config`.
	pub fn load_or_build(config: &PipelineConfig) -> Result<Self, ContextError> {
		let tokenizer = Tokenizer::default();
		let vocabulary = load_vocabulary(config, &tokenizer)?;
		let (model, model_loaded) = load_model(config, &vocabulary)?;
		Ok(Self::new(vocabulary, model, model_loaded))
	}

	pub fn vocabulary(&self) -> &Vocabulary {
		&self.vocabulary
	}

	pub fn model(&self) -> &FeedForwardModel {
		&self.model
	}

	/// `true` if the model came from a checkpoint, `false` if it is untrained.
	pub fn model_loaded(&self) -> bool {
		self.model_loaded
	}

	pub fn vocab_size(&self) -> usize {
		self.vocabulary.len()
	}

	/// Splits a prompt into words and maps them to ids (unseen words → UNK).
	pub fn encode_prompt(&self, text: &str) -> Vec<TokenId> {
		self.vocabulary.encode(&split_words(text))
	}

	/// Encodes `prompt` and generates a continuation.
	pub fn generate<R: Rng + ?Sized>(&self, prompt: &str, input: &GenerationInput, rng: &mut R) -> Generation {
		let seed = self.encode_prompt(prompt);
		Generator::new(&self.model, &self.vocabulary).generate(&seed, input, rng)
	}
}
