use std::path::Path;

use log::{info, warn};
use rand::SeedableRng;
use rand::rngs::StdRng;

use mm_gen_core::config::{self, PipelineConfig};
use mm_gen_core::context::{load_model, load_vocabulary, tokenize_corpus};
use mm_gen_core::model::{checkpoint, FeedForwardModel, LanguageModel, Predictor, TrainingMetrics};
use mm_gen_core::text::{make_windows, TokenId, Tokenizer};

/// Largest difference allowed between predictions before and after a reload.
const RELOAD_TOLERANCE: f32 = 1e-5;

/// Summary of one training run.
struct TrainingReport {
	vocab_size: usize,
	pairs: usize,
	metrics: TrainingMetrics,
}

/// Tokenizes the corpus, trains the model and writes the checkpoint.
///
/// The checkpoint is reloaded from disk afterwards and must predict the same
/// distribution as the in-memory model.
fn train(config: &PipelineConfig) -> Result<TrainingReport, Box<dyn std::error::Error>> {
	let tokenizer = Tokenizer::default();
	let tokens = tokenize_corpus(config, &tokenizer)?;
	info!("Corpus {} holds {} tokens", config.corpus_path.display(), tokens.len());

	let vocabulary = load_vocabulary(config, &tokenizer)?;
	let ids = vocabulary.encode(&tokens);
	let pairs = make_windows(&ids, config.window_len, config.window_mode)?;
	if pairs.is_empty() {
		return Err(format!(
			"corpus has {} tokens, not enough for a window of {}",
			ids.len(),
			config.window_len
		)
		.into());
	}
	info!("Built {} training pairs ({:?} windows)", pairs.len(), config.window_mode);

	if checkpoint::exists(&config.checkpoint_dir) {
		info!("Continuing from the checkpoint in {}", config.checkpoint_dir.display());
	}
	let (mut model, _) = load_model(config, &vocabulary)?;
	let mut rng = StdRng::seed_from_u64(config.seed);
	let metrics = model.train(&pairs, &config.training, &mut rng)?;

	model.save(&config.checkpoint_dir)?;
	vocabulary.save(checkpoint::vocabulary_path(&config.checkpoint_dir))?;
	info!("Checkpoint written to {}", config.checkpoint_dir.display());

	verify_reload(&model, &config.checkpoint_dir, &pairs[0].window)?;

	Ok(TrainingReport {
		vocab_size: vocabulary.len(),
		pairs: pairs.len(),
		metrics,
	})
}

/// Reloads the checkpoint in `dir` and compares its prediction for `window`.
fn verify_reload(model: &FeedForwardModel, dir: &Path, window: &[TokenId]) -> Result<(), Box<dyn std::error::Error>> {
	let reloaded = FeedForwardModel::load(dir, model.config())?;
	let expected = model.predict(window)?;
	let actual = reloaded.predict(window)?;

	let drift = expected
		.iter()
		.zip(&actual)
		.map(|(a, b)| (a - b).abs())
		.fold(0.0f32, f32::max);
	if drift > RELOAD_TOLERANCE {
		return Err(format!("reloaded checkpoint drifts by {drift}").into());
	}
	info!("Reloaded checkpoint matches (max drift {drift:e})");
	Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
	env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

	let config = config::from_env()?;
	let report = train(&config)?;

	match report.metrics.epochs.last() {
		Some(last) => {
			info!(
				"Trained {} epochs on {} pairs, vocabulary {}: loss {:.4}, accuracy {:.3}",
				last.epoch, report.pairs, report.vocab_size, last.loss, last.accuracy
			);
			if let (Some(val_loss), Some(val_accuracy)) = (last.val_loss, last.val_accuracy) {
				info!("Validation: loss {val_loss:.4}, accuracy {val_accuracy:.3}");
			}
		}
		None => warn!("No epoch was run"),
	}

	Ok(())
}
