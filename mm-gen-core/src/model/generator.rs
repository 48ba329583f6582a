use log::{debug, warn};
use rand::Rng;

use super::generation_input::GenerationInput;
use super::sampling::{apply_temperature, sample_index, SamplingError};
use super::{ModelError, Predictor};
use crate::text::{left_pad_window, TokenId, Vocabulary};

/// Failure of a single generation step.
#[derive(Debug, thiserror::Error)]
pub enum StepError {
	#[error("prediction failed: {0}")]
	Prediction(#[from] ModelError),

	#[error("sampling failed: {0}")]
	Sampling(#[from] SamplingError),
}

/// Why a generation loop ended.
#[derive(Debug, Clone, PartialEq)]
pub enum StopReason {
	/// `max_new_tokens` steps were taken.
	MaxSteps,
	/// The `<END>` id was drawn.
	EndToken,
	/// The whole sequence (seed included) reached `max_new_tokens` ids.
	LengthCap,
	/// A step failed; the output holds everything generated before it.
	StepFailed(String),
}

/// Result of [`Generator::generate`].
#[derive(Debug, Clone, PartialEq)]
pub struct Generation {
	/// Seed ids followed by the generated ids.
	pub ids: Vec<TokenId>,
	/// `ids` rendered through the vocabulary.
	pub text: String,
	/// Number of ids appended to the seed.
	pub new_tokens: usize,
	/// Mean raw model probability of the drawn ids (0 when none was drawn).
	pub confidence: f32,
	pub stop: StopReason,
}

/// One sampled id and the probability the model gave it.
struct Draw {
	id: TokenId,
	probability: f32,
}

/// Autoregressive sampler over a [`Predictor`].
///
/// # Responsibilities
/// - Build the left-padded input window from the growing sequence
/// - Rescale every prediction by the temperature and draw the next id
/// - Stop on `<END>`, on the step/length cap, or on the first failed step
///
/// The generator only borrows the model and vocabulary; the growing sequence
/// belongs to one `generate` call, so a single model can serve concurrent calls.
pub struct Generator<'a, P: Predictor + ?Sized> {
	model: &'a P,
	vocabulary: &'a Vocabulary,
}

impl<'a, P: Predictor + ?Sized> Generator<'a, P> {
	pub fn new(model: &'a P, vocabulary: &'a Vocabulary) -> Self {
		Self { model, vocabulary }
	}

	/// Generates ids after `seed` until a stop condition.
	///
	/// # Behavior
	/// - The seed is copied; the caller's slice is never touched.
	/// - At most `max_new_tokens` steps run, and the loop also ends as soon as
	///   the full sequence holds `max_new_tokens` ids, so a long seed gets
	///   fewer new ids (but always at least one step when `max_new_tokens > 0`).
	/// - A failing step ends the loop; the partial sequence is returned.
	///
	/// # Notes
	/// - With `max_new_tokens == 0` the result is the rendered seed.
	pub fn generate<R: Rng + ?Sized>(&self, seed: &[TokenId], input: &GenerationInput, rng: &mut R) -> Generation {
		let mut ids = seed.to_vec();
		let end_id = self.vocabulary.end_id();
		let mut stop = StopReason::MaxSteps;
		let mut probability_sum = 0.0f32;
		let mut new_tokens = 0usize;

		for _ in 0..input.max_new_tokens {
			let draw = match self.step(&ids, input.temperature(), rng) {
				Ok(draw) => draw,
				Err(e) => {
					warn!("Generation stopped after {new_tokens} tokens: {e}");
					stop = StopReason::StepFailed(e.to_string());
					break;
				}
			};

			ids.push(draw.id);
			new_tokens += 1;
			probability_sum += draw.probability;

			if Some(draw.id) == end_id {
				stop = StopReason::EndToken;
				break;
			}
			if ids.len() >= input.max_new_tokens {
				stop = StopReason::LengthCap;
				break;
			}
		}

		debug!("Generated {new_tokens} tokens ({stop:?})");
		Generation {
			text: self.vocabulary.render(&ids),
			ids,
			new_tokens,
			confidence: if new_tokens == 0 { 0.0 } else { probability_sum / new_tokens as f32 },
			stop,
		}
	}

	/// Predicts, rescales and draws one id. The prediction is dropped on return.
	fn step<R: Rng + ?Sized>(&self, ids: &[TokenId], temperature: f32, rng: &mut R) -> Result<Draw, StepError> {
		let window = left_pad_window(ids, self.model.window_len());
		let probs = self.model.predict(&window)?;
		let scaled = apply_temperature(&probs, temperature)?;
		let index = sample_index(&scaled, rng)?;

		Ok(Draw {
			id: index as TokenId,
			probability: probs[index],
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::text::ReservedTokens;
	use rand::SeedableRng;
	use rand::rngs::StdRng;
	use std::cell::Cell;

	/// Always predicts the same distribution and records the windows it sees.
	struct FixedPredictor {
		window_len: usize,
		probs: Vec<f32>,
		calls: Cell<usize>,
		fail_after: Option<usize>,
		last_window: std::cell::RefCell<Vec<TokenId>>,
	}

	impl FixedPredictor {
		fn new(window_len: usize, probs: Vec<f32>) -> Self {
			Self {
				window_len,
				probs,
				calls: Cell::new(0),
				fail_after: None,
				last_window: Default::default(),
			}
		}
	}

	impl Predictor for FixedPredictor {
		fn window_len(&self) -> usize {
			self.window_len
		}

		fn predict(&self, window: &[TokenId]) -> Result<Vec<f32>, ModelError> {
			assert_eq!(window.len(), self.window_len);
			let calls = self.calls.get();
			self.calls.set(calls + 1);
			*self.last_window.borrow_mut() = window.to_vec();
			match self.fail_after {
				Some(limit) if calls >= limit => Err(ModelError::InvalidWindow { expected: 0, got: 0 }),
				_ => Ok(self.probs.clone()),
			}
		}
	}

	fn vocabulary() -> Vocabulary {
		Vocabulary::build(&["ABC", "<SEP>", "DEF"], ReservedTokens::Full)
	}

	/// One-hot distribution over the 7-token test vocabulary.
	fn one_hot(id: usize) -> Vec<f32> {
		let mut probs = vec![0.0; 7];
		probs[id] = 1.0;
		probs
	}

	#[test]
	fn zero_steps_returns_the_seed() {
		let vocabulary = vocabulary();
		let model = FixedPredictor::new(2, one_hot(5));
		let generator = Generator::new(&model, &vocabulary);
		let mut rng = StdRng::seed_from_u64(0);

		let result = generator.generate(&[5, 6], &GenerationInput::new(0, 1.0).unwrap(), &mut rng);
		assert_eq!(result.ids, vec![5, 6]);
		assert_eq!(result.text, "ABC DEF");
		assert_eq!(result.new_tokens, 0);
		assert_eq!(result.confidence, 0.0);
		assert_eq!(model.calls.get(), 0);
	}

	#[test]
	fn halts_within_the_step_cap() {
		let vocabulary = vocabulary();
		let model = FixedPredictor::new(3, one_hot(6));
		let generator = Generator::new(&model, &vocabulary);
		let mut rng = StdRng::seed_from_u64(0);

		let result = generator.generate(&[], &GenerationInput::new(4, 1.0).unwrap(), &mut rng);
		assert_eq!(result.ids, vec![6, 6, 6, 6]);
		assert_eq!(result.text, "DEF DEF DEF DEF");
		assert_eq!(result.new_tokens, 4);
		assert!((result.confidence - 1.0).abs() < 1e-6);
	}

	#[test]
	fn end_token_stops_immediately() {
		let vocabulary = vocabulary();
		let model = FixedPredictor::new(2, one_hot(3));
		let generator = Generator::new(&model, &vocabulary);
		let mut rng = StdRng::seed_from_u64(0);

		let result = generator.generate(&[5], &GenerationInput::new(10, 1.0).unwrap(), &mut rng);
		assert_eq!(result.ids, vec![5, 3]);
		assert_eq!(result.stop, StopReason::EndToken);
		assert_eq!(result.text, "ABC <END>");
	}

	#[test]
	fn long_seed_is_capped_by_total_length() {
		let vocabulary = vocabulary();
		let model = FixedPredictor::new(2, one_hot(6));
		let generator = Generator::new(&model, &vocabulary);
		let mut rng = StdRng::seed_from_u64(0);

		let seed = [5, 5, 5, 5, 5];
		let result = generator.generate(&seed, &GenerationInput::new(3, 1.0).unwrap(), &mut rng);
		assert_eq!(result.new_tokens, 1);
		assert_eq!(result.stop, StopReason::LengthCap);
		assert_eq!(seed, [5, 5, 5, 5, 5]);
	}

	#[test]
	fn windows_are_left_padded_tails() {
		let vocabulary = vocabulary();
		let model = FixedPredictor::new(4, one_hot(6));
		let generator = Generator::new(&model, &vocabulary);
		let mut rng = StdRng::seed_from_u64(0);

		generator.generate(&[5], &GenerationInput::new(1, 1.0).unwrap(), &mut rng);
		assert_eq!(*model.last_window.borrow(), vec![0, 0, 0, 5]);

		generator.generate(&[5, 4, 6, 4, 5], &GenerationInput::new(9, 1.0).unwrap(), &mut rng);
		// Last prediction sees [5, 4, 6, 4, 5, 6, 6, 6] before the 9th id is drawn.
		assert_eq!(*model.last_window.borrow(), vec![5, 6, 6, 6]);
	}

	#[test]
	fn failed_step_returns_partial_output() {
		let vocabulary = vocabulary();
		let mut model = FixedPredictor::new(2, one_hot(6));
		model.fail_after = Some(2);
		let generator = Generator::new(&model, &vocabulary);
		let mut rng = StdRng::seed_from_u64(0);

		let result = generator.generate(&[5], &GenerationInput::new(10, 1.0).unwrap(), &mut rng);
		assert_eq!(result.ids, vec![5, 6, 6]);
		assert!(matches!(result.stop, StopReason::StepFailed(_)));
	}

	#[test]
	fn degenerate_distribution_aborts_the_loop() {
		let vocabulary = vocabulary();
		let model = FixedPredictor::new(2, vec![0.0; 7]);
		let generator = Generator::new(&model, &vocabulary);
		let mut rng = StdRng::seed_from_u64(0);

		let result = generator.generate(&[5], &GenerationInput::new(10, 1.0).unwrap(), &mut rng);
		assert_eq!(result.ids, vec![5]);
		assert!(matches!(result.stop, StopReason::StepFailed(_)));
	}

	#[test]
	fn seeded_rng_is_reproducible() {
		let vocabulary = vocabulary();
		let model = FixedPredictor::new(2, vec![0.0, 0.0, 0.0, 0.0, 0.3, 0.3, 0.4]);
		let generator = Generator::new(&model, &vocabulary);
		let input = GenerationInput::new(20, 1.3).unwrap();

		let first = generator.generate(&[], &input, &mut StdRng::seed_from_u64(42));
		let second = generator.generate(&[], &input, &mut StdRng::seed_from_u64(42));
		assert_eq!(first.ids, second.ids);
		assert!(first.ids.iter().all(|id| (4..=6).contains(id)));
	}
}
