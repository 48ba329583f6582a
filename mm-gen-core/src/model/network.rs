use std::path::Path;
use std::sync::{Mutex, PoisonError};

use burn::backend::ndarray::NdArrayDevice;
use burn::backend::{Autodiff, NdArray};
use burn::module::AutodiffModule;
use burn::nn::loss::CrossEntropyLossConfig;
use burn::nn::{
	Dropout, DropoutConfig, Embedding, EmbeddingConfig, Initializer, LayerNorm, LayerNormConfig, Linear,
	LinearConfig,
};
use burn::optim::{AdamConfig, GradientsParams, Optimizer};
use burn::prelude::*;
use burn::tensor::activation::{relu, softmax};
use log::{debug, info};
use rand::Rng;
use rand::seq::SliceRandom;

use super::checkpoint;
use super::{EpochMetrics, LanguageModel, ModelError, Predictor, TrainingMetrics};
use crate::config::{ModelConfig, TrainingOptions};
use crate::text::{TokenId, TrainingPair};

/// Backend used while training (gradients on CPU).
pub(crate) type TrainBackend = Autodiff<NdArray>;
/// Backend used for prediction and validation (no autodiff, dropout off).
pub(crate) type InferBackend = NdArray;

const ADAM_BETA1: f32 = 0.9;
const ADAM_BETA2: f32 = 0.999;
const ADAM_EPSILON: f32 = 1e-7;
const NORM_EPSILON: f64 = 1e-3;
const EMBEDDING_INIT_RANGE: f64 = 0.05;

/// One "transformer-inspired" block: expand, relu, project back, normalize.
#[derive(Module, Debug)]
pub(crate) struct Block<B: Backend> {
	pub(crate) expand: Linear<B>,
	pub(crate) project: Linear<B>,
	pub(crate) norm: LayerNorm<B>,
	dropout: Dropout,
}

impl<B: Backend> Block<B> {
	fn forward(&self, x: Tensor<B, 2>) -> Tensor<B, 2> {
		let hidden = self.dropout.forward(relu(self.expand.forward(x)));
		let projected = self.dropout.forward(self.project.forward(hidden));
		self.norm.forward(projected)
	}
}

/// Embedding → flatten → blocks → vocabulary logits.
#[derive(Module, Debug)]
pub(crate) struct Network<B: Backend> {
	pub(crate) embedding: Embedding<B>,
	pub(crate) blocks: Vec<Block<B>>,
	pub(crate) output: Linear<B>,
}

impl<B: Backend> Network<B> {
	/// Builds the layers for `config`: Glorot-uniform dense weights,
	/// uniform(-0.05, 0.05) embeddings.
	pub(crate) fn init(config: &ModelConfig, device: &B::Device) -> Self {
		let glorot = Initializer::XavierUniform { gain: 1.0 };
		let dense = |inputs: usize, outputs: usize| {
			LinearConfig::new(inputs, outputs)
				.with_initializer(glorot.clone())
				.init(device)
		};

		let embedding = EmbeddingConfig::new(config.vocab_size, config.embed_dim)
			.with_initializer(Initializer::Uniform { min: -EMBEDDING_INIT_RANGE, max: EMBEDDING_INIT_RANGE })
			.init(device);
		let blocks = (0..config.num_blocks)
			.map(|index| Block {
				expand: dense(block_inputs(config, index), config.ff_dim),
				project: dense(config.ff_dim, config.embed_dim),
				norm: LayerNormConfig::new(config.embed_dim).with_epsilon(NORM_EPSILON).init(device),
				dropout: DropoutConfig::new(config.dropout_rate as f64).init(),
			})
			.collect();
		let output = dense(config.embed_dim, config.vocab_size);

		Self { embedding, blocks, output }
	}

	/// `windows`: `[batch, window_len]` ids → `[batch, vocab_size]` logits.
	pub(crate) fn forward(&self, windows: Tensor<B, 2, Int>) -> Tensor<B, 2> {
		let embedded = self.embedding.forward(windows);
		let [batch, window_len, dim] = embedded.dims();
		let mut x = embedded.reshape([batch, window_len * dim]);
		for block in &self.blocks {
			x = block.forward(x);
		}
		self.output.forward(x)
	}

	/// Checks every weight shape against `config`.
	///
	/// Used after loading weights, so that a foreign weight file is reported
	/// instead of failing on the first prediction.
	pub(crate) fn check_shapes(&self, config: &ModelConfig) -> Result<(), String> {
		let embedding = self.embedding.weight.val().dims();
		if embedding != [config.vocab_size, config.embed_dim] {
			return Err(format!("embedding shape {embedding:?}"));
		}
		if self.blocks.len() != config.num_blocks {
			return Err(format!("expected {} blocks, found {}", config.num_blocks, self.blocks.len()));
		}
		for (index, block) in self.blocks.iter().enumerate() {
			let expand = block.expand.weight.val().dims();
			let project = block.project.weight.val().dims();
			if expand != [block_inputs(config, index), config.ff_dim] || project != [config.ff_dim, config.embed_dim] {
				return Err(format!("block {index} shapes {expand:?} / {project:?}"));
			}
		}
		let output = self.output.weight.val().dims();
		if output != [config.embed_dim, config.vocab_size] {
			return Err(format!("output layer shape {output:?}"));
		}
		Ok(())
	}
}

/// Input width of block `index`: the flattened window for the first block.
fn block_inputs(config: &ModelConfig, index: usize) -> usize {
	if index == 0 { config.window_len * config.embed_dim } else { config.embed_dim }
}

/// Builds a `[batch, window_len]` id tensor and the matching target tensor.
fn batch_tensors<B: Backend>(
	pairs: &[&TrainingPair],
	window_len: usize,
	device: &B::Device,
) -> (Tensor<B, 2, Int>, Tensor<B, 1, Int>) {
	let windows: Vec<i32> = pairs.iter().flat_map(|p| p.window.iter().map(|id| *id as i32)).collect();
	let targets: Vec<i32> = pairs.iter().map(|p| p.target as i32).collect();

	let windows = Tensor::<B, 1, Int>::from_ints(windows.as_slice(), device).reshape([pairs.len(), window_len]);
	let targets = Tensor::<B, 1, Int>::from_ints(targets.as_slice(), device);
	(windows, targets)
}

/// Row-major logits back on the host.
fn host_values<B: Backend>(tensor: Tensor<B, 2>) -> Result<Vec<f32>, ModelError> {
	tensor
		.into_data()
		.to_vec::<f32>()
		.map_err(|e| ModelError::Tensor(format!("{e:?}")))
}

/// Number of rows of `logits` whose arg-max is the row's target.
fn count_correct(logits: &[f32], vocab_size: usize, pairs: &[&TrainingPair]) -> usize {
	logits
		.chunks(vocab_size)
		.zip(pairs)
		.filter(|(row, pair)| argmax(row) == pair.target as usize)
		.count()
}

fn argmax(values: &[f32]) -> usize {
	values
		.iter()
		.enumerate()
		.max_by(|a, b| a.1.total_cmp(b.1))
		.map(|(index, _)| index)
		.unwrap_or(0)
}

/// Feed-forward next-token predictor on `burn`.
///
/// Topology: embedding → flatten → `num_blocks` × [dense(ff, relu) → dropout →
/// dense(embed) → dropout → layer-norm] → dense(vocab) → softmax.
/// Trained with Adam on sparse categorical cross-entropy.
///
/// # Invariants
/// - Layer shapes always match `config`
/// - `predict` runs on the inference backend, so dropout never applies there
#[derive(Debug)]
pub struct FeedForwardModel {
	config: ModelConfig,
	device: NdArrayDevice,
	/// Locked per forward pass so one model can be shared by request threads.
	network: Mutex<Network<TrainBackend>>,
}

impl FeedForwardModel {
	/// Builds an untrained model with freshly initialized weights.
	///
	/// # Errors
	/// Returns [`ModelError::InvalidConfig`] if the configuration is invalid.
	pub fn new(config: ModelConfig) -> Result<Self, ModelError> {
		config.validate()?;
		let device = NdArrayDevice::default();
		let network = Network::init(&config, &device);
		Ok(Self::from_parts(config, network, device))
	}

	pub(crate) fn from_parts(config: ModelConfig, network: Network<TrainBackend>, device: NdArrayDevice) -> Self {
		Self { config, device, network: Mutex::new(network) }
	}

	fn check_window(&self, window: &[TokenId]) -> Result<(), ModelError> {
		if window.len() != self.config.window_len {
			return Err(ModelError::InvalidWindow { expected: self.config.window_len, got: window.len() });
		}
		self.check_id(window.iter().copied())
	}

	fn check_id(&self, mut ids: impl Iterator<Item = TokenId>) -> Result<(), ModelError> {
		match ids.find(|id| *id as usize >= self.config.vocab_size) {
			Some(id) => Err(ModelError::TokenOutOfRange { id, vocab_size: self.config.vocab_size }),
			None => Ok(()),
		}
	}

	/// Inference copy of the current weights.
	fn inference_network(&self) -> Network<InferBackend> {
		self.network.lock().unwrap_or_else(PoisonError::into_inner).valid()
	}

	/// Mean loss and accuracy over `pairs` without dropout.
	fn evaluate(&self, network: &Network<InferBackend>, pairs: &[&TrainingPair]) -> Result<(f32, f32), ModelError> {
		let (windows, targets) = batch_tensors::<InferBackend>(pairs, self.config.window_len, &self.device);
		let logits = network.forward(windows);
		let loss = CrossEntropyLossConfig::new()
			.init(&self.device)
			.forward(logits.clone(), targets)
			.into_scalar()
			.elem::<f32>();
		let correct = count_correct(&host_values(logits)?, self.config.vocab_size, pairs);
		Ok((loss, correct as f32 / pairs.len() as f32))
	}
}

impl Predictor for FeedForwardModel {
	fn window_len(&self) -> usize {
		self.config.window_len
	}

	fn predict(&self, window: &[TokenId]) -> Result<Vec<f32>, ModelError> {
		self.check_window(window)?;
		let network = self.inference_network();
		let ids: Vec<i32> = window.iter().map(|id| *id as i32).collect();
		let input = Tensor::<InferBackend, 1, Int>::from_ints(ids.as_slice(), &self.device).unsqueeze::<2>();
		host_values(softmax(network.forward(input), 1))
	}
}

impl LanguageModel for FeedForwardModel {
	fn config(&self) -> &ModelConfig {
		&self.config
	}

	/// Trains with mini-batch Adam.
	///
	/// The last `validation_fraction` of `pairs` is held out before any
	/// shuffling; the rest is shuffled at every epoch when `shuffle` is set.
	fn train<R: Rng + ?Sized>(
		&mut self,
		pairs: &[TrainingPair],
		options: &TrainingOptions,
		rng: &mut R,
	) -> Result<TrainingMetrics, ModelError> {
		options.validate()?;
		if pairs.is_empty() {
			return Err(ModelError::EmptyTrainingSet);
		}
		for pair in pairs {
			self.check_window(&pair.window)?;
			self.check_id(std::iter::once(pair.target))?;
		}

		let held_out = (pairs.len() as f32 * options.validation_fraction).floor() as usize;
		let (train_set, validation_set) = pairs.split_at(pairs.len() - held_out);
		if train_set.is_empty() {
			return Err(ModelError::EmptyTrainingSet);
		}
		let validation_set: Vec<&TrainingPair> = validation_set.iter().collect();
		info!(
			"Training on {} pairs ({} held out) for {} epochs",
			train_set.len(),
			validation_set.len(),
			options.epochs
		);

		let window_len = self.config.window_len;
		let vocab_size = self.config.vocab_size;
		let device = &self.device;
		let loss_fn = CrossEntropyLossConfig::new().init(device);
		let mut optimizer = AdamConfig::new()
			.with_beta_1(ADAM_BETA1)
			.with_beta_2(ADAM_BETA2)
			.with_epsilon(ADAM_EPSILON)
			.init();

		let mut model = self.network.get_mut().unwrap_or_else(PoisonError::into_inner).clone();
		let mut order: Vec<usize> = (0..train_set.len()).collect();
		let mut metrics = TrainingMetrics::default();

		for epoch in 1..=options.epochs {
			if options.shuffle {
				order.shuffle(rng);
			}

			let mut total_loss = 0.0;
			let mut correct = 0usize;
			for indices in order.chunks(options.batch_size) {
				let batch: Vec<&TrainingPair> = indices.iter().map(|i| &train_set[*i]).collect();
				let (windows, targets) = batch_tensors::<TrainBackend>(&batch, window_len, device);

				let logits = model.forward(windows);
				let loss = loss_fn.forward(logits.clone(), targets);
				total_loss += loss.clone().into_scalar().elem::<f32>() * batch.len() as f32;
				correct += count_correct(&host_values(logits)?, vocab_size, &batch);

				let grads = GradientsParams::from_grads(loss.backward(), &model);
				model = optimizer.step(options.learning_rate as f64, model, grads);
			}

			let (val_loss, val_accuracy) = if validation_set.is_empty() {
				(None, None)
			} else {
				let (loss, accuracy) = self.evaluate(&model.valid(), &validation_set)?;
				(Some(loss), Some(accuracy))
			};
			let epoch_metrics = EpochMetrics {
				epoch,
				loss: total_loss / train_set.len() as f32,
				accuracy: correct as f32 / train_set.len() as f32,
				val_loss,
				val_accuracy,
			};
			debug!(
				"epoch {}/{}: loss={:.4} acc={:.3}",
				epoch, options.epochs, epoch_metrics.loss, epoch_metrics.accuracy
			);
			metrics.epochs.push(epoch_metrics);
		}

		*self.network.get_mut().unwrap_or_else(PoisonError::into_inner) = model;
		Ok(metrics)
	}

	fn save<P: AsRef<Path>>(&self, dir: P) -> Result<(), ModelError> {
		let network = self.network.lock().unwrap_or_else(PoisonError::into_inner);
		checkpoint::save(dir.as_ref(), &self.config, &*network)
	}

	fn load<P: AsRef<Path>>(dir: P, declared: &ModelConfig) -> Result<Self, ModelError> {
		let device = NdArrayDevice::default();
		let (config, network) = checkpoint::load::<TrainBackend>(dir.as_ref(), declared, &device)?;
		Ok(Self::from_parts(config, network, device))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rand::SeedableRng;
	use rand::rngs::StdRng;

	fn tiny_config() -> ModelConfig {
		ModelConfig {
			window_len: 2,
			embed_dim: 8,
			num_heads: 2,
			ff_dim: 16,
			num_blocks: 2,
			dropout_rate: 0.0,
			vocab_size: 7,
		}
	}

	#[test]
	fn predict_returns_a_distribution() {
		let model = FeedForwardModel::new(tiny_config()).unwrap();
		let probs = model.predict(&[0, 5]).unwrap();
		assert_eq!(probs.len(), 7);
		assert!((probs.iter().sum::<f32>() - 1.0).abs() < 1e-5);
		assert!(probs.iter().all(|p| *p >= 0.0));
	}

	#[test]
	fn predict_rejects_bad_windows() {
		let model = FeedForwardModel::new(tiny_config()).unwrap();
		assert!(matches!(model.predict(&[1]), Err(ModelError::InvalidWindow { expected: 2, got: 1 })));
		assert!(matches!(model.predict(&[1, 9]), Err(ModelError::TokenOutOfRange { id: 9, .. })));
	}

	#[test]
	fn invalid_config_is_refused() {
		let config = ModelConfig { vocab_size: 0, ..tiny_config() };
		assert!(matches!(FeedForwardModel::new(config), Err(ModelError::InvalidConfig(_))));
	}

	#[test]
	fn dropout_does_not_apply_to_predictions() {
		let model = FeedForwardModel::new(ModelConfig { dropout_rate: 0.5, ..tiny_config() }).unwrap();
		assert_eq!(model.predict(&[3, 4]).unwrap(), model.predict(&[3, 4]).unwrap());
	}

	#[test]
	fn fresh_network_has_the_configured_shapes() {
		let model = FeedForwardModel::new(tiny_config()).unwrap();
		assert!(model.inference_network().check_shapes(&tiny_config()).is_ok());

		let wider = ModelConfig { embed_dim: 4, ..tiny_config() };
		assert!(model.inference_network().check_shapes(&wider).is_err());
	}

	#[test]
	fn training_learns_a_deterministic_sequence() {
		let mut rng = StdRng::seed_from_u64(7);
		let mut model = FeedForwardModel::new(tiny_config()).unwrap();
		let pairs = vec![
			TrainingPair { window: vec![0, 5], target: 4 },
			TrainingPair { window: vec![5, 4], target: 6 },
			TrainingPair { window: vec![4, 6], target: 4 },
		];
		let options = TrainingOptions {
			epochs: 200,
			batch_size: 3,
			validation_fraction: 0.0,
			learning_rate: 0.01,
			shuffle: true,
		};

		let metrics = model.train(&pairs, &options, &mut rng).unwrap();
		assert_eq!(metrics.epochs.len(), 200);
		let first = metrics.epochs[0].loss;
		let last = metrics.final_loss().unwrap();
		assert!(last < first, "loss did not decrease: {first} -> {last}");

		let probs = model.predict(&[5, 4]).unwrap();
		assert_eq!(argmax(&probs), 6);
	}

	#[test]
	fn training_rejects_empty_and_reports_validation() {
		let mut rng = StdRng::seed_from_u64(2);
		let mut model = FeedForwardModel::new(tiny_config()).unwrap();
		let options = TrainingOptions { epochs: 2, validation_fraction: 0.5, ..TrainingOptions::default() };
		assert!(matches!(model.train(&[], &options, &mut rng), Err(ModelError::EmptyTrainingSet)));

		let pairs: Vec<TrainingPair> = (0..4).map(|i| TrainingPair { window: vec![i, i + 1], target: i + 2 }).collect();
		let metrics = model.train(&pairs, &options, &mut rng).unwrap();
		assert!(metrics.epochs.iter().all(|e| e.val_loss.is_some() && e.val_accuracy.is_some()));
	}
}
