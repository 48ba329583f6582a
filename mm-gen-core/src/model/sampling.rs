use rand::Rng;

/// Errors raised while turning a model output into a sampled id.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SamplingError {
	#[error("temperature must be a positive finite number, got {0}")]
	InvalidTemperature(f32),

	#[error("distribution has no positive finite mass")]
	DegenerateDistribution,
}

/// Rescales a probability distribution by `temperature`.
///
/// Works in log space: every probability becomes `ln(p) / temperature`, then
/// a softmax renormalizes. `temperature < 1` sharpens, `> 1` flattens, and
/// `1` leaves the distribution unchanged. Zero probabilities stay zero.
///
/// # Errors
/// - [`SamplingError::InvalidTemperature`] if `temperature` is not `> 0` and finite.
/// - [`SamplingError::DegenerateDistribution`] if no entry is positive and finite.
pub fn apply_temperature(probs: &[f32], temperature: f32) -> Result<Vec<f64>, SamplingError> {
	if !(temperature.is_finite() && temperature > 0.0) {
		return Err(SamplingError::InvalidTemperature(temperature));
	}

	let temperature = temperature as f64;
	let logits: Vec<f64> = probs
		.iter()
		.map(|p| {
			let p = *p as f64;
			if p.is_finite() && p > 0.0 { p.ln() / temperature } else { f64::NEG_INFINITY }
		})
		.collect();

	let max = logits.iter().copied().fold(f64::NEG_INFINITY, f64::max);
	if max == f64::NEG_INFINITY {
		return Err(SamplingError::DegenerateDistribution);
	}

	let exps: Vec<f64> = logits.iter().map(|l| (l - max).exp()).collect();
	let sum: f64 = exps.iter().sum();
	Ok(exps.into_iter().map(|e| e / sum).collect())
}

/// Draws one index from a normalized distribution (multinomial, not arg-max).
///
/// Performs an O(n) cumulative scan. Zero-probability entries are never
/// returned; rounding leftovers fall back to the last positive entry.
pub fn sample_index<R: Rng + ?Sized>(probs: &[f64], rng: &mut R) -> Result<usize, SamplingError> {
	let total: f64 = probs.iter().filter(|p| p.is_finite() && **p > 0.0).sum();
	if total <= 0.0 {
		return Err(SamplingError::DegenerateDistribution);
	}

	let mut r = rng.random::<f64>() * total;
	let mut fallback = None;
	for (index, p) in probs.iter().enumerate() {
		if !(p.is_finite() && *p > 0.0) {
			continue;
		}
		if r < *p {
			return Ok(index);
		}
		r -= p;
		fallback = Some(index);
	}

	fallback.ok_or(SamplingError::DegenerateDistribution)
}
