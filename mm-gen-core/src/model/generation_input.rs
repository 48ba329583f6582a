use super::sampling::SamplingError;

/// Parameters of one generation call.
///
/// # Invariants
/// - `temperature` is always positive and finite (enforced by the setters)
#[derive(Clone, Debug, PartialEq)]
pub struct GenerationInput {
	/// Cap on generation steps, also applied to the total sequence length.
	pub max_new_tokens: usize,

	/// Sampling temperature (`< 1` sharper, `> 1` more random).
	temperature: f32,
}

impl Default for GenerationInput {
	fn default() -> Self {
		Self { max_new_tokens: 50, temperature: 1.0 }
	}
}

impl GenerationInput {
	/// Creates an input, validating the temperature.
	///
	/// # Errors
	/// Returns [`SamplingError::InvalidTemperature`] if `temperature` is not `> 0` and finite.
	pub fn new(max_new_tokens: usize, temperature: f32) -> Result<Self, SamplingError> {
		let mut input = Self { max_new_tokens, ..Self::default() };
		input.set_temperature(temperature)?;
		Ok(input)
	}

	pub fn temperature(&self) -> f32 {
		self.temperature
	}

	pub fn set_temperature(&mut self, temperature: f32) -> Result<(), SamplingError> {
		if !(temperature.is_finite() && temperature > 0.0) {
			return Err(SamplingError::InvalidTemperature(temperature));
		}
		self.temperature = temperature;
		Ok(())
	}
}
