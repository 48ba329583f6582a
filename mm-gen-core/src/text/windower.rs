use serde::{Deserialize, Serialize};

use super::TokenId;

/// Id used to left-pad short windows.
pub const PAD_ID: TokenId = 0;

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum WindowError {
	#[error("window length must be greater than 0")]
	ZeroLength,
}

/// One supervised example: a fixed-length window and the id that follows it.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct TrainingPair {
	pub window: Vec<TokenId>,
	pub target: TokenId,
}

/// How windows are cut from an id sequence.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum WindowMode {
	/// Full windows only: one pair per offset `0..L-W`, `max(0, L-W)` pairs.
	#[default]
	Strict,
	/// One pair per target position `1..L`; windows near the head are
	/// left-padded with [`PAD_ID`]. Produces `L-1` pairs.
	Padded,
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
#[error("unknown window mode {0:?} (expected `strict` or `padded`)")]
pub struct ParseWindowModeError(String);

impl std::str::FromStr for WindowMode {
	type Err = ParseWindowModeError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_ascii_lowercase().as_str() {
			"strict" => Ok(Self::Strict),
			"padded" => Ok(Self::Padded),
			_ => Err(ParseWindowModeError(s.to_owned())),
		}
	}
}

/// Returns the last `window_len` ids of `ids`, left-padded with [`PAD_ID`].
///
/// Shared by training (padded mode) and generation so both see the same input shape.
pub fn left_pad_window(ids: &[TokenId], window_len: usize) -> Vec<TokenId> {
	let start = ids.len().saturating_sub(window_len);
	let tail = &ids[start..];

	let mut window = Vec::with_capacity(window_len);
	window.resize(window_len - tail.len(), PAD_ID);
	window.extend_from_slice(tail);
	window
}

/// Converts a flat id sequence into `(window, next id)` training pairs.
///
/// Pairs come out in strictly increasing source offset. Too little data is
/// not an error: the result is simply empty and the caller must check it
/// before training.
///
/// # Errors
/// Returns [`WindowError::ZeroLength`] if `window_len == 0`.
pub fn make_windows(ids: &[TokenId], window_len: usize, mode: WindowMode) -> Result<Vec<TrainingPair>, WindowError> {
	if window_len == 0 {
		return Err(WindowError::ZeroLength);
	}

	let pairs = match mode {
		WindowMode::Strict => {
			if ids.len() <= window_len {
				return Ok(Vec::new());
			}
			(0..ids.len() - window_len)
				.map(|i| TrainingPair {
					window: ids[i..i + window_len].to_vec(),
					target: ids[i + window_len],
				})
				.collect()
		}
		WindowMode::Padded => (1..ids.len())
			.map(|t| TrainingPair {
				window: left_pad_window(&ids[..t], window_len),
				target: ids[t],
			})
			.collect(),
	};

	Ok(pairs)
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	fn pair(window: &[TokenId], target: TokenId) -> TrainingPair {
		TrainingPair { window: window.to_vec(), target }
	}

	#[test]
	fn strict_windows_follow_offsets() {
		let pairs = make_windows(&[5, 4, 6, 4], 2, WindowMode::Strict).unwrap();
		assert_eq!(pairs, vec![pair(&[5, 4], 6), pair(&[4, 6], 4)]);
	}

	#[test]
	fn padded_windows_left_pad_the_head() {
		let pairs = make_windows(&[5, 4, 6, 4], 2, WindowMode::Padded).unwrap();
		assert_eq!(pairs, vec![pair(&[0, 5], 4), pair(&[5, 4], 6), pair(&[4, 6], 4)]);
	}

	#[test]
	fn insufficient_data_is_empty_not_error() {
		assert!(make_windows(&[1, 2, 3], 3, WindowMode::Strict).unwrap().is_empty());
		assert!(make_windows(&[], 3, WindowMode::Strict).unwrap().is_empty());
		assert!(make_windows(&[7], 3, WindowMode::Padded).unwrap().is_empty());
	}

	#[test]
	fn window_mode_parses_case_insensitively() {
		assert_eq!("strict".parse::<WindowMode>(), Ok(WindowMode::Strict));
		assert_eq!("Padded".parse::<WindowMode>(), Ok(WindowMode::Padded));
		assert!("sliding".parse::<WindowMode>().is_err());
	}

	#[test]
	fn zero_window_is_rejected() {
		assert_eq!(make_windows(&[1, 2], 0, WindowMode::Strict), Err(WindowError::ZeroLength));
	}

	#[test]
	fn left_pad_keeps_the_tail() {
		assert_eq!(left_pad_window(&[1, 2], 4), vec![0, 0, 1, 2]);
		assert_eq!(left_pad_window(&[1, 2, 3, 4, 5], 3), vec![3, 4, 5]);
		assert_eq!(left_pad_window(&[], 2), vec![0, 0]);
	}

	proptest! {
		#[test]
		fn strict_count_and_targets(ids in proptest::collection::vec(0u32..50, 0..80), window_len in 1usize..12) {
			let pairs = make_windows(&ids, window_len, WindowMode::Strict).unwrap();
			prop_assert_eq!(pairs.len(), ids.len().saturating_sub(window_len));
			for (i, p) in pairs.iter().enumerate() {
				prop_assert_eq!(p.window.len(), window_len);
				prop_assert_eq!(&p.window[..], &ids[i..i + window_len]);
				prop_assert_eq!(p.target, ids[i + window_len]);
			}
		}

		#[test]
		fn padded_windows_are_full_length_and_left_padded(ids in proptest::collection::vec(1u32..50, 0..40), window_len in 1usize..8) {
			let pairs = make_windows(&ids, window_len, WindowMode::Padded).unwrap();
			prop_assert_eq!(pairs.len(), ids.len().saturating_sub(1));
			for (t, p) in pairs.iter().enumerate().map(|(i, p)| (i + 1, p)) {
				prop_assert_eq!(p.window.len(), window_len);
				let pads = window_len.saturating_sub(t);
				prop_assert!(p.window[..pads].iter().all(|id| *id == PAD_ID));
				prop_assert!(p.window[pads..].iter().all(|id| *id != PAD_ID));
				prop_assert_eq!(p.target, ids[t]);
			}
		}
	}
}
