use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::TokenId;

pub const PAD_TOKEN: &str = "<PAD>";
pub const UNK_TOKEN: &str = "<UNK>";
pub const START_TOKEN: &str = "<START>";
pub const END_TOKEN: &str = "<END>";
pub const SEP_TOKEN: &str = "<SEP>";

/// Returned by [`Vocabulary::decode`] for ids outside the assigned range.
pub const UNKNOWN_SENTINEL: &str = "unknown";

/// Rendered in place of ids without a token.
pub const PLACEHOLDER_GLYPH: &str = "?";

/// Errors raised when persisting or restoring a vocabulary.
#[derive(Debug, thiserror::Error)]
pub enum VocabularyError {
	#[error("vocabulary I/O failed: {0}")]
	Io(#[from] std::io::Error),

	#[error("vocabulary file is not valid: {0}")]
	Format(#[from] postcard::Error),

	#[error("vocabulary file is inconsistent: {0}")]
	Inconsistent(String),
}

/// Set of control tokens placed at fixed ids before any corpus token.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ReservedTokens {
	/// `<PAD>`=0, `<UNK>`=1, `<START>`=2, `<END>`=3, `<SEP>`=4.
	#[default]
	Full,
	/// `<PAD>`=0, `<UNK>`=1, `<START>`=2, `<END>`=3.
	WithoutSeparator,
	/// `<PAD>`=0 only. Unseen tokens then encode to the pad id.
	PadOnly,
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
#[error("unknown reserved token set {0:?} (expected `full`, `no-separator` or `pad-only`)")]
pub struct ParseReservedTokensError(String);

impl std::str::FromStr for ReservedTokens {
	type Err = ParseReservedTokensError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_ascii_lowercase().as_str() {
			"full" => Ok(Self::Full),
			"no-separator" => Ok(Self::WithoutSeparator),
			"pad-only" => Ok(Self::PadOnly),
			_ => Err(ParseReservedTokensError(s.to_owned())),
		}
	}
}

impl ReservedTokens {
	/// Reserved tokens in id order.
	pub fn tokens(self) -> &'static [&'static str] {
		match self {
			ReservedTokens::Full => &[PAD_TOKEN, UNK_TOKEN, START_TOKEN, END_TOKEN, SEP_TOKEN],
			ReservedTokens::WithoutSeparator => &[PAD_TOKEN, UNK_TOKEN, START_TOKEN, END_TOKEN],
			ReservedTokens::PadOnly => &[PAD_TOKEN],
		}
	}
}

/// Bijective mapping between tokens and integer ids.
///
/// Ids are contiguous from `0` to `len - 1`. Reserved control tokens come
/// first, then every distinct corpus token in first-seen order, so the same
/// token sequence always produces the same ids.
///
/// # Invariants
/// - Id `0` is always `<PAD>`
/// - `id_to_token` and `token_to_id` describe the same bijection
/// - The vocabulary is frozen once built: no public method mutates it
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Vocabulary {
	reserved: ReservedTokens,
	id_to_token: Vec<String>,
	#[serde(skip)]
	token_to_id: HashMap<String, TokenId>,
}

impl Vocabulary {
	/// Builds a vocabulary from an ordered token sequence.
	///
	/// Tokens already present (including tokens equal to a reserved token, such
	/// as the tokenizer's `<SEP>`) keep their first id.
	pub fn build<S: AsRef<str>>(tokens: &[S], reserved: ReservedTokens) -> Self {
		let mut vocabulary = Self {
			reserved,
			id_to_token: Vec::new(),
			token_to_id: HashMap::new(),
		};

		for token in reserved.tokens() {
			vocabulary.insert(token);
		}
		for token in tokens {
			vocabulary.insert(token.as_ref());
		}

		vocabulary
	}

	/// Adds `token` if missing. Private: the vocabulary is frozen after `build`.
	fn insert(&mut self, token: &str) {
		if self.token_to_id.contains_key(token) {
			return;
		}
		let id = self.id_to_token.len() as TokenId;
		self.id_to_token.push(token.to_owned());
		self.token_to_id.insert(token.to_owned(), id);
	}

	/// Number of tokens, reserved ones included.
	pub fn len(&self) -> usize {
		self.id_to_token.len()
	}

	/// Always `false` for a built vocabulary (`<PAD>` is always present).
	pub fn is_empty(&self) -> bool {
		self.id_to_token.is_empty()
	}

	pub fn reserved(&self) -> ReservedTokens {
		self.reserved
	}

	/// Returns the id of `token`, or `None` if it was never seen.
	pub fn id_of(&self, token: &str) -> Option<TokenId> {
		self.token_to_id.get(token).copied()
	}

	/// Returns the token for `id`, or `None` if out of range.
	pub fn token(&self, id: TokenId) -> Option<&str> {
		self.id_to_token.get(id as usize).map(String::as_str)
	}

	pub fn pad_id(&self) -> TokenId {
		0
	}

	/// Id that unseen tokens encode to: `<UNK>` when reserved, `<PAD>` otherwise.
	pub fn unk_id(&self) -> TokenId {
		self.id_of(UNK_TOKEN).unwrap_or(self.pad_id())
	}

	/// Id of `<END>`, if the reserved set has one.
	pub fn end_id(&self) -> Option<TokenId> {
		match self.reserved {
			ReservedTokens::PadOnly => None,
			_ => self.id_of(END_TOKEN),
		}
	}

	/// Id of `<SEP>`, if present.
	pub fn separator_id(&self) -> Option<TokenId> {
		self.id_of(SEP_TOKEN)
	}

	/// Maps every token to its id. Never fails: unseen tokens map to [`Self::unk_id`].
	pub fn encode<S: AsRef<str>>(&self, tokens: &[S]) -> Vec<TokenId> {
		let unk = self.unk_id();
		tokens
			.iter()
			.map(|token| self.id_of(token.as_ref()).unwrap_or(unk))
			.collect()
	}

	/// Inverse lookup, returning [`UNKNOWN_SENTINEL`] for ids outside the range.
	pub fn decode(&self, id: TokenId) -> &str {
		self.token(id).unwrap_or(UNKNOWN_SENTINEL)
	}

	/// Renders ids as display text: tokens joined by single spaces,
	/// [`PLACEHOLDER_GLYPH`] for ids without a token.
	pub fn render(&self, ids: &[TokenId]) -> String {
		ids.iter()
			.map(|id| self.token(*id).unwrap_or(PLACEHOLDER_GLYPH))
			.collect::<Vec<_>>()
			.join(" ")
	}

	/// Writes the vocabulary to `path` (postcard encoding).
	pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), VocabularyError> {
		let bytes = postcard::to_stdvec(self)?;
		std::fs::write(path, bytes)?;
		Ok(())
	}

	/// Reads a vocabulary written by [`Self::save`] and rebuilds the reverse index.
	///
	/// # Errors
	/// Returns [`VocabularyError::Inconsistent`] if the stored tokens contain
	/// duplicates or do not start with the reserved tokens.
	pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, VocabularyError> {
		let bytes = std::fs::read(path)?;
		let mut vocabulary: Vocabulary = postcard::from_bytes(&bytes)?;

		let reserved_in_place = vocabulary.reserved.tokens()
			.iter()
			.enumerate()
			.all(|(id, token)| vocabulary.id_to_token.get(id).map(String::as_str) == Some(*token));
		if !reserved_in_place {
			return Err(VocabularyError::Inconsistent("reserved tokens are missing".to_owned()));
		}

		vocabulary.token_to_id = HashMap::with_capacity(vocabulary.id_to_token.len());
		for (id, token) in vocabulary.id_to_token.iter().enumerate() {
			if vocabulary.token_to_id.insert(token.clone(), id as TokenId).is_some() {
				return Err(VocabularyError::Inconsistent(format!("duplicate token {token:?}")));
			}
		}

		Ok(vocabulary)
	}
}
