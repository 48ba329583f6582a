/// Myanmar sentence-final punctuation (section mark, U+104B).
pub const MYANMAR_SECTION_MARK: char = '\u{104B}';

/// Zero-width space (U+200B), used as an invisible word separator in Myanmar text.
pub const ZERO_WIDTH_SPACE: char = '\u{200B}';

/// Token appended after every sentence-like segment.
pub const SEPARATOR_TOKEN: &str = "<SEP>";

/// Coarse separator-based tokenizer.
///
/// The tokenizer does not try to understand the script. It cuts the text into
/// sentence-like segments on a set of boundary characters, then cuts every
/// segment into words on whitespace and zero-width spaces.
///
/// ## Responsibilities:
/// - Produce a flat, ordered token sequence for training
/// - Mark segment boundaries with an explicit separator token
/// - Split user prompts into words (no segment markers) at inference time
///
/// ## Invariants
/// - No emitted word token is empty or contains a word separator
/// - Every kept segment is followed by exactly one separator token
#[derive(Clone, Debug)]
pub struct Tokenizer {
	/// Characters ending a sentence-like segment.
	boundaries: Vec<char>,
	/// Token pushed after each kept segment.
	separator: String,
}

impl Default for Tokenizer {
	/// Myanmar configuration: `'။'` and newline as boundaries, `<SEP>` as separator.
	fn default() -> Self {
		Self::new(vec![MYANMAR_SECTION_MARK, '\n'], SEPARATOR_TOKEN)
	}
}

impl Tokenizer {
	/// Creates a tokenizer with custom boundary characters and separator token.
	pub fn new(boundaries: Vec<char>, separator: &str) -> Self {
		Self {
			boundaries,
			separator: separator.to_owned(),
		}
	}

	/// Returns the separator token emitted after each segment.
	pub fn separator(&self) -> &str {
		&self.separator
	}

	/// Splits `text` into a flat sequence of word tokens and separator tokens.
	///
	/// # Behavior
	/// - Cuts the text on every boundary character.
	/// - Trims each segment; segments that are empty after trimming are dropped.
	/// - Splits each kept segment into words, then appends the separator token,
	///   including after the last segment.
	///
	/// # Notes
	/// - A segment made only of zero-width spaces is not empty after trimming
	///   (`trim` does not strip U+200B), so it yields no word but still one separator.
	pub fn tokenize(&self, text: &str) -> Vec<String> {
		let mut tokens = Vec::new();

		for segment in text.split(|c: char| self.boundaries.contains(&c)) {
			let segment = segment.trim();
			if segment.is_empty() {
				continue;
			}
			tokens.extend(split_words(segment));
			tokens.push(self.separator.clone());
		}

		tokens
	}
}

/// Splits text into words on whitespace and zero-width spaces.
///
/// Empty fragments are discarded. Used to encode prompts, where segment
/// markers are not wanted.
pub fn split_words(text: &str) -> Vec<String> {
	text.split(|c: char| c.is_whitespace() || c == ZERO_WIDTH_SPACE)
		.filter(|word| !word.is_empty())
		.map(str::to_owned)
		.collect()
}
