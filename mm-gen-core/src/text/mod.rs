//! Training-data preparation: raw text to token ids to training pairs.
//!
//! - Coarse separator-based tokenization (`Tokenizer`)
//! - Insertion-ordered token/id mapping with control tokens (`Vocabulary`)
//! - Sliding-window pair construction (`make_windows`)

/// Integer id of a token in a [`vocabulary::Vocabulary`].
pub type TokenId = u32;

/// Sentence/word splitting for Myanmar text.
pub mod tokenizer;

/// Token/id bijection with reserved control tokens.
///
/// Built once from a corpus, frozen afterwards, persisted next to checkpoints.
pub mod vocabulary;

/// Fixed-length `(window, next id)` pair construction with left padding.
pub mod windower;

pub use tokenizer::{split_words, Tokenizer};
pub use vocabulary::{ParseReservedTokensError, ReservedTokens, Vocabulary, VocabularyError};
pub use windower::{left_pad_window, make_windows, ParseWindowModeError, TrainingPair, WindowError, WindowMode};
