use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::{fs, io};

/// Reads a whole UTF-8 text file into memory.
///
/// - Fails on invalid UTF-8 instead of replacing characters
/// - A leading byte-order mark is stripped
pub fn read_corpus<P: AsRef<Path>>(filename: P) -> io::Result<String> {
	let mut contents = String::new();
	File::open(filename)?.read_to_string(&mut contents)?;
	if let Some(stripped) = contents.strip_prefix('\u{FEFF}') {
		contents = stripped.to_owned();
	}
	Ok(contents)
}

/// Creates `dir` (and its parents) if it does not exist yet.
///
/// Errors if `dir` exists but is not a directory.
pub(crate) fn ensure_dir<P: AsRef<Path>>(dir: P) -> io::Result<()> {
	let dir = dir.as_ref();
	if dir.exists() && !dir.is_dir() {
		return Err(io::Error::new(
			io::ErrorKind::InvalidInput,
			format!("{} exists and is not a directory", dir.display()),
		));
	}
	fs::create_dir_all(dir)
}
