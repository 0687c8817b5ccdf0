//! Rope utilities and extensions.

use ropey::RopeSlice;

/// Returns the number of lines, including the empty line after a trailing newline.
#[inline]
pub fn line_count(text: RopeSlice) -> u32 {
	text.len_lines() as u32
}

/// Returns the character length of `line`, excluding its line terminator.
///
/// Lines past the end of the text have length zero.
pub fn line_len(text: RopeSlice, line: u32) -> u32 {
	let idx = line as usize;
	if idx >= text.len_lines() {
		return 0;
	}
	let slice = text.line(idx);
	let mut len = slice.len_chars();
	if len > 0 && slice.char(len - 1) == '\n' {
		len -= 1;
		if len > 0 && slice.char(len - 1) == '\r' {
			len -= 1;
		}
	}
	len as u32
}

#[cfg(test)]
mod tests {
	use ropey::Rope;

	use super::*;

	#[test]
	fn test_trailing_newline() {
		let text = Rope::from("hello\nworld\n");
		assert_eq!(line_count(text.slice(..)), 3);
		assert_eq!(line_len(text.slice(..), 0), 5);
		assert_eq!(line_len(text.slice(..), 2), 0);
	}

	#[test]
	fn test_crlf_terminator_excluded() {
		let text = Rope::from("ab\r\ncd");
		assert_eq!(line_len(text.slice(..), 0), 2);
		assert_eq!(line_len(text.slice(..), 1), 2);
	}

	#[test]
	fn test_empty() {
		let text = Rope::from("");
		assert_eq!(line_count(text.slice(..)), 1);
		assert_eq!(line_len(text.slice(..), 0), 0);
		assert_eq!(line_len(text.slice(..), 7), 0);
	}
}
