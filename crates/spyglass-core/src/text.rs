//! Byte-offset normalization and text decoding.
//!
//! Anchors store raw byte offsets into their file. The [`Normalizer`]
//! translates those offsets into `(byte, line, column)` points consistent
//! with the file's newline layout:
//!
//! - byte offsets are 0-indexed
//! - lines are 1-indexed
//! - columns are 0-indexed byte offsets from the line start

use serde::{Deserialize, Serialize};

use crate::schema::facts::DEFAULT_TEXT_ENCODING;

/// A location within a file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    /// Byte offset from the start of the file (0-indexed).
    pub byte_offset: usize,
    /// Line number (1-indexed).
    pub line_number: u32,
    /// Byte offset from the start of the line (0-indexed).
    pub column_offset: usize,
}

impl Point {
    /// A point naming only a byte offset.
    pub fn at_byte(byte_offset: usize) -> Point {
        Point {
            byte_offset,
            ..Point::default()
        }
    }

    /// A point naming only a line.
    pub fn at_line(line_number: u32) -> Point {
        Point {
            line_number,
            ..Point::default()
        }
    }
}

/// Translates byte offsets within one file into line/column points.
///
/// Construction precomputes the byte offset of each line start; lookups are
/// binary searches. The normalizer is pure and holds no store reference.
#[derive(Debug, Clone)]
pub struct Normalizer {
    text_len: usize,
    line_starts: Vec<usize>,
}

impl Normalizer {
    /// Build a normalizer over a file's raw bytes.
    pub fn new(text: &[u8]) -> Normalizer {
        let mut line_starts = vec![0];
        for (i, &b) in text.iter().enumerate() {
            if b == b'\n' {
                line_starts.push(i + 1);
            }
        }
        Normalizer {
            text_len: text.len(),
            line_starts,
        }
    }

    /// Number of lines in the file. An empty file has one (empty) line.
    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    /// The full point for a byte offset, clamped to the end of the file.
    pub fn byte_offset(&self, offset: usize) -> Point {
        let offset = offset.min(self.text_len);
        let line_index = self.line_starts.partition_point(|&start| start <= offset) - 1;
        Point {
            byte_offset: offset,
            line_number: (line_index + 1) as u32,
            column_offset: offset - self.line_starts[line_index],
        }
    }

    /// Complete a partial point.
    ///
    /// A positive byte offset wins; otherwise a positive line number resolves
    /// to that line's start plus the column (clamped to the line), and a line
    /// past the end of the file resolves to end-of-file. A zero point is the
    /// start of the file.
    pub fn point(&self, partial: &Point) -> Point {
        if partial.byte_offset > 0 {
            return self.byte_offset(partial.byte_offset);
        }
        if partial.line_number > 0 {
            let line_index = (partial.line_number - 1) as usize;
            let Some(&start) = self.line_starts.get(line_index) else {
                return self.byte_offset(self.text_len);
            };
            let line_end = self
                .line_starts
                .get(line_index + 1)
                .copied()
                .unwrap_or(self.text_len);
            let column = partial.column_offset.min(line_end - start);
            return Point {
                byte_offset: start + column,
                line_number: partial.line_number,
                column_offset: column,
            };
        }
        self.byte_offset(0)
    }
}

/// Decode `bytes` from the named encoding into UTF-8.
///
/// An empty or unrecognized encoding label falls back to the default
/// encoding; undecodable sequences are replaced rather than surfaced.
pub fn to_utf8(encoding: &str, bytes: &[u8]) -> String {
    let label = if encoding.is_empty() {
        DEFAULT_TEXT_ENCODING
    } else {
        encoding
    };
    let encoding =
        encoding_rs::Encoding::for_label(label.as_bytes()).unwrap_or(encoding_rs::UTF_8);
    let (decoded, _, _) = encoding.decode(bytes);
    decoded.into_owned()
}
