//! Seekable byte-buffer reader.
//!
//! Backed by an immutable byte slice and a cursor. Provides the
//! delimiter/token scanning primitives the document loader is built on,
//! plus scoped temporary seeks that restore the cursor on every exit path.

/// Token delimiters recognized by the scanning primitives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Delimiter {
    /// Carriage return + line feed
    CrLf,
    /// Carriage return
    Cr,
    /// Line feed
    Lf,
    /// Horizontal tab
    Tab,
    /// Space
    Space,
    /// End of buffer
    Eof,
}

impl Delimiter {
    fn pattern(&self) -> &'static [u8] {
        match self {
            Delimiter::CrLf => b"\r\n",
            Delimiter::Cr => b"\r",
            Delimiter::Lf => b"\n",
            Delimiter::Tab => b"\t",
            Delimiter::Space => b" ",
            Delimiter::Eof => b"",
        }
    }
}

/// Cursor over an immutable byte buffer.
#[derive(Debug)]
pub struct ByteReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    /// Wrap a byte slice, cursor at offset 0.
    pub fn new(buf: &'a [u8]) -> Self {
        ByteReader { buf, pos: 0 }
    }

    /// Current cursor position.
    pub fn tell(&self) -> usize {
        self.pos
    }

    /// Total buffer length.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Whether the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Reposition the cursor, clamped to the buffer bounds.
    pub fn seek(&mut self, offset: usize) {
        self.pos = offset.min(self.buf.len());
    }

    /// Move the cursor by a signed delta, clamped to the buffer bounds.
    pub fn advance(&mut self, delta: isize) {
        let target = self.pos as isize + delta;
        self.pos = target.clamp(0, self.buf.len() as isize) as usize;
    }

    /// Whether the cursor sits at the end of the buffer.
    pub fn at_eof(&self) -> bool {
        self.pos == self.buf.len()
    }

    /// The unread remainder of the buffer.
    pub fn rest(&self) -> &'a [u8] {
        &self.buf[self.pos..]
    }

    /// Read up to `n` bytes, advancing the cursor.
    pub fn read(&mut self, n: usize) -> &'a [u8] {
        let end = (self.pos + n).min(self.buf.len());
        let data = &self.buf[self.pos..end];
        self.pos = end;
        data
    }

    /// Run `f` with the cursor temporarily placed at `offset`; the previous
    /// position is restored on every exit path, including errors.
    pub fn temp_seek<T>(&mut self, offset: usize, f: impl FnOnce(&mut Self) -> T) -> T {
        let saved = self.pos;
        self.seek(offset);
        let result = f(self);
        self.pos = saved;
        result
    }

    /// Read until the earliest occurrence of any candidate delimiter.
    ///
    /// Returns the bytes before the delimiter and which delimiter matched;
    /// the cursor lands immediately after the delimiter. Among candidates
    /// the match at the lowest buffer offset wins (CRLF beats CR/LF at the
    /// same offset). Returns `None` iff EOF is reached without a match and
    /// `Eof` is not a candidate.
    pub fn read_until(&mut self, delimiters: &[Delimiter]) -> Option<(&'a [u8], Delimiter)> {
        let rest = &self.buf[self.pos..];

        let mut best: Option<(usize, Delimiter)> = None;
        for &delim in delimiters {
            if delim == Delimiter::Eof {
                continue;
            }
            let pattern = delim.pattern();
            if let Some(index) = find(rest, pattern) {
                let better = match best {
                    None => true,
                    // Lowest offset first; on a tie the longer pattern wins.
                    Some((best_index, best_delim)) => {
                        index < best_index
                            || (index == best_index
                                && pattern.len() > best_delim.pattern().len())
                    }
                };
                if better {
                    best = Some((index, delim));
                }
            }
        }

        match best {
            Some((index, delim)) => {
                let data = &rest[..index];
                self.pos += index + delim.pattern().len();
                Some((data, delim))
            }
            None if delimiters.contains(&Delimiter::Eof) => {
                let data = rest;
                self.pos = self.buf.len();
                Some((data, Delimiter::Eof))
            }
            None => None,
        }
    }

    /// Read one line; the terminator is CRLF, CR, LF or EOF.
    pub fn read_line(&mut self) -> &'a [u8] {
        self.read_until(&[
            Delimiter::CrLf,
            Delimiter::Cr,
            Delimiter::Lf,
            Delimiter::Eof,
        ])
        .map(|(data, _)| data)
        .unwrap_or(&[])
    }

    /// Read the next whitespace-delimited token, skipping blank runs.
    ///
    /// Returns `None` when only whitespace remains.
    pub fn read_next_token(&mut self) -> Option<&'a [u8]> {
        loop {
            let (data, delim) = self.read_until(&[
                Delimiter::CrLf,
                Delimiter::Cr,
                Delimiter::Lf,
                Delimiter::Tab,
                Delimiter::Space,
                Delimiter::Eof,
            ])?;
            if data.iter().all(|b| matches!(b, b'\r' | b'\n' | b'\t' | b' ')) {
                if data.is_empty() && delim == Delimiter::Eof {
                    return None;
                }
                if !data.is_empty() {
                    return Some(trim_token(data));
                }
                continue;
            }
            return Some(trim_token(data));
        }
    }

    /// Read until the earliest occurrence of any byte pattern.
    ///
    /// The cursor lands immediately after the matched pattern; the returned
    /// slice excludes it. Used for keyword scanning (`stream`, `endobj`,
    /// `startxref` forms) where delimiters are multi-byte keywords.
    pub fn read_until_pattern(&mut self, patterns: &[&[u8]]) -> Option<(&'a [u8], usize)> {
        let rest = &self.buf[self.pos..];
        let mut best: Option<(usize, usize)> = None;
        for (pattern_idx, pattern) in patterns.iter().enumerate() {
            if let Some(index) = find(rest, pattern) {
                let better = match best {
                    None => true,
                    Some((best_index, best_pattern)) => {
                        index < best_index
                            || (index == best_index
                                && pattern.len() > patterns[best_pattern].len())
                    }
                };
                if better {
                    best = Some((index, pattern_idx));
                }
            }
        }
        let (index, pattern_idx) = best?;
        let data = &rest[..index];
        self.pos += index + patterns[pattern_idx].len();
        Some((data, pattern_idx))
    }
}

/// First occurrence of `pattern` in `haystack`.
fn find(haystack: &[u8], pattern: &[u8]) -> Option<usize> {
    if pattern.is_empty() || pattern.len() > haystack.len() {
        return None;
    }
    haystack
        .windows(pattern.len())
        .position(|window| window == pattern)
}

fn trim_token(data: &[u8]) -> &[u8] {
    let start = data
        .iter()
        .position(|b| !matches!(b, b'\r' | b'\n' | b'\t' | b' '))
        .unwrap_or(data.len());
    let end = data
        .iter()
        .rposition(|b| !matches!(b, b'\r' | b'\n' | b'\t' | b' '))
        .map(|i| i + 1)
        .unwrap_or(start);
    &data[start..end]
}
