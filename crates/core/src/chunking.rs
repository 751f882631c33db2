//! Splitting of long replies into platform-sized messages.
//!
//! Lengths are counted in UTF-16 code units, which is how the chat platform measures message
//! content. Splits only ever happen on `char` boundaries, so a surrogate pair is never torn.

pub const DEFAULT_MAX_LEN: usize = 2000;
pub const ELLIPSIS: &str = "...";

const FENCE: &str = "```";
const MIN_MAX_LEN: usize = 16;
/// `"\n```"`, the room a chunk inside a fence keeps free for its forced closing line.
const CLOSE_RESERVE: usize = 4;

pub fn utf16_len(text: &str) -> usize {
    text.chars().map(char::len_utf16).sum()
}

/// Splits `text` into segments of at most `max_len` UTF-16 units.
///
/// Lines are kept whole where possible. A fenced code block that straddles a segment boundary is
/// closed at the end of the first segment and reopened (with its language tag) at the start of
/// the next. Segments outside code are trimmed and empty segments are dropped.
pub fn chunk_message(text: &str, max_len: usize) -> Vec<String> {
    let mut chunker = Chunker::new(max_len.max(MIN_MAX_LEN));
    for line in text.split('\n') {
        chunker.push_line(line);
    }
    chunker.finish()
}

/// Cuts `text` to at most `limit` UTF-16 units, ending with `...` when anything was removed.
pub fn truncate_with_ellipsis(text: &str, limit: usize) -> String {
    if utf16_len(text) <= limit {
        return text.to_owned();
    }

    let budget = limit.saturating_sub(utf16_len(ELLIPSIS));
    let (head, _) = split_at_utf16(text, budget);
    format!("{head}{ELLIPSIS}")
}

fn split_at_utf16(text: &str, budget: usize) -> (&str, &str) {
    let mut used = 0;
    for (index, ch) in text.char_indices() {
        used += ch.len_utf16();
        if used > budget {
            return text.split_at(index);
        }
    }
    (text, "")
}

struct Chunker {
    max_len: usize,
    chunks: Vec<String>,
    buf: String,
    buf_len: usize,
    in_code: bool,
    has_body: bool,
    /// Byte offset of the opening fence line in `buf`.
    fence_start: usize,
    lang: String,
}

impl Chunker {
    fn new(max_len: usize) -> Self {
        Self {
            max_len,
            chunks: Vec::new(),
            buf: String::new(),
            buf_len: 0,
            in_code: false,
            has_body: false,
            fence_start: 0,
            lang: String::new(),
        }
    }

    fn push_line(&mut self, line: &str) {
        let trimmed = line.trim_start();

        if !self.in_code && trimmed.starts_with(FENCE) {
            self.open_fence(line, trimmed[FENCE.len()..].trim());
            return;
        }

        if self.in_code && line.trim() == FENCE {
            let closing = if self.fits(line, 0) { line } else { FENCE };
            self.append(closing);
            self.in_code = false;
            self.has_body = false;
            self.lang.clear();
            return;
        }

        let reserve = self.reserve();
        if self.fits(line, reserve) {
            self.append(line);
            self.has_body = true;
            return;
        }

        self.flush_for_overflow();
        if self.fits(line, reserve) {
            self.append(line);
            self.has_body = true;
        } else {
            self.push_long_line(line);
        }
    }

    fn open_fence(&mut self, line: &str, lang: &str) {
        self.lang = lang.to_owned();
        // A fence line too long to ever be reopened is reduced to a bare marker.
        let opening = if utf16_len(line) + CLOSE_RESERVE + 3 <= self.max_len {
            line.to_owned()
        } else {
            self.lang.clear();
            FENCE.to_owned()
        };

        if !self.fits(&opening, CLOSE_RESERVE) {
            self.flush_plain();
        }
        self.fence_start = if self.buf.is_empty() { 0 } else { self.buf.len() + 1 };
        self.append(&opening);
        self.in_code = true;
        self.has_body = false;
    }

    fn push_long_line(&mut self, line: &str) {
        let mut rest = line;
        while !rest.is_empty() {
            let used = if self.buf.is_empty() { 0 } else { self.buf_len + 1 };
            let capacity = self.max_len.saturating_sub(used + self.reserve());
            let (head, tail) = split_at_utf16(rest, capacity);

            if head.is_empty() {
                self.flush_for_overflow();
                continue;
            }

            self.append(head);
            self.has_body = true;
            rest = tail;
            if !rest.is_empty() {
                self.flush_for_overflow();
            }
        }
    }

    fn reserve(&self) -> usize {
        if self.in_code {
            CLOSE_RESERVE
        } else {
            0
        }
    }

    fn fits(&self, line: &str, reserve: usize) -> bool {
        let separator = usize::from(!self.buf.is_empty());
        self.buf_len + separator + utf16_len(line) + reserve <= self.max_len
    }

    fn append(&mut self, line: &str) {
        if !self.buf.is_empty() {
            self.buf.push('\n');
            self.buf_len += 1;
        }
        self.buf.push_str(line);
        self.buf_len += utf16_len(line);
    }

    fn flush_for_overflow(&mut self) {
        if !self.in_code {
            self.flush_plain();
            return;
        }
        if !self.has_body {
            self.detach_fence();
            return;
        }

        self.buf.push('\n');
        self.buf.push_str(FENCE);
        self.chunks.push(std::mem::take(&mut self.buf));
        self.buf_len = 0;

        let header = self.reopen_header();
        self.append(&header);
        self.has_body = false;
        self.fence_start = 0;
    }

    /// Moves a bodiless opening fence out of a buffer that also holds earlier text, so the
    /// fence starts the next chunk on its own.
    fn detach_fence(&mut self) {
        if self.fence_start == 0 {
            return;
        }

        let opening = self.buf.split_off(self.fence_start);
        self.flush_plain();
        self.append(&opening);
        self.fence_start = 0;
    }

    fn reopen_header(&self) -> String {
        let header = format!("{FENCE}{}", self.lang);
        // Keep room for the newline, one surrogate pair and the closing fence.
        if utf16_len(&header) + 1 + 2 + CLOSE_RESERVE <= self.max_len {
            header
        } else {
            FENCE.to_owned()
        }
    }

    fn flush_plain(&mut self) {
        let trimmed = self.buf.trim();
        if !trimmed.is_empty() {
            self.chunks.push(trimmed.to_owned());
        }
        self.buf.clear();
        self.buf_len = 0;
    }

    fn finish(mut self) -> Vec<String> {
        self.flush_plain();
        self.chunks
    }
}
