//! Session text buffer and insertion-point tracking.
//!
//! `TextBuffer` is a minimal line-oriented text store standing in for the
//! host editor's buffer: insert/delete/range queries plus a caret and a
//! scroll anchor. `SessionBuffer` layers the terminal-session semantics on
//! top: rendering process output at the insertion point, prompt detection,
//! and the protected process-output range that separates rendered text from
//! the user-editable region.

use comint_types::{Point, Range};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, trace};

/// Control noise removed before rendering. Escape sequences are discarded,
/// not interpreted: colors, cursor movement, and window-title updates all
/// vanish, as do backspaces and carriage returns.
static CONTROL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"\x1b\[[0-9;?]*[A-Za-z]", // CSI sequences (colors, cursor, etc.)
        r"|\x1b\][^\x07]*\x07",    // OSC sequences ending with BEL
        r"|\x1b\][^\x1b]*\x1b\\",  // OSC sequences ending with ST
        r"|\x1b[()][A-Z0-9]",      // Character set selection
        r"|\x1b[=>MNOP78]",        // Other single-char escapes
        r"|\x1b",                  // Catch any remaining bare ESC
        r"|[\x07\x08\r]",          // BEL, backspace, carriage return
    ))
    .unwrap()
});

fn strip_control_sequences(text: &str) -> String {
    CONTROL_REGEX.replace_all(text, "").to_string()
}

/// Byte index of the `column`-th character of `line`.
fn char_to_byte(line: &str, column: usize) -> usize {
    line.char_indices()
        .nth(column)
        .map(|(i, _)| i)
        .unwrap_or(line.len())
}

/// Map a byte offset inside freshly inserted text to buffer coordinates,
/// given the point the insert started at.
fn project_offset(origin: Point, text: &str, byte_offset: usize) -> Point {
    let before = &text[..byte_offset];
    match before.rfind('\n') {
        None => Point::new(origin.row, origin.column + before.chars().count()),
        Some(idx) => Point::new(
            origin.row + before.matches('\n').count(),
            before[idx + 1..].chars().count(),
        ),
    }
}

fn adjust_for_insert(p: Point, inserted: Range) -> Point {
    if p < inserted.start {
        return p;
    }
    let at = inserted.start;
    if p.row == at.row {
        Point::new(inserted.end.row, inserted.end.column + (p.column - at.column))
    } else {
        Point::new(p.row + (inserted.end.row - at.row), p.column)
    }
}

fn adjust_for_delete(p: Point, deleted: Range) -> Point {
    if p <= deleted.start {
        return p;
    }
    if p <= deleted.end {
        return deleted.start;
    }
    if p.row == deleted.end.row {
        Point::new(
            deleted.start.row,
            deleted.start.column + (p.column - deleted.end.column),
        )
    } else {
        Point::new(p.row - (deleted.end.row - deleted.start.row), p.column)
    }
}

/// Line-oriented text store with a caret and a scroll anchor.
///
/// The caret behaves like an editor marker: edits before it shift it so it
/// stays on the same text. Column units are characters, not bytes.
pub struct TextBuffer {
    lines: Vec<String>,
    caret: Point,
    scroll_anchor: Point,
}

impl TextBuffer {
    pub fn new() -> Self {
        Self {
            lines: vec![String::new()],
            caret: Point::zero(),
            scroll_anchor: Point::zero(),
        }
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    pub fn line(&self, row: usize) -> &str {
        &self.lines[row]
    }

    pub fn line_len(&self, row: usize) -> usize {
        self.lines[row].chars().count()
    }

    /// Position just past the last character of the buffer.
    pub fn end_point(&self) -> Point {
        let row = self.lines.len() - 1;
        Point::new(row, self.line_len(row))
    }

    /// The whole buffer as one string.
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }

    pub fn caret(&self) -> Point {
        self.caret
    }

    pub fn set_caret(&mut self, p: Point) {
        self.caret = self.clamp(p);
    }

    pub fn scroll_to(&mut self, p: Point) {
        self.scroll_anchor = self.clamp(p);
    }

    pub fn scroll_anchor(&self) -> Point {
        self.scroll_anchor
    }

    /// Clamp a point into the valid coordinate space of the buffer.
    pub fn clamp(&self, p: Point) -> Point {
        let row = p.row.min(self.lines.len() - 1);
        let column = if p.row > row {
            self.line_len(row)
        } else {
            p.column.min(self.line_len(row))
        };
        Point::new(row, column)
    }

    /// Insert `text` at `at`, returning the range it now occupies.
    pub fn insert(&mut self, at: Point, text: &str) -> Range {
        let at = self.clamp(at);
        let byte = char_to_byte(&self.lines[at.row], at.column);
        let suffix = self.lines[at.row].split_off(byte);

        let mut parts = text.split('\n');
        let first = parts.next().unwrap_or("");
        self.lines[at.row].push_str(first);
        let mut end = Point::new(at.row, at.column + first.chars().count());
        for part in parts {
            end = Point::new(end.row + 1, part.chars().count());
            self.lines.insert(end.row, part.to_string());
        }
        self.lines[end.row].push_str(&suffix);

        let inserted = Range::new(at, end);
        self.caret = adjust_for_insert(self.caret, inserted);
        inserted
    }

    /// Insert at the caret, leaving the caret after the inserted text.
    pub fn insert_at_caret(&mut self, text: &str) -> Range {
        let inserted = self.insert(self.caret, text);
        self.caret = inserted.end;
        inserted
    }

    pub fn delete(&mut self, range: Range) {
        let start = self.clamp(range.start);
        let end = self.clamp(range.end);
        if start >= end {
            return;
        }
        let start_byte = char_to_byte(&self.lines[start.row], start.column);
        let end_byte = char_to_byte(&self.lines[end.row], end.column);
        if start.row == end.row {
            self.lines[start.row].replace_range(start_byte..end_byte, "");
        } else {
            let tail = self.lines[end.row].split_off(end_byte);
            self.lines[start.row].truncate(start_byte);
            self.lines[start.row].push_str(&tail);
            self.lines.drain(start.row + 1..=end.row);
        }
        let deleted = Range::new(start, end);
        self.caret = adjust_for_delete(self.caret, deleted);
        self.scroll_anchor = adjust_for_delete(self.scroll_anchor, deleted);
    }

    pub fn text_in_range(&self, range: Range) -> String {
        let start = self.clamp(range.start);
        let end = self.clamp(range.end);
        if start >= end {
            return String::new();
        }
        let start_byte = char_to_byte(&self.lines[start.row], start.column);
        let end_byte = char_to_byte(&self.lines[end.row], end.column);
        if start.row == end.row {
            return self.lines[start.row][start_byte..end_byte].to_string();
        }
        let mut out = String::from(&self.lines[start.row][start_byte..]);
        for row in start.row + 1..end.row {
            out.push('\n');
            out.push_str(&self.lines[row]);
        }
        out.push('\n');
        out.push_str(&self.lines[end.row][..end_byte]);
        out
    }
}

impl Default for TextBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// Buffer-side state machine of a session: where process output lands, where
/// the user-editable region begins, and where the last prompt sits.
pub struct SessionBuffer {
    text: TextBuffer,
    /// First position not yet confirmed as process-rendered output.
    insertion_point: Point,
    /// Last rendered chunk minus its final character. Text strictly before
    /// this range's end is process-owned; the excluded trailing character is
    /// a deliberate gap so typing just after the boundary can never be
    /// absorbed into the protected range.
    output_range: Option<Range>,
    /// Prompt detected in the most recent render, superseded by each new one.
    prompt_span: Option<Range>,
    prompt_regex: Regex,
}

impl SessionBuffer {
    pub fn new(prompt_regex: Regex) -> Self {
        Self {
            text: TextBuffer::new(),
            insertion_point: Point::zero(),
            output_range: None,
            prompt_span: None,
            prompt_regex,
        }
    }

    pub fn text(&self) -> &TextBuffer {
        &self.text
    }

    /// Mutable access to the underlying text store, for the host's typing
    /// and caret-movement paths.
    pub fn text_mut(&mut self) -> &mut TextBuffer {
        &mut self.text
    }

    pub fn insertion_point(&self) -> Point {
        self.insertion_point
    }

    pub fn output_range(&self) -> Option<Range> {
        self.output_range
    }

    pub fn prompt_span(&self) -> Option<Range> {
        self.prompt_span
    }

    /// End of the protected process-output range; the buffer origin before
    /// any output has rendered.
    pub fn boundary(&self) -> Point {
        self.output_range
            .map(|r| r.end)
            .unwrap_or_else(Point::zero)
    }

    /// One character past the boundary in document order: the start of the
    /// user-editable region. Clamped to the end of the buffer.
    fn after_boundary(&self) -> Point {
        let Some(range) = self.output_range else {
            return Point::zero();
        };
        let boundary = range.end;
        let next = if boundary.column < self.text.line_len(boundary.row) {
            Point::new(boundary.row, boundary.column + 1)
        } else {
            Point::new(boundary.row + 1, 0)
        };
        next.min(self.text.end_point())
    }

    /// Render a chunk of process output at the insertion point.
    pub fn render(&mut self, chunk: &str) {
        let stripped = strip_control_sequences(chunk);
        if stripped.is_empty() {
            trace!(target: "comint::buffer", "Chunk empty after stripping, dropped");
            return;
        }

        // First match only; a prompt sharing a chunk with earlier output is
        // missed. Known limitation of regex-based prompt detection.
        let prompt_match = self
            .prompt_regex
            .find(&stripped)
            .map(|m| (m.start(), m.end()));

        let origin = self.insertion_point;
        let inserted = self.text.insert(origin, &stripped);

        if let Some((start, end)) = prompt_match {
            let span = Range::new(
                project_offset(origin, &stripped, start),
                project_offset(origin, &stripped, end),
            );
            trace!(target: "comint::buffer", "Prompt span {}", span);
            self.prompt_span = Some(span);
        }

        self.output_range = Some(Range::new(inserted.start, self.step_back(inserted.end)));

        debug_assert!(
            inserted.end >= self.insertion_point,
            "insertion point moved backwards"
        );
        self.insertion_point = inserted.end;

        // Follow the output only when the caret is riding the boundary;
        // output must not hijack focus from a user editing elsewhere.
        if self.text.caret() >= inserted.end {
            self.text.scroll_to(inserted.end);
        }
    }

    /// The command text the user is composing.
    ///
    /// With the caret before the protected boundary this is a read-only
    /// probe of that line (context for completion). Otherwise it is all text
    /// from one past the boundary to the end of the buffer; `consume` takes
    /// that text out of the buffer and advances the insertion point to the
    /// buffer's end.
    pub fn current_command(&mut self, consume: bool) -> String {
        let caret = self.text.caret();
        let boundary = self.boundary();
        if caret < boundary {
            return self.text.line(caret.row).to_string();
        }

        let start = self.after_boundary();
        let end = self.text.end_point();
        let command = self.text.text_in_range(Range::new(start, end));
        if consume {
            self.text.delete(Range::new(start, end));
            let end = self.text.end_point();
            self.insertion_point = end;
            self.text.set_caret(end);
            debug!(target: "comint::buffer", "Took command for submission: {:?}", command);
        }
        command
    }

    /// Atomically replace the in-progress line with recalled history text.
    pub fn insert_recalled(&mut self, text: &str) {
        let start = self.after_boundary();
        self.text.delete(Range::new(start, self.text.end_point()));
        let inserted = self.text.insert(start, text);
        self.text.set_caret(inserted.end);
    }

    /// Erase everything from the start of the buffer up to the caret's row.
    pub fn clear(&mut self) {
        let rows = self.text.caret().row;
        if rows == 0 {
            return;
        }
        self.text
            .delete(Range::new(Point::zero(), Point::new(rows, 0)));
        let shift = |p: Point| {
            if p.row >= rows {
                Point::new(p.row - rows, p.column)
            } else {
                Point::zero()
            }
        };
        self.insertion_point = shift(self.insertion_point);
        self.output_range = self
            .output_range
            .map(|r| Range::new(shift(r.start), shift(r.end)));
        self.prompt_span = self
            .prompt_span
            .map(|r| Range::new(shift(r.start), shift(r.end)));
    }

    /// Move the caret past the prompt text when a detected prompt span ends
    /// at or before the caret's row; plain start-of-line otherwise.
    pub fn jump_to_line_start(&mut self) {
        let caret = self.text.caret();
        match self.prompt_span {
            Some(span) if span.end.row <= caret.row => self.text.set_caret(span.end),
            _ => self.text.set_caret(Point::new(caret.row, 0)),
        }
    }

    /// The position one character before `p` in document order.
    fn step_back(&self, p: Point) -> Point {
        if p.column > 0 {
            Point::new(p.row, p.column - 1)
        } else if p.row > 0 {
            Point::new(p.row - 1, self.text.line_len(p.row - 1))
        } else {
            Point::zero()
        }
    }
}
