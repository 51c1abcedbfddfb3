//! Safe Cut-Point Scanning
//!
//! Streamed model output arrives in arbitrary token-sized pieces, so the
//! buffering layer regularly has to release a *prefix* of text whose tail is
//! still growing. This module answers one question: given such a span, what is
//! the rightmost offset at which it can be split without breaking a
//! structurally significant unit (paragraph, line, sentence, clause, word)?
//!
//! # Design Philosophy
//!
//! Five pattern classes are tried in strict priority order, strongest
//! structure first:
//!
//! 1. Paragraph break: two or more consecutive line breaks
//! 2. Line break
//! 3. Sentence terminator: `。！？.!?`, including trailing whitespace
//! 4. Clause separator: `，,`, including trailing whitespace
//! 5. Generic whitespace run
//!
//! For each class the scanner takes the *last* occurrence in the span; the
//! candidate cut point is the offset immediately after it. The first candidate
//! that actually shortens the span (strictly greater than zero and strictly
//! less than the span length) wins and lower-priority classes are not
//! consulted. When no class improves on the span end, the whole span is
//! already safe to emit and its length is returned.
//!
//! The scanner is pure and stateless, and deliberately knows nothing about
//! code fences. Fence state lives in the session buffer, which decides
//! *whether* a boundary-aware cut is needed at all.
//!
//! Offsets are byte offsets into the UTF-8 span and always land on a `char`
//! boundary.

/// Sentence-ending punctuation, CJK and Latin.
const SENTENCE_TERMINATORS: [char; 6] = ['。', '！', '？', '.', '!', '?'];

/// Clause-separating punctuation, CJK and Latin.
const CLAUSE_SEPARATORS: [char; 2] = ['，', ','];

/// Returns the rightmost safe byte offset at which `text` can be split.
///
/// Falls back to `text.len()` when the span contains no boundary that would
/// shorten it, the degenerate case where the span already ends cleanly and
/// may be emitted as-is.
#[must_use]
pub fn safe_cut_point(text: &str) -> usize {
    let full = text.len();
    let finders: [fn(&str) -> Option<usize>; 5] = [
        last_paragraph_break,
        last_line_break,
        last_sentence_end,
        last_clause_end,
        last_whitespace_run,
    ];

    for finder in finders {
        if let Some(cut) = finder(text) {
            if cut > 0 && cut < full {
                return cut;
            }
        }
    }

    full
}

/// End offset of the last run of two or more consecutive line breaks.
fn last_paragraph_break(text: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut best = None;
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\n' {
            let start = i;
            while i < bytes.len() && bytes[i] == b'\n' {
                i += 1;
            }
            if i - start >= 2 {
                best = Some(i);
            }
        } else {
            i += 1;
        }
    }
    best
}

/// Offset immediately after the last line break.
fn last_line_break(text: &str) -> Option<usize> {
    text.rfind('\n').map(|idx| idx + 1)
}

/// End offset of the last sentence terminator plus its trailing whitespace.
fn last_sentence_end(text: &str) -> Option<usize> {
    last_marker_end(text, &SENTENCE_TERMINATORS)
}

/// End offset of the last clause separator plus its trailing whitespace.
fn last_clause_end(text: &str) -> Option<usize> {
    last_marker_end(text, &CLAUSE_SEPARATORS)
}

/// End offset of the last maximal whitespace run.
fn last_whitespace_run(text: &str) -> Option<usize> {
    text.char_indices()
        .filter(|(_, c)| c.is_whitespace())
        .last()
        .map(|(idx, c)| idx + c.len_utf8())
}

/// Offset immediately after the last `markers` character, extended over any
/// whitespace that follows it.
fn last_marker_end(text: &str, markers: &[char]) -> Option<usize> {
    let idx = text.rfind(markers)?;
    let marker_len = text[idx..].chars().next().map_or(0, char::len_utf8);
    let mut end = idx + marker_len;
    for c in text[end..].chars() {
        if !c.is_whitespace() {
            break;
        }
        end += c.len_utf8();
    }
    Some(end)
}
