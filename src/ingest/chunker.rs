//! Overlapping character-window chunker for prose documents.
//!
//! Splitting strategy, per window:
//! 1. Take up to `max_chars` characters
//! 2. Pull the cut back to the nearest paragraph break in the window's tail
//! 3. Failing that, the nearest newline, then the nearest whitespace
//! 4. Last resort: hard cut at the character limit
//!
//! Consecutive windows overlap by `overlap_chars` so sentences straddling a
//! cut still appear whole in one of them.

/// A window cut from one document, before it becomes an indexed chunk.
#[derive(Debug, Clone, PartialEq)]
pub struct Window {
    pub text: String,
    /// Char offsets into the source text, end exclusive.
    pub span: (usize, usize),
}

/// Cut `text` into overlapping windows. An empty input still yields one
/// (empty) window so every document is represented in the index.
pub fn chunk_text(text: &str, max_chars: usize, overlap_chars: usize) -> Vec<Window> {
    let chars: Vec<char> = text.chars().collect();
    let total = chars.len();

    if total == 0 {
        return vec![Window {
            text: String::new(),
            span: (0, 0),
        }];
    }

    let max = max_chars.max(1);
    let mut windows = Vec::new();
    let mut start = 0usize;

    loop {
        let hard_end = (start + max).min(total);
        let end = if hard_end < total {
            snap_to_boundary(&chars, start, hard_end)
        } else {
            hard_end
        };

        windows.push(Window {
            text: chars[start..end].iter().collect(),
            span: (start, end),
        });

        if end >= total {
            break;
        }

        // Step back by the overlap, but always make forward progress.
        let mut next = end.saturating_sub(overlap_chars);
        if next <= start {
            next = start + 1;
        }
        start = next;
    }

    windows
}

/// Pull `hard_end` back to a natural break, keeping at least 80% of the
/// window so pathological inputs can't shrink chunks to nothing.
fn snap_to_boundary(chars: &[char], start: usize, hard_end: usize) -> usize {
    let min_end = start + (hard_end - start) * 4 / 5;

    // Paragraph break
    let mut i = hard_end;
    while i > min_end + 1 {
        if chars[i - 1] == '\n' && chars[i - 2] == '\n' {
            return i;
        }
        i -= 1;
    }

    // Single newline
    let mut i = hard_end;
    while i > min_end {
        if chars[i - 1] == '\n' {
            return i;
        }
        i -= 1;
    }

    // Any whitespace
    let mut i = hard_end;
    while i > min_end {
        if chars[i - 1].is_whitespace() {
            return i;
        }
        i -= 1;
    }

    hard_end
}
