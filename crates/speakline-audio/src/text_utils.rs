//! Text preprocessing for synthesis.
//!
//! Strips markdown and splits text into ordered [`Chunk`]s. Every length here
//! is measured in characters, never bytes, so Japanese and other multi-byte
//! text splits at the same sizes as ASCII.

use speakline_core::settings::SplitSettings;
use speakline_core::{Chunk, ChunkMode};

/// Sentence terminators that always end a sentence.
const SENTENCE_TERMINATORS: [char; 5] = ['。', '！', '？', '!', '?'];

/// Clause separators used to break up overlong sentences.
const CLAUSE_SEPARATORS: [char; 2] = ['、', ','];

/// Split `text` into chunks according to `mode`.
///
/// Returns no chunks for blank input.
pub fn split_into_chunks(text: &str, mode: ChunkMode, settings: &SplitSettings) -> Vec<Chunk> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    let pieces = match mode {
        ChunkMode::None => vec![(text.trim().to_string(), 0)],
        ChunkMode::Small => split_fixed(text, settings.small_size, settings.overlap_ratio),
        ChunkMode::Medium => split_fixed(text, settings.medium_size, settings.overlap_ratio),
        ChunkMode::Large => split_fixed(text, settings.large_size, settings.overlap_ratio),
        ChunkMode::Punctuation => split_by_punctuation(
            text,
            settings.punctuation_max_chunk,
            settings.punctuation_min_chunk,
        )
        .into_iter()
        .map(|piece| (piece, 0))
        .collect(),
    };

    let total = pieces.len();
    let chunks: Vec<Chunk> = pieces
        .into_iter()
        .enumerate()
        .map(|(index, (piece, overlap))| Chunk::new(piece, index, total, overlap))
        .collect();

    tracing::debug!(
        mode = %mode,
        chars = char_len(text),
        chunks = chunks.len(),
        "Text split"
    );
    chunks
}

/// Fixed windows of `size` characters, each repeating the last
/// `round(size * overlap_ratio)` characters of its predecessor.
fn split_fixed(text: &str, size: usize, overlap_ratio: f64) -> Vec<(String, usize)> {
    let chars: Vec<char> = text.chars().collect();
    let size = size.max(1);
    let overlap = overlap_chars(size, overlap_ratio);
    let step = size - overlap;

    let mut pieces = Vec::new();
    let mut start = 0;
    while start < chars.len() {
        let end = (start + size).min(chars.len());
        let piece: String = chars[start..end].iter().collect();
        if !piece.trim().is_empty() {
            pieces.push((piece, if start > 0 { overlap } else { 0 }));
        }
        if end == chars.len() {
            break;
        }
        start += step;
    }
    pieces
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss
)]
fn overlap_chars(size: usize, ratio: f64) -> usize {
    let overlap = (size as f64 * ratio.clamp(0.0, 1.0)).round() as usize;
    overlap.min(size - 1)
}

/// Sentence-based chunks: short sentences are merged, long ones are broken
/// at clause separators (or hard-split when there are none).
fn split_by_punctuation(text: &str, max_chars: usize, min_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();

    for sentence in split_sentences(text) {
        let sentence_len = char_len(&sentence);

        if sentence_len > max_chars {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
            }
            chunks.extend(split_long_sentence(&sentence, max_chars));
            continue;
        }

        if current.is_empty() {
            current = sentence;
            continue;
        }

        let current_len = char_len(&current);
        let fits = current_len + sentence_len <= max_chars;
        if fits && (current_len < min_chars || sentence_len < min_chars) {
            join_sentence(&mut current, &sentence);
        } else {
            chunks.push(std::mem::replace(&mut current, sentence));
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    if chunks.is_empty() {
        chunks.push(text.trim().to_string());
    }
    chunks
}

/// Split at sentence terminators, keeping runs of terminators with their
/// sentence. A `.` ends a sentence only before whitespace or end of text.
fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        current.push(c);
        let ends_sentence = SENTENCE_TERMINATORS.contains(&c)
            || (c == '.' && chars.peek().is_none_or(|next| next.is_whitespace()));
        if !ends_sentence {
            continue;
        }
        while let Some(&next) = chars.peek() {
            if !SENTENCE_TERMINATORS.contains(&next) {
                break;
            }
            current.push(next);
            chars.next();
        }
        push_trimmed(&mut sentences, &current);
        current.clear();
    }
    push_trimmed(&mut sentences, &current);
    sentences
}

/// Break a sentence longer than `max_chars` at clause separators.
fn split_long_sentence(sentence: &str, max_chars: usize) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();

    for clause in sentence.split_inclusive(CLAUSE_SEPARATORS) {
        if char_len(&current) + char_len(clause) <= max_chars {
            current.push_str(clause);
            continue;
        }
        if !current.is_empty() {
            parts.push(std::mem::take(&mut current));
        }
        if char_len(clause) > max_chars {
            parts.extend(hard_split(clause, max_chars));
        } else {
            current.push_str(clause);
        }
    }

    if !current.is_empty() {
        parts.push(current);
    }
    parts
}

/// Last resort: cut at exactly `max_chars` characters.
fn hard_split(text: &str, max_chars: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(max_chars)
        .map(|window| window.iter().collect::<String>())
        .filter(|piece| !piece.trim().is_empty())
        .collect()
}

fn join_sentence(current: &mut String, sentence: &str) {
    if current.ends_with(|c: char| c.is_ascii()) {
        current.push(' ');
    }
    current.push_str(sentence);
}

fn push_trimmed(out: &mut Vec<String>, text: &str) {
    let trimmed = text.trim();
    if !trimmed.is_empty() {
        out.push(trimmed.to_string());
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Strip markdown formatting, keeping only speakable text.
///
/// Fenced code blocks and horizontal rules are dropped. Headers, list
/// markers, blockquotes, emphasis, inline code and links are unwrapped.
pub fn strip_markdown(text: &str) -> String {
    let mut lines = Vec::new();
    let mut in_fence = false;

    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
            in_fence = !in_fence;
            continue;
        }
        if in_fence || is_horizontal_rule(trimmed) {
            continue;
        }

        let body = strip_inline(strip_line_prefix(trimmed));
        let body = body.trim();
        if !body.is_empty() {
            lines.push(body.to_string());
        }
    }

    lines.join("\n")
}

fn is_horizontal_rule(line: &str) -> bool {
    line.len() >= 3
        && ['-', '*', '_']
            .iter()
            .any(|&marker| line.chars().all(|c| c == marker || c == ' '))
}

fn strip_line_prefix(line: &str) -> &str {
    let line = line.trim_start_matches('#').trim_start();
    let line = line.trim_start_matches('>').trim_start();

    for bullet in ["- ", "* ", "+ "] {
        if let Some(rest) = line.strip_prefix(bullet) {
            return rest;
        }
    }

    let digits = line.chars().take_while(char::is_ascii_digit).count();
    if digits > 0 {
        if let Some(rest) = line[digits..].strip_prefix(". ") {
            return rest;
        }
    }
    line
}

/// Unwrap `[text](url)` / `![alt](url)` and drop emphasis and code markers.
fn strip_inline(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut rest = line;

    while let Some(open) = rest.find('[') {
        let (before, after) = rest.split_at(open);
        out.push_str(before.strip_suffix('!').unwrap_or(before));
        let after = &after[1..];

        let link = after.find("](").and_then(|close| {
            after[close + 2..]
                .find(')')
                .map(|end| (close, close + 2 + end))
        });
        match link {
            Some((close, end)) => {
                out.push_str(&after[..close]);
                rest = &after[end + 1..];
            }
            None => {
                out.push('[');
                rest = after;
            }
        }
    }
    out.push_str(rest);

    out.chars().filter(|c| !matches!(c, '*' | '`' | '~')).collect()
}
