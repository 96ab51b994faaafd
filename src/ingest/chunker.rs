use std::collections::VecDeque;

/// Separator priority for recursive splitting: paragraph, line, sentence,
/// word, then single characters as the last resort.
const SEPARATORS: [&str; 5] = ["\n\n", "\n", ". ", " ", ""];

/// Recursive character splitter. Splits on the highest-priority separator
/// present, re-splits oversized fragments with the remaining separators, and
/// greedily merges small fragments up to `chunk_size`. When a chunk is
/// emitted, trailing fragments totalling at most `chunk_overlap` characters
/// are retained, so each chunk's tail literally prefixes the next chunk.
#[derive(Debug, Clone)]
pub struct Chunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl Chunker {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            chunk_size,
            chunk_overlap: chunk_overlap.min(chunk_size - 1),
        }
    }

    pub fn split(&self, text: &str) -> Vec<String> {
        if text.trim().is_empty() {
            return Vec::new();
        }
        self.split_with(text, &SEPARATORS)
    }

    fn split_with(&self, text: &str, separators: &[&str]) -> Vec<String> {
        let (index, separator) = separators
            .iter()
            .enumerate()
            .find(|(_, sep)| sep.is_empty() || text.contains(**sep))
            .map(|(i, sep)| (i, *sep))
            .unwrap_or((separators.len() - 1, ""));
        let remaining = &separators[index + 1..];

        let pieces = split_keeping_separator(text, separator);

        let mut chunks = Vec::new();
        let mut mergeable: Vec<String> = Vec::new();
        for piece in pieces {
            if char_len(&piece) < self.chunk_size {
                mergeable.push(piece);
                continue;
            }

            if !mergeable.is_empty() {
                chunks.extend(self.merge(&mergeable));
                mergeable.clear();
            }
            if remaining.is_empty() {
                chunks.push(piece);
            } else {
                chunks.extend(self.split_with(&piece, remaining));
            }
        }
        if !mergeable.is_empty() {
            chunks.extend(self.merge(&mergeable));
        }

        chunks
    }

    /// Pieces carry their leading separator, so joining is plain
    /// concatenation and emitted chunks are exact substrings of the source
    /// (modulo edge trimming).
    fn merge(&self, pieces: &[String]) -> Vec<String> {
        let mut merged = Vec::new();
        let mut window: VecDeque<&str> = VecDeque::new();
        let mut total = 0usize;

        for piece in pieces {
            let piece_len = char_len(piece);

            if total + piece_len > self.chunk_size && !window.is_empty() {
                if let Some(chunk) = join_window(&window) {
                    merged.push(chunk);
                }
                while total > self.chunk_overlap
                    || (total + piece_len > self.chunk_size && total > 0)
                {
                    let Some(front) = window.pop_front() else {
                        break;
                    };
                    total -= char_len(front);
                }
            }

            total += piece_len;
            window.push_back(piece);
        }

        if let Some(chunk) = join_window(&window) {
            merged.push(chunk);
        }

        merged
    }
}

/// Splits while attaching the separator to the following piece, so no
/// characters are lost between pieces. The empty separator splits into
/// single characters.
fn split_keeping_separator(text: &str, separator: &str) -> Vec<String> {
    if separator.is_empty() {
        return text.chars().map(String::from).collect();
    }

    let mut pieces = Vec::new();
    for (position, part) in text.split(separator).enumerate() {
        if position == 0 {
            if !part.is_empty() {
                pieces.push(part.to_string());
            }
        } else {
            pieces.push(format!("{}{}", separator, part));
        }
    }
    pieces
}

fn join_window(window: &VecDeque<&str>) -> Option<String> {
    let joined: String = window.iter().copied().collect();
    let trimmed = joined.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Reads the page number out of the first `[Page {n}]` marker in a chunk.
pub fn parse_page_marker(text: &str) -> Option<u32> {
    let start = text.find("[Page ")? + "[Page ".len();
    let rest = &text[start..];
    let end = rest.find(']')?;
    rest[..end].trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shared_overlap(prev: &str, next: &str, max: usize) -> usize {
        let limit = max.min(prev.len()).min(next.len());
        (1..=limit)
            .rev()
            .find(|&k| prev[prev.len() - k..] == next[..k])
            .unwrap_or(0)
    }

    #[test]
    fn short_text_yields_a_single_chunk() {
        let chunker = Chunker::new(800, 200);
        let chunks = chunker.split("Hello world. This is a test document.");
        assert_eq!(chunks, vec!["Hello world. This is a test document."]);
    }

    #[test]
    fn empty_and_whitespace_input_yield_nothing() {
        let chunker = Chunker::new(100, 10);
        assert!(chunker.split("").is_empty());
        assert!(chunker.split(" \n\t ").is_empty());
    }

    #[test]
    fn paragraphs_are_kept_together_when_they_fit() {
        let text = "First paragraph here.\n\nSecond paragraph here.\n\nThird paragraph here.";
        let chunker = Chunker::new(50, 0);
        let chunks = chunker.split(text);

        assert!(chunks.len() >= 2);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 50, "oversized chunk: {:?}", chunk);
            assert!(text.contains(chunk.as_str()), "not a substring: {:?}", chunk);
        }
    }

    #[test]
    fn chunks_appear_in_source_order_and_cover_the_text() {
        let words: Vec<String> = (0..60).map(|i| format!("word{:02}", i)).collect();
        let text = words.join(" ");
        let chunker = Chunker::new(48, 12);
        let chunks = chunker.split(&text);

        assert!(chunks.len() > 1);
        let mut last_start = 0;
        for chunk in &chunks {
            let position = text
                .find(chunk.as_str())
                .unwrap_or_else(|| panic!("chunk not found in source: {:?}", chunk));
            assert!(position >= last_start, "out of order: {:?}", chunk);
            last_start = position;
        }

        let joined = chunks.join(" ");
        for word in &words {
            assert!(joined.contains(word.as_str()), "missing word {}", word);
        }
    }

    #[test]
    fn each_chunk_tail_prefixes_the_next_chunk() {
        let words: Vec<String> = (0..50).map(|i| format!("w{:02}", i)).collect();
        let text = words.join(" ");
        let chunker = Chunker::new(40, 10);
        let chunks = chunker.split(&text);

        assert!(chunks.len() > 2);
        for pair in chunks.windows(2) {
            let overlap = shared_overlap(&pair[0], &pair[1], 10);
            assert!(
                overlap > 0,
                "no overlap between {:?} and {:?}",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn unbroken_text_falls_back_to_character_splits() {
        let chunker = Chunker::new(10, 2);
        let chunks = chunker.split("abcdefghijklmnopqrstuvwxy");

        assert_eq!(chunks, vec!["abcdefghij", "ijklmnopqr", "qrstuvwxy"]);
    }

    #[test]
    fn page_markers_parse_from_chunk_text() {
        assert_eq!(parse_page_marker("[Page 3]\nsome text"), Some(3));
        assert_eq!(parse_page_marker("prefix [Page 12] suffix"), Some(12));
        assert_eq!(parse_page_marker("no marker here"), None);
        assert_eq!(parse_page_marker("[Page x]"), None);
    }
}
