//! Character-window text chunking with sentence-boundary trimming.

/// A chunk of corpus text ready for embedding.
#[derive(Debug, Clone)]
pub struct TextChunk {
    pub text: String,
    /// Source identifier (file name).
    pub source: String,
    /// Character offset in the original document.
    pub start_offset: usize,
    /// Chunk index within the source.
    pub chunk_index: usize,
}

/// Splits documents into overlapping character windows.
#[derive(Debug, Clone)]
pub struct TextChunker {
    chunk_size: usize,
    overlap: usize,
}

impl TextChunker {
    pub fn new(chunk_size: usize, overlap: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            overlap,
        }
    }

    /// Split `text` into overlapping chunks attributed to `source`.
    pub fn split(&self, text: &str, source: &str) -> Vec<TextChunk> {
        let chars: Vec<char> = text.chars().collect();
        let total = chars.len();
        let mut chunks = Vec::new();

        if total == 0 {
            return chunks;
        }

        let step = self.chunk_size.saturating_sub(self.overlap).max(1);
        let mut start = 0;
        let mut chunk_index = 0;

        while start < total {
            let end = (start + self.chunk_size).min(total);
            let window: String = chars[start..end].iter().collect();

            // Interior chunks end at a sentence boundary when one is near.
            let body = if end < total {
                trim_to_sentence_boundary(&window)
            } else {
                window
            };

            let trimmed = body.trim();
            if !trimmed.is_empty() {
                chunks.push(TextChunk {
                    text: trimmed.to_string(),
                    source: source.to_string(),
                    start_offset: start,
                    chunk_index,
                });
                chunk_index += 1;
            }

            start += step;
        }

        chunks
    }
}

/// Cut the window at the last sentence ending in its final fifth, if any.
fn trim_to_sentence_boundary(window: &str) -> String {
    const ENDINGS: [&str; 6] = [". ", "! ", "? ", ".\n", "!\n", "?\n"];

    let char_count = window.chars().count();
    let search_from = window
        .char_indices()
        .nth(char_count * 4 / 5)
        .map(|(byte, _)| byte)
        .unwrap_or(0);

    let tail = &window[search_from..];
    let cut = ENDINGS
        .iter()
        .filter_map(|ending| tail.rfind(ending).map(|pos| search_from + pos + ending.len()))
        .max();

    match cut {
        Some(pos) => window[..pos].to_string(),
        None => window.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_produces_overlapping_chunks() {
        let chunker = TextChunker::new(100, 20);
        let text = "This is a test sentence. ".repeat(20);

        let chunks = chunker.split(&text, "sample.txt");

        assert!(chunks.len() > 1);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.chunk_index, i);
            assert_eq!(chunk.source, "sample.txt");
            assert!(!chunk.text.is_empty());
        }
        // Windows advance by chunk_size - overlap.
        assert_eq!(chunks[1].start_offset, 80);
    }

    #[test]
    fn test_split_empty_text() {
        let chunker = TextChunker::new(100, 20);
        assert!(chunker.split("", "empty.txt").is_empty());
        assert!(chunker.split("   \n  ", "blank.txt").is_empty());
    }

    #[test]
    fn test_short_text_single_chunk() {
        let chunker = TextChunker::new(512, 50);
        let chunks = chunker.split("One short paragraph.", "short.txt");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "One short paragraph.");
        assert_eq!(chunks[0].start_offset, 0);
    }

    #[test]
    fn test_sentence_boundary_trimming() {
        // The last complete sentence ends inside the final fifth of the window.
        let window = format!("{}Tail sentence ends here. Trailing frag", "x".repeat(80));
        let trimmed = trim_to_sentence_boundary(&window);
        assert!(trimmed.ends_with("ends here. "));
    }

    #[test]
    fn test_multibyte_text_does_not_panic() {
        let chunker = TextChunker::new(50, 10);
        let text = "Ωμέγα και άλφα. ".repeat(30);
        let chunks = chunker.split(&text, "greek.txt");
        assert!(!chunks.is_empty());
    }
}
