//! Разбиение длинного текста на чанки для синтеза
//!
//! Сервер синтеза ограничивает длину одного запроса, поэтому текст режется
//! на окна не длиннее `max_len` символов. Внутри окна разрез по возможности
//! переносится на последнюю границу предложения.

use serde::{Deserialize, Serialize};

use crate::error::ChunkingError;

/// Символы, на которых допустимо завершить чанк
const SENTENCE_TERMINATORS: [char; 4] = ['.', '!', '?', '\n'];

/// Фрагмент текста для одного запроса синтеза
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextChunk {
    /// Порядковый номер чанка в задании
    pub index: u32,
    /// Текст чанка без пробелов по краям
    pub text: String,
}

impl TextChunk {
    pub fn new(index: u32, text: impl Into<String>) -> Self {
        Self {
            index,
            text: text.into(),
        }
    }

    /// Длина чанка в символах
    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }
}

/// Разбить текст на чанки длиной не более `max_len` символов.
///
/// Если окно не покрывает весь оставшийся текст, разрез делается после
/// последнего терминатора предложения в окне. Терминатор в самом начале окна
/// не учитывается. Без терминаторов окно режется ровно по `max_len`.
pub fn split_text(text: &str, max_len: usize) -> Result<Vec<TextChunk>, ChunkingError> {
    if max_len == 0 {
        return Err(ChunkingError::InvalidMaxLen(max_len));
    }

    let mut chunks = Vec::new();
    let mut remaining = text;

    while !remaining.is_empty() {
        let window_end = remaining
            .char_indices()
            .nth(max_len)
            .map(|(offset, _)| offset)
            .unwrap_or(remaining.len());

        let mut cut = window_end;
        if window_end < remaining.len() {
            let window = &remaining[..window_end];
            if let Some(pos) = window.rfind(|c: char| SENTENCE_TERMINATORS.contains(&c)) {
                // Все терминаторы однобайтовые
                if pos > 0 {
                    cut = pos + 1;
                }
            }
        }

        let piece = remaining[..cut].trim();
        if !piece.is_empty() {
            chunks.push(TextChunk::new(chunks.len() as u32, piece));
        }
        remaining = &remaining[cut..];
    }

    if chunks.len() > 1 {
        log::debug!(
            "Split {} characters into {} chunks (max {} per chunk)",
            text.chars().count(),
            chunks.len(),
            max_len
        );
    }

    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck::TestResult;

    fn strip_whitespace(s: &str) -> String {
        s.chars().filter(|c| !c.is_whitespace()).collect()
    }

    #[test]
    fn test_short_text_is_single_chunk() {
        let chunks = split_text("  Hello world.  ", 450).unwrap();
        assert_eq!(chunks, vec![TextChunk::new(0, "Hello world.")]);
    }

    #[test]
    fn test_zero_max_len_is_rejected() {
        assert_eq!(split_text("abc", 0), Err(ChunkingError::InvalidMaxLen(0)));
    }

    #[test]
    fn test_blank_text_yields_no_chunks() {
        assert!(split_text("   \n ", 10).unwrap().is_empty());
        assert!(split_text("", 10).unwrap().is_empty());
    }

    #[test]
    fn test_cuts_on_last_sentence_terminator() {
        let text = "One two. Three four! Five six seven";
        let chunks = split_text(text, 24).unwrap();
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["One two. Three four!", "Five six seven"]);
        assert_eq!(chunks[1].index, 1);
    }

    #[test]
    fn test_newline_is_a_terminator() {
        let text = "first line\nsecond line goes on";
        let chunks = split_text(text, 15).unwrap();
        assert_eq!(chunks[0].text, "first line");
    }

    #[test]
    fn test_hard_cut_without_terminator() {
        let chunks = split_text("abcdefghij", 4).unwrap();
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["abcd", "efgh", "ij"]);
    }

    #[test]
    fn test_terminator_at_window_start_is_ignored() {
        let chunks = split_text(".abcdefgh", 4).unwrap();
        assert_eq!(chunks[0].text, ".abc");
    }

    #[test]
    fn test_multibyte_text_respects_char_boundaries() {
        let text = "Привет мир. Как дела у тебя сегодня";
        let chunks = split_text(text, 12).unwrap();
        assert_eq!(chunks[0].text, "Привет мир.");
        assert!(chunks.iter().all(|c| c.char_count() <= 12));
    }

    #[quickcheck_macros::quickcheck]
    fn prop_chunks_cover_text(text: String, max_len: u8) -> TestResult {
        if max_len == 0 {
            return TestResult::discard();
        }
        let chunks = split_text(&text, max_len as usize).unwrap();
        let joined = chunks
            .iter()
            .map(|c| c.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        TestResult::from_bool(strip_whitespace(&joined) == strip_whitespace(&text))
    }

    #[quickcheck_macros::quickcheck]
    fn prop_chunks_are_bounded_and_ordered(text: String, max_len: u8) -> TestResult {
        if max_len == 0 {
            return TestResult::discard();
        }
        let chunks = split_text(&text, max_len as usize).unwrap();
        let ok = chunks.iter().enumerate().all(|(i, c)| {
            c.index as usize == i && !c.text.is_empty() && c.char_count() <= max_len as usize
        });
        TestResult::from_bool(ok)
    }
}
