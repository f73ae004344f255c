//! Сборка общей временной шкалы слов
//!
//! Тайминги каждого чанка отсчитываются от его собственного начала. Чтобы
//! получить шкалу всего задания, каждый следующий чанк сдвигается так, чтобы
//! его первое слово начиналось через `chunk_gap_ms` после конца последнего
//! слова предыдущего непустого чанка.

use serde::{Deserialize, Serialize};

use crate::config::TimingPolicy;
use crate::error::{PipelineError, Result};
use crate::tts::SynthesisResult;

/// Временная шкала слов одного задания
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Timeline {
    /// Слова
    pub words: Vec<String>,
    /// Начало каждого слова от начала аудио (мс)
    pub times_ms: Vec<f64>,
    /// Длительность каждого слова (мс)
    pub durations_ms: Vec<f64>,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Конец последнего слова (мс)
    pub fn end_ms(&self) -> Option<f64> {
        let start = self.times_ms.last()?;
        let duration = self.durations_ms.last()?;
        Some(start + duration)
    }

    /// Добавить результат очередного чанка.
    ///
    /// Возвращает примененный сдвиг или `None`, если чанк без слов был
    /// пропущен. Пустой чанк не влияет на сдвиг следующих.
    pub fn append(&mut self, chunk: &SynthesisResult, policy: &TimingPolicy) -> Option<f64> {
        let chunk_start_ms = *chunk.word_start_ms.first()?;

        let offset = match self.end_ms() {
            Some(last_end_ms) => last_end_ms - chunk_start_ms + policy.chunk_gap_ms,
            None => 0.0,
        };

        for ((word, &start), &duration) in chunk
            .words
            .iter()
            .zip(&chunk.word_start_ms)
            .zip(&chunk.word_duration_ms)
        {
            self.words.push(word.clone());
            self.times_ms.push(start + offset);
            self.durations_ms.push(policy.word_duration(Some(duration)));
        }

        Some(offset)
    }

    /// Проверить, что начала слов не убывают
    pub fn check_monotonic(&self) -> Result<()> {
        for (index, pair) in self.times_ms.windows(2).enumerate() {
            if pair[1] < pair[0] {
                return Err(PipelineError::TimingInvariant {
                    index: index + 1,
                    previous_ms: pair[0],
                    current_ms: pair[1],
                });
            }
        }
        Ok(())
    }
}

/// Присоединить чанк к шкале и вернуть обновленную шкалу
pub fn stitch(mut previous: Timeline, next: &SynthesisResult, policy: &TimingPolicy) -> Timeline {
    previous.append(next, policy);
    previous
}
