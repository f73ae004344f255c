//! Модуль для работы с TTS
//!
//! Разбиение текста, обращение к серверу синтеза и сборка общей
//! временной шкалы слов из результатов отдельных чанков.

pub mod chunker;
pub mod headtts;
pub mod timeline;

use async_trait::async_trait;

use crate::config::VoiceSettings;
use crate::error::SynthesisError;

pub use chunker::{split_text, TextChunk};
pub use headtts::{HeadTtsClient, SynthesisResult};
pub use timeline::{stitch, Timeline};

/// Источник синтезированной речи для одного чанка текста
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Синтезировать один чанк. Один вызов соответствует одному запросу.
    ///
    /// Возвращает тело ответа как есть, в схеме ответа HeadTTS. Конвейер
    /// сохраняет его до разбора через `SynthesisResult::from_json`.
    async fn synthesize_raw(
        &self,
        text: &str,
        settings: &VoiceSettings,
    ) -> Result<Vec<u8>, SynthesisError>;
}
