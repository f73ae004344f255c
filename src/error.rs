//! Модуль обработки ошибок библиотеки shorts-tts
//!
//! Ошибки разделены по этапам конвейера: разбиение текста, синтез одного
//! чанка, склейка аудио и проверка временной шкалы. Все они поднимаются
//! до вызывающего кода как `PipelineError`.

use thiserror::Error;

/// Ошибка разбиения текста на чанки
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChunkingError {
    /// Максимальная длина чанка должна быть положительной
    #[error("Invalid max chunk length: {0}")]
    InvalidMaxLen(usize),

    /// Текст пуст или состоит из одних пробелов
    #[error("Text is required")]
    EmptyText,
}

/// Ошибка синтеза одного чанка
#[derive(Debug, Error)]
pub enum SynthesisError {
    /// Ошибка HTTP запроса (соединение, чтение тела)
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    /// Запрос не уложился в таймаут
    #[error("Synthesis request timed out after {0} seconds")]
    Timeout(u64),

    /// Сервер ответил неуспешным статусом
    #[error("Synthesis service returned status {status}: {body}")]
    Status { status: u16, body: String },

    /// Тело ответа не является корректным JSON
    #[error("Malformed synthesis response: {0}")]
    MalformedJson(#[from] serde_json::Error),

    /// В ответе отсутствует обязательное поле
    #[error("Synthesis response is missing field `{0}`")]
    MissingField(&'static str),

    /// Длины массивов слов и временных меток не совпадают
    #[error("Word timing arrays differ in length: words={words}, wtimes={wtimes}, wdurations={wdurations}")]
    LengthMismatch {
        words: usize,
        wtimes: usize,
        wdurations: usize,
    },

    /// Аудио не удалось декодировать из base64
    #[error("Invalid audio payload: {0}")]
    InvalidAudio(#[from] base64::DecodeError),

    /// Временная метка слова не является конечным неотрицательным числом
    #[error("Invalid timing value {value} for word {index}")]
    InvalidTiming { index: usize, value: f64 },
}

/// Ошибка склейки WAV буферов
#[derive(Debug, Error)]
pub enum MergeError {
    /// Нечего склеивать
    #[error("No audio buffers to merge")]
    Empty,

    /// Буфер короче канонического заголовка
    #[error("Audio buffer of chunk {chunk} is {len} bytes, shorter than the 44-byte WAV header")]
    TooShort { chunk: usize, len: usize },

    /// Буфер не читается как WAV
    #[error("Audio buffer of chunk {chunk} is not a valid WAV file: {source}")]
    InvalidWav {
        chunk: usize,
        #[source]
        source: hound::Error,
    },

    /// Блок `data` не начинается сразу за каноническим заголовком
    #[error("Audio buffer of chunk {chunk} does not carry a canonical 44-byte RIFF/WAVE header")]
    NotCanonical { chunk: usize },

    /// Параметры формата расходятся между чанками
    #[error("Audio format of chunk {chunk} differs: expected {expected}, found {found}")]
    FormatMismatch {
        chunk: usize,
        expected: String,
        found: String,
    },

    /// Данные не помещаются в 32-битные поля размеров заголовка
    #[error("Merged audio payload of {len} bytes does not fit the WAV size fields")]
    TooLarge { len: usize },

    /// Склеенный файл не читается как WAV
    #[error("Merged audio is not a valid WAV file: {0}")]
    Wav(#[from] hound::Error),
}

/// Ошибки конвейера синтеза
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Ошибка разбиения текста
    #[error("Chunking error: {0}")]
    Chunking(#[from] ChunkingError),

    /// Ошибка синтеза конкретного чанка
    #[error("Synthesis error in chunk {chunk}: {source}")]
    Synthesis {
        chunk: u32,
        #[source]
        source: SynthesisError,
    },

    /// Ошибка склейки аудио
    #[error("Audio merge error: {0}")]
    Merge(#[from] MergeError),

    /// Нарушена монотонность временной шкалы
    #[error("Timeline is not monotonic at word {index}: {current_ms} ms follows {previous_ms} ms")]
    TimingInvariant {
        index: usize,
        previous_ms: f64,
        current_ms: f64,
    },

    /// Задание отменено между чанками
    #[error("Job cancelled after {completed_chunks} chunks")]
    Cancelled { completed_chunks: u32 },

    /// Ошибка конфигурации
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Ошибка ввода-вывода
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Ошибка сериализации/десериализации JSON
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PipelineError {
    /// Обернуть ошибку синтеза индексом чанка
    pub fn synthesis(chunk: u32, source: SynthesisError) -> Self {
        Self::Synthesis { chunk, source }
    }

    /// Индекс чанка, если ошибка к нему привязана
    pub fn chunk_index(&self) -> Option<u32> {
        match self {
            Self::Synthesis { chunk, .. } => Some(*chunk),
            Self::Merge(MergeError::TooShort { chunk, .. })
            | Self::Merge(MergeError::InvalidWav { chunk, .. })
            | Self::Merge(MergeError::NotCanonical { chunk })
            | Self::Merge(MergeError::FormatMismatch { chunk, .. }) => Some(*chunk as u32),
            _ => None,
        }
    }
}

/// Тип Result для библиотеки shorts-tts
pub type Result<T> = std::result::Result<T, PipelineError>;
