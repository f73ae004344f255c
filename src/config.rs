//! Модуль конфигурации библиотеки shorts-tts
//!
//! Этот модуль содержит структуры и перечисления для настройки конвейера:
//! адрес сервера HeadTTS, голос, параметры разбиения и политику таймингов.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

/// Минимальная длительность слова, если сервер не вернул свою (мс)
pub const DEFAULT_WORD_DURATION_FLOOR_MS: f64 = 250.0;
/// Пауза между соседними чанками на временной шкале (мс)
pub const DEFAULT_CHUNK_GAP_MS: f64 = 100.0;
/// Минимальный визуальный зазор между соседними субтитрами (мс)
pub const DEFAULT_CUE_GAP_MS: f64 = 20.0;
/// Минимальная длительность показа субтитра (мс)
pub const DEFAULT_MIN_CUE_MS: f64 = 100.0;
/// Максимальная длина чанка в символах
pub const DEFAULT_MAX_CHUNK_LEN: usize = 450;

/// Голос HeadTTS
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TtsVoice {
    AfHeart,
    AfAlloy,
    AfAoede,
    AfBella,
    AfJessica,
    AfKore,
    AfNicole,
    AfNova,
    AfRiver,
    AfSarah,
    AfSky,
    AmAdam,
    AmEcho,
    AmEric,
    AmFenrir,
    AmLiam,
    AmMichael,
    AmOnyx,
    AmPuck,
    AmSanta,
    BfAlice,
    BfEmma,
    BfIsabella,
    BfLily,
    BmDaniel,
    BmFable,
    BmGeorge,
    BmLewis,
}

impl Default for TtsVoice {
    fn default() -> Self {
        Self::AmFenrir
    }
}

impl TtsVoice {
    /// Все голоса, которые знает сервер
    pub const ALL: [TtsVoice; 28] = [
        Self::AfHeart,
        Self::AfAlloy,
        Self::AfAoede,
        Self::AfBella,
        Self::AfJessica,
        Self::AfKore,
        Self::AfNicole,
        Self::AfNova,
        Self::AfRiver,
        Self::AfSarah,
        Self::AfSky,
        Self::AmAdam,
        Self::AmEcho,
        Self::AmEric,
        Self::AmFenrir,
        Self::AmLiam,
        Self::AmMichael,
        Self::AmOnyx,
        Self::AmPuck,
        Self::AmSanta,
        Self::BfAlice,
        Self::BfEmma,
        Self::BfIsabella,
        Self::BfLily,
        Self::BmDaniel,
        Self::BmFable,
        Self::BmGeorge,
        Self::BmLewis,
    ];

    /// Получить идентификатор голоса на стороне сервера
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AfHeart => "af_heart",
            Self::AfAlloy => "af_alloy",
            Self::AfAoede => "af_aoede",
            Self::AfBella => "af_bella",
            Self::AfJessica => "af_jessica",
            Self::AfKore => "af_kore",
            Self::AfNicole => "af_nicole",
            Self::AfNova => "af_nova",
            Self::AfRiver => "af_river",
            Self::AfSarah => "af_sarah",
            Self::AfSky => "af_sky",
            Self::AmAdam => "am_adam",
            Self::AmEcho => "am_echo",
            Self::AmEric => "am_eric",
            Self::AmFenrir => "am_fenrir",
            Self::AmLiam => "am_liam",
            Self::AmMichael => "am_michael",
            Self::AmOnyx => "am_onyx",
            Self::AmPuck => "am_puck",
            Self::AmSanta => "am_santa",
            Self::BfAlice => "bf_alice",
            Self::BfEmma => "bf_emma",
            Self::BfIsabella => "bf_isabella",
            Self::BfLily => "bf_lily",
            Self::BmDaniel => "bm_daniel",
            Self::BmFable => "bm_fable",
            Self::BmGeorge => "bm_george",
            Self::BmLewis => "bm_lewis",
        }
    }

    /// Короткое имя, которое показывает интерфейс
    fn from_alias(alias: &str) -> Option<Self> {
        let voice = match alias {
            "fenrir" => Self::AmFenrir,
            "michael" => Self::AmMichael,
            "bella" => Self::AfBella,
            "jessica" => Self::AfJessica,
            "nova" => Self::AfNova,
            "sarah" => Self::AfSarah,
            "lily" => Self::BfLily,
            "emma" => Self::BfEmma,
            "george" => Self::BmGeorge,
            "daniel" => Self::BmDaniel,
            _ => return None,
        };
        Some(voice)
    }

    /// Разрешить имя голоса из интерфейса.
    ///
    /// Принимает идентификаторы сервера и короткие имена. Неизвестное имя
    /// заменяется голосом по умолчанию с предупреждением в логе.
    pub fn resolve(name: &str) -> Self {
        let name = name.trim().to_ascii_lowercase();
        if let Some(voice) = Self::from_alias(&name) {
            return voice;
        }
        match name.parse::<Self>() {
            Ok(voice) => voice,
            Err(_) => {
                let fallback = Self::default();
                log::warn!(
                    "Unknown voice '{}', falling back to default voice '{}'",
                    name,
                    fallback.as_str()
                );
                fallback
            }
        }
    }
}

impl fmt::Display for TtsVoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TtsVoice {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|voice| voice.as_str() == s)
            .ok_or_else(|| PipelineError::Configuration(format!("Unknown voice: {}", s)))
    }
}

/// Параметры голоса для одного задания
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct VoiceSettings {
    /// Голос
    pub voice: TtsVoice,
    /// Язык, например `en-us`
    pub language: String,
    /// Множитель скорости речи
    pub speed: f32,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            voice: TtsVoice::default(),
            language: "en-us".to_string(),
            speed: 1.0,
        }
    }
}

impl VoiceSettings {
    /// Проверить параметры голоса
    pub fn validate(&self) -> Result<()> {
        if !self.speed.is_finite() || self.speed <= 0.0 {
            return Err(PipelineError::Configuration(format!(
                "Speed must be a positive number, got {}",
                self.speed
            )));
        }
        if self.language.trim().is_empty() {
            return Err(PipelineError::Configuration(
                "Language must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Политика таймингов для склейки чанков и построения субтитров.
///
/// Значения подобраны под вертикальные ролики с пословными субтитрами;
/// для другого рендера их можно подстроить.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TimingPolicy {
    /// Минимальная длительность слова (мс)
    pub word_duration_floor_ms: f64,
    /// Пауза между чанками (мс)
    pub chunk_gap_ms: f64,
    /// Зазор между соседними субтитрами (мс)
    pub cue_gap_ms: f64,
    /// Минимальная длительность субтитра (мс)
    pub min_cue_ms: f64,
}

impl Default for TimingPolicy {
    fn default() -> Self {
        Self {
            word_duration_floor_ms: DEFAULT_WORD_DURATION_FLOOR_MS,
            chunk_gap_ms: DEFAULT_CHUNK_GAP_MS,
            cue_gap_ms: DEFAULT_CUE_GAP_MS,
            min_cue_ms: DEFAULT_MIN_CUE_MS,
        }
    }
}

impl TimingPolicy {
    /// Длительность слова с учетом минимального порога
    pub fn word_duration(&self, duration_ms: Option<f64>) -> f64 {
        match duration_ms {
            Some(d) if d > 0.0 => d,
            _ => self.word_duration_floor_ms,
        }
    }

    fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("word_duration_floor_ms", self.word_duration_floor_ms),
            ("chunk_gap_ms", self.chunk_gap_ms),
            ("cue_gap_ms", self.cue_gap_ms),
            ("min_cue_ms", self.min_cue_ms),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(PipelineError::Configuration(format!(
                    "Timing value {} must be a non-negative number, got {}",
                    name, value
                )));
            }
        }
        if self.word_duration_floor_ms == 0.0 {
            return Err(PipelineError::Configuration(
                "word_duration_floor_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Конфигурация конвейера
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Базовый адрес сервера HeadTTS
    pub endpoint: String,
    /// Параметры голоса по умолчанию
    pub voice: VoiceSettings,
    /// Максимальная длина чанка в символах
    pub max_chunk_len: usize,
    /// Таймаут одного запроса синтеза в секундах
    pub request_timeout_secs: u64,
    /// Политика таймингов
    pub timing: TimingPolicy,
    /// Корневая директория для рабочих папок заданий
    pub work_dir: Option<PathBuf>,
    /// Сохранять ответы сервера для диагностики
    pub persist_responses: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:8882".to_string(),
            voice: VoiceSettings::default(),
            max_chunk_len: DEFAULT_MAX_CHUNK_LEN,
            request_timeout_secs: 120,
            timing: TimingPolicy::default(),
            work_dir: None,
            persist_responses: true,
        }
    }
}

impl PipelineConfig {
    /// Загрузить конфигурацию из JSON файла
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::Configuration(format!(
                "Failed to read config {}: {}",
                path.display(),
                e
            ))
        })?;
        let config: Self = serde_json::from_str(&contents).map_err(|e| {
            PipelineError::Configuration(format!("Failed to parse config: {}", e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Переопределить значения из переменных окружения
    ///
    /// Поддерживаются `HEADTTS_URL`, `HEADTTS_VOICE`, `HEADTTS_LANGUAGE`, `HEADTTS_SPEED`.
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("HEADTTS_URL") {
            self.endpoint = url;
        }
        if let Some(voice) = lookup("HEADTTS_VOICE") {
            self.voice.voice = TtsVoice::resolve(&voice);
        }
        if let Some(language) = lookup("HEADTTS_LANGUAGE") {
            self.voice.language = language;
        }
        if let Some(speed) = lookup("HEADTTS_SPEED") {
            self.voice.speed = speed.trim().parse().map_err(|_| {
                PipelineError::Configuration(format!("Invalid HEADTTS_SPEED: {}", speed))
            })?;
        }
        self.validate()?;
        Ok(self)
    }

    /// Проверить конфигурацию
    pub fn validate(&self) -> Result<()> {
        if self.endpoint.trim().is_empty() {
            return Err(PipelineError::Configuration(
                "HeadTTS endpoint is required".to_string(),
            ));
        }
        if self.max_chunk_len == 0 {
            return Err(PipelineError::Configuration(
                "max_chunk_len must be greater than zero".to_string(),
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(PipelineError::Configuration(
                "request_timeout_secs must be greater than zero".to_string(),
            ));
        }
        self.voice.validate()?;
        self.timing.validate()
    }

    /// Полный адрес метода синтеза
    pub fn synthesize_url(&self) -> String {
        format!("{}/v1/synthesize", self.endpoint.trim_end_matches('/'))
    }
}
