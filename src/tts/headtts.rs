//! Модуль для интеграции с сервером HeadTTS
//!
//! Один чанк текста отправляется одним POST запросом на `/v1/synthesize`.
//! Сервер отвечает JSON объектом с WAV аудио в base64 и пословными
//! таймингами (`words`, `wtimes`, `wdurations`). Ответ проверяется здесь,
//! дальше по конвейеру идут только согласованные данные.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::{PipelineConfig, TimingPolicy, VoiceSettings};
use crate::error::{PipelineError, Result, SynthesisError};
use crate::tts::SpeechSynthesizer;

/// Формат аудио, который всегда запрашивается у сервера.
/// Склейка WAV рассчитана на одинаковый формат всех чанков.
pub const AUDIO_ENCODING: &str = "wav";

/// Тело запроса синтеза
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SynthesisRequest<'a> {
    input: &'a str,
    voice: &'a str,
    language: &'a str,
    speed: f32,
    audio_encoding: &'a str,
}

/// Ответ сервера в том виде, в каком он пришел
#[derive(Debug, Deserialize)]
struct RawSynthesisResponse {
    audio: Option<String>,
    words: Option<Vec<String>>,
    wtimes: Option<Vec<f64>>,
    wdurations: Option<Vec<Option<f64>>>,
}

/// Результат синтеза одного чанка
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisResult {
    /// Слова в порядке произнесения
    pub words: Vec<String>,
    /// Начало каждого слова относительно начала чанка (мс)
    pub word_start_ms: Vec<f64>,
    /// Длительность каждого слова (мс)
    pub word_duration_ms: Vec<f64>,
    /// WAV файл целиком
    pub audio: Vec<u8>,
}

impl SynthesisResult {
    /// Создать результат, проверив согласованность массивов
    pub fn new(
        words: Vec<String>,
        word_start_ms: Vec<f64>,
        word_duration_ms: Vec<f64>,
        audio: Vec<u8>,
    ) -> std::result::Result<Self, SynthesisError> {
        if words.len() != word_start_ms.len() || words.len() != word_duration_ms.len() {
            return Err(SynthesisError::LengthMismatch {
                words: words.len(),
                wtimes: word_start_ms.len(),
                wdurations: word_duration_ms.len(),
            });
        }
        for (index, &value) in word_start_ms.iter().enumerate() {
            if !value.is_finite() || value < 0.0 {
                return Err(SynthesisError::InvalidTiming { index, value });
            }
        }
        for (index, &value) in word_duration_ms.iter().enumerate() {
            if !value.is_finite() {
                return Err(SynthesisError::InvalidTiming { index, value });
            }
        }

        Ok(Self {
            words,
            word_start_ms,
            word_duration_ms,
            audio,
        })
    }

    /// Разобрать JSON ответ сервера.
    ///
    /// Отсутствующая или нулевая длительность слова заменяется порогом из
    /// `policy`. Отсутствие аудио или массивов считается ошибкой.
    pub fn from_json(
        body: &[u8],
        policy: &TimingPolicy,
    ) -> std::result::Result<Self, SynthesisError> {
        let raw: RawSynthesisResponse = serde_json::from_slice(body)?;

        let audio = match raw.audio {
            Some(audio) if !audio.is_empty() => audio,
            _ => return Err(SynthesisError::MissingField("audio")),
        };
        let words = raw.words.ok_or(SynthesisError::MissingField("words"))?;
        let wtimes = raw.wtimes.ok_or(SynthesisError::MissingField("wtimes"))?;
        let wdurations = raw
            .wdurations
            .ok_or(SynthesisError::MissingField("wdurations"))?;

        if words.len() != wtimes.len() || words.len() != wdurations.len() {
            return Err(SynthesisError::LengthMismatch {
                words: words.len(),
                wtimes: wtimes.len(),
                wdurations: wdurations.len(),
            });
        }

        let durations = wdurations
            .into_iter()
            .map(|d| policy.word_duration(d))
            .collect();
        let audio = base64::engine::general_purpose::STANDARD.decode(audio.trim())?;

        Self::new(words, wtimes, durations, audio)
    }

    /// Представить результат в схеме ответа сервера
    pub fn to_response_json(&self) -> serde_json::Value {
        serde_json::json!({
            "audio": base64::engine::general_purpose::STANDARD.encode(&self.audio),
            "words": self.words,
            "wtimes": self.word_start_ms,
            "wdurations": self.word_duration_ms,
        })
    }

    /// Количество слов в чанке
    pub fn word_count(&self) -> usize {
        self.words.len()
    }

    /// Чанк без слов (например, одна пунктуация)
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

/// Клиент сервера HeadTTS
#[derive(Debug, Clone)]
pub struct HeadTtsClient {
    client: Client,
    endpoint: String,
    synthesize_url: String,
    timeout_secs: u64,
    timing: TimingPolicy,
}

impl HeadTtsClient {
    /// Создать клиент по конфигурации конвейера
    pub fn new(config: &PipelineConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| {
                PipelineError::Configuration(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            synthesize_url: config.synthesize_url(),
            timeout_secs: config.request_timeout_secs,
            timing: config.timing,
        })
    }

    /// Проверить, что сервер отвечает.
    ///
    /// Любой HTTP ответ считается признаком живого сервера.
    pub async fn check_health(&self) -> std::result::Result<(), SynthesisError> {
        match self.client.get(&self.endpoint).send().await {
            Ok(response) => {
                log::debug!("HeadTTS server responded with status {}", response.status());
                Ok(())
            }
            Err(e) => Err(self.map_request_error(e)),
        }
    }

    /// Синтезировать чанк и разобрать ответ с порогами из конфигурации
    pub async fn synthesize(
        &self,
        text: &str,
        settings: &VoiceSettings,
    ) -> std::result::Result<SynthesisResult, SynthesisError> {
        let body = self.synthesize_raw(text, settings).await?;
        SynthesisResult::from_json(&body, &self.timing)
    }

    fn map_request_error(&self, e: reqwest::Error) -> SynthesisError {
        if e.is_timeout() {
            log::error!("HeadTTS request timed out after {}s", self.timeout_secs);
            SynthesisError::Timeout(self.timeout_secs)
        } else {
            if e.is_connect() {
                log::error!(
                    "HeadTTS server is not running or not accessible at {}",
                    self.endpoint
                );
            }
            SynthesisError::Http(e)
        }
    }
}

#[async_trait]
impl SpeechSynthesizer for HeadTtsClient {
    async fn synthesize_raw(
        &self,
        text: &str,
        settings: &VoiceSettings,
    ) -> std::result::Result<Vec<u8>, SynthesisError> {
        let request = SynthesisRequest {
            input: text,
            voice: settings.voice.as_str(),
            language: &settings.language,
            speed: settings.speed,
            audio_encoding: AUDIO_ENCODING,
        };

        log::debug!(
            "Sending {} characters to HeadTTS with voice {}",
            text.chars().count(),
            settings.voice
        );

        let response = self
            .client
            .post(&self.synthesize_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.map_request_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = match response.text().await {
                Ok(text) => text,
                Err(e) => format!("Failed to read error response: {}", e),
            };
            log::error!("HeadTTS synthesis failed (status {}): {}", status, body);
            return Err(SynthesisError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| self.map_request_error(e))?;
        Ok(body.to_vec())
    }
}
