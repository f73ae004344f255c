//! Библиотека shorts-tts: озвучка текста через HeadTTS с пословными субтитрами
//!
//! Текст режется на чанки, каждый чанк по очереди отправляется на сервер
//! синтеза, пословные тайминги сшиваются в общую временную шкалу, WAV чанков
//! склеиваются в один файл, а по шкале строятся субтитры. Задание атомарно:
//! либо обработаны все чанки, либо возвращается ошибка без частичного результата.

pub mod config;
pub mod error;
pub mod media;
pub mod notification;
pub mod progress;
pub mod subtitle;
pub mod tts;
pub mod utils;

use std::path::PathBuf;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::{PipelineConfig, VoiceSettings};
use crate::error::{ChunkingError, PipelineError, Result};
use crate::media::{merge_wav_buffers, MergedAudio};
use crate::progress::{
    DefaultProgressReporter, ProcessStep, ProgressObserver, ProgressReporter, ProgressTracker,
};
use crate::subtitle::{build_cues, SubtitleCue};
use crate::tts::{split_text, HeadTtsClient, SpeechSynthesizer, SynthesisResult, Timeline};
use crate::utils::{JobManifest, JobWorkspace};

/// Результат успешного задания
#[derive(Debug, Clone)]
pub struct JobOutput {
    /// Идентификатор задания
    pub job_id: String,
    /// Склеенное аудио
    pub audio: MergedAudio,
    /// Субтитры по одному на слово
    pub cues: Vec<SubtitleCue>,
    /// Общая временная шкала слов
    pub timeline: Timeline,
    /// Количество чанков
    pub chunk_count: usize,
    /// Рабочая директория, если аудио, субтитры и сводка сохранены
    pub workspace: Option<PathBuf>,
}

/// Конвейер синтеза.
///
/// Конвейер можно разделить между задачами через `Arc` и запускать
/// несколько заданий одновременно: у каждого задания свой трекер
/// прогресса, репортер общий.
pub struct TtsPipeline<S = HeadTtsClient> {
    config: PipelineConfig,
    synthesizer: S,
    progress_reporter: Option<Arc<dyn ProgressReporter>>,
}

impl TtsPipeline<HeadTtsClient> {
    /// Создать конвейер с клиентом HeadTTS по конфигурации
    pub fn from_config(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        let client = HeadTtsClient::new(&config)?;
        Ok(Self::new(config, client))
    }
}

impl<S: SpeechSynthesizer> TtsPipeline<S> {
    pub fn new(config: PipelineConfig, synthesizer: S) -> Self {
        Self {
            config,
            synthesizer,
            progress_reporter: None,
        }
    }

    /// Подключить репортер прогресса
    pub fn with_progress_reporter(mut self, reporter: Box<dyn ProgressReporter>) -> Self {
        self.progress_reporter = Some(Arc::from(reporter));
        self
    }

    /// Добавить наблюдателя прогресса.
    ///
    /// Возвращает `None`, если репортер еще используется запущенным заданием.
    pub fn add_observer(&mut self, observer: Box<dyn ProgressObserver>) -> Option<usize> {
        let reporter = self
            .progress_reporter
            .get_or_insert_with(|| Arc::new(DefaultProgressReporter::new()));
        Arc::get_mut(reporter).map(|reporter| reporter.add_observer(observer))
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn synthesizer(&self) -> &S {
        &self.synthesizer
    }

    /// Выполнить задание с голосом из конфигурации
    pub async fn synthesize(&self, text: &str) -> Result<JobOutput> {
        self.run(text, &self.config.voice).await
    }

    /// Выполнить задание
    pub async fn run(&self, text: &str, settings: &VoiceSettings) -> Result<JobOutput> {
        self.run_with_cancel(text, settings, &CancellationToken::new())
            .await
    }

    /// Выполнить задание с возможностью отмены.
    ///
    /// Токен проверяется только между чанками: начатый запрос синтеза
    /// всегда доводится до конца.
    pub async fn run_with_cancel(
        &self,
        text: &str,
        settings: &VoiceSettings,
        cancel: &CancellationToken,
    ) -> Result<JobOutput> {
        let job_id = uuid::Uuid::new_v4().to_string();
        log::info!(
            "Starting TTS job {} ({} characters, voice {}, speed {})",
            job_id,
            text.chars().count(),
            settings.voice,
            settings.speed
        );

        let tracker = self
            .progress_reporter
            .clone()
            .map(|reporter| ProgressTracker::for_job(reporter, job_id.as_str()));

        match self
            .execute(&job_id, text, settings, cancel, tracker.as_ref())
            .await
        {
            Ok(output) => {
                if let Some(tracker) = &tracker {
                    tracker.complete();
                }
                log::info!(
                    "Finished TTS job {}: {} chunks, {} words, {:.0} ms of audio",
                    job_id,
                    output.chunk_count,
                    output.timeline.len(),
                    output.audio.duration_ms()
                );
                Ok(output)
            }
            Err(e) => {
                if let Some(tracker) = &tracker {
                    tracker.fail(&e.to_string());
                }
                log::error!("TTS job {} failed: {}", job_id, e);
                Err(e)
            }
        }
    }

    async fn execute(
        &self,
        job_id: &str,
        text: &str,
        settings: &VoiceSettings,
        cancel: &CancellationToken,
        tracker: Option<&ProgressTracker>,
    ) -> Result<JobOutput> {
        let timing = &self.config.timing;
        let step = |step: ProcessStep| {
            if let Some(tracker) = tracker {
                tracker.set_step(step);
            }
        };

        settings.validate()?;

        // 1. Разбиение текста
        step(ProcessStep::Chunking);
        let chunks = split_text(text, self.config.max_chunk_len)?;
        if chunks.is_empty() {
            return Err(ChunkingError::EmptyText.into());
        }
        let total = chunks.len();
        log::info!("Text split into {} chunks", total);

        let workspace = self.open_workspace(job_id, text).await;

        // 2. Синтез по чанкам, строго по порядку
        step(ProcessStep::SpeechSynthesis);
        let mut timeline = Timeline::new();
        let mut buffers = Vec::with_capacity(total);

        for (done, chunk) in chunks.iter().enumerate() {
            if cancel.is_cancelled() {
                log::warn!("Job {} cancelled after {} of {} chunks", job_id, done, total);
                return Err(PipelineError::Cancelled {
                    completed_chunks: done as u32,
                });
            }

            log::info!(
                "Processing chunk {}/{} ({} characters)",
                done + 1,
                total,
                chunk.char_count()
            );

            let body = self
                .synthesizer
                .synthesize_raw(&chunk.text, settings)
                .await
                .map_err(|e| PipelineError::synthesis(chunk.index, e))?;

            // Ответ сохраняется до разбора, чтобы неверный ответ остался на диске
            if self.config.persist_responses {
                if let Some(workspace) = &workspace {
                    if let Err(e) = workspace.write_response(chunk.index, &body).await {
                        log::warn!("Failed to persist response for chunk {}: {}", chunk.index, e);
                    }
                }
            }

            let result = SynthesisResult::from_json(&body, timing)
                .map_err(|e| PipelineError::synthesis(chunk.index, e))?;

            match timeline.append(&result, timing) {
                Some(offset) => log::debug!(
                    "Chunk {}: {} words, offset {:.0} ms",
                    chunk.index,
                    result.word_count(),
                    offset
                ),
                None => log::warn!("Chunk {} returned no words, skipping timing", chunk.index),
            }
            buffers.push(result.audio);

            if let Some(tracker) = tracker {
                tracker.chunk_completed(done + 1, total);
            }
        }

        timeline.check_monotonic()?;

        // 3. Склейка аудио
        step(ProcessStep::AudioMerge);
        let audio = merge_wav_buffers(&buffers)?;

        // 4. Субтитры
        step(ProcessStep::SubtitleBuilding);
        let cues = build_cues(&timeline, timing);

        let mut output = JobOutput {
            job_id: job_id.to_string(),
            audio,
            cues,
            timeline,
            chunk_count: total,
            workspace: None,
        };

        // 5. Сохранение
        if let Some(workspace) = &workspace {
            step(ProcessStep::Persisting);
            match self.persist(workspace, &output, settings).await {
                Ok(()) => output.workspace = Some(workspace.path().to_path_buf()),
                Err(e) => log::warn!(
                    "Failed to persist artifacts to {}: {}",
                    workspace.path().display(),
                    e
                ),
            }
        }

        Ok(output)
    }

    async fn open_workspace(&self, job_id: &str, text: &str) -> Option<JobWorkspace> {
        let root = self.config.work_dir.as_ref()?;
        let workspace = match JobWorkspace::create(root, job_id).await {
            Ok(workspace) => workspace,
            Err(e) => {
                log::warn!("Failed to create job workspace in {}: {}", root.display(), e);
                return None;
            }
        };
        if let Err(e) = workspace.write_script(text).await {
            log::warn!("Failed to persist script for job {}: {}", job_id, e);
        }
        Some(workspace)
    }

    async fn persist(
        &self,
        workspace: &JobWorkspace,
        output: &JobOutput,
        settings: &VoiceSettings,
    ) -> Result<()> {
        let audio_path = workspace.write_audio(&output.audio).await?;
        workspace.write_subtitles(&output.cues).await?;
        workspace
            .write_manifest(&JobManifest {
                job_id: output.job_id.clone(),
                created_at: chrono::Utc::now(),
                voice: settings.clone(),
                chunk_count: output.chunk_count,
                word_count: output.timeline.len(),
                audio_duration_ms: output.audio.duration_ms(),
            })
            .await?;
        log::info!("Audio saved to {}", audio_path.display());
        Ok(())
    }
}

/// Озвучить текст с параметрами из конфигурации
pub async fn synthesize_text(text: &str, config: PipelineConfig) -> Result<JobOutput> {
    TtsPipeline::from_config(config)?.synthesize(text).await
}
