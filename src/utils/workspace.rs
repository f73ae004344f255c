//! Рабочая директория задания
//!
//! У каждого задания своя папка `<root>/<job_id>`. В нее складываются
//! исходный текст, ответы сервера по чанкам, итоговое аудио и субтитры.
//! Сохраненные ответы можно перечитать и заново собрать временную шкалу.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::config::{TimingPolicy, VoiceSettings};
use crate::error::{PipelineError, Result};
use crate::media::MergedAudio;
use crate::subtitle::{render_ass, render_srt, SubtitleCue};
use crate::tts::{SynthesisResult, Timeline};

pub const SCRIPT_FILE: &str = "tts_script.txt";
pub const AUDIO_FILE: &str = "tts_output.wav";
pub const ASS_FILE: &str = "subtitles.ass";
pub const SRT_FILE: &str = "subtitles.srt";
pub const MANIFEST_FILE: &str = "job.json";

const RESPONSE_PREFIX: &str = "tts_response_";
const RESPONSE_SUFFIX: &str = ".json";

/// Сводка по завершенному заданию
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobManifest {
    pub job_id: String,
    pub created_at: DateTime<Utc>,
    pub voice: VoiceSettings,
    pub chunk_count: usize,
    pub word_count: usize,
    pub audio_duration_ms: f64,
}

/// Рабочая директория одного задания
#[derive(Debug)]
pub struct JobWorkspace {
    job_id: String,
    dir: PathBuf,
}

impl JobWorkspace {
    /// Создать директорию для задания `job_id`
    pub async fn create<P: AsRef<Path>>(root: P, job_id: &str) -> Result<Self> {
        let dir = root.as_ref().join(job_id);
        tokio::fs::create_dir_all(&dir).await?;
        log::debug!("Created job workspace {}", dir.display());
        Ok(Self {
            job_id: job_id.to_string(),
            dir,
        })
    }

    /// Открыть директорию существующего задания
    pub fn open<P: AsRef<Path>>(root: P, job_id: &str) -> Result<Self> {
        let dir = root.as_ref().join(job_id);
        if !dir.is_dir() {
            return Err(PipelineError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("Job workspace not found: {}", dir.display()),
            )));
        }
        Ok(Self {
            job_id: job_id.to_string(),
            dir,
        })
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// Путь к итоговому аудио
    pub fn audio_path(&self) -> PathBuf {
        self.dir.join(AUDIO_FILE)
    }

    fn response_path(&self, index: u32) -> PathBuf {
        self.dir
            .join(format!("{}{:05}{}", RESPONSE_PREFIX, index, RESPONSE_SUFFIX))
    }

    /// Сохранить исходный текст
    pub async fn write_script(&self, text: &str) -> Result<PathBuf> {
        let path = self.dir.join(SCRIPT_FILE);
        tokio::fs::write(&path, text).await?;
        Ok(path)
    }

    /// Сохранить тело ответа сервера для чанка без изменений
    pub async fn write_response(&self, index: u32, body: &[u8]) -> Result<PathBuf> {
        let path = self.response_path(index);
        tokio::fs::write(&path, body).await?;
        Ok(path)
    }

    /// Сохранить итоговое аудио
    pub async fn write_audio(&self, audio: &MergedAudio) -> Result<PathBuf> {
        let path = self.audio_path();
        tokio::fs::write(&path, audio.as_bytes()).await?;
        Ok(path)
    }

    /// Сохранить субтитры в ASS и SRT
    pub async fn write_subtitles(&self, cues: &[SubtitleCue]) -> Result<(PathBuf, PathBuf)> {
        let ass_path = self.dir.join(ASS_FILE);
        let srt_path = self.dir.join(SRT_FILE);
        tokio::fs::write(&ass_path, render_ass(cues)).await?;
        tokio::fs::write(&srt_path, render_srt(cues)).await?;
        Ok((ass_path, srt_path))
    }

    /// Сохранить сводку по заданию
    pub async fn write_manifest(&self, manifest: &JobManifest) -> Result<PathBuf> {
        let path = self.dir.join(MANIFEST_FILE);
        tokio::fs::write(&path, serde_json::to_vec_pretty(manifest)?).await?;
        Ok(path)
    }

    /// Прочитать сводку по заданию
    pub fn read_manifest(&self) -> Result<JobManifest> {
        let contents = std::fs::read(self.dir.join(MANIFEST_FILE))?;
        Ok(serde_json::from_slice(&contents)?)
    }

    /// Прочитать сохраненные ответы сервера в порядке чанков
    pub fn load_responses(&self, policy: &TimingPolicy) -> Result<Vec<(u32, SynthesisResult)>> {
        let mut responses = Vec::new();

        for entry in WalkDir::new(&self.dir).min_depth(1).max_depth(1) {
            let entry = entry.map_err(std::io::Error::from)?;
            let name = entry.file_name().to_string_lossy();
            let index = match name
                .strip_prefix(RESPONSE_PREFIX)
                .and_then(|rest| rest.strip_suffix(RESPONSE_SUFFIX))
                .and_then(|index| index.parse::<u32>().ok())
            {
                Some(index) => index,
                None => continue,
            };

            let body = std::fs::read(entry.path())?;
            let result = SynthesisResult::from_json(&body, policy)
                .map_err(|e| PipelineError::synthesis(index, e))?;
            responses.push((index, result));
        }

        // Порядок задает числовой индекс, а не имя файла
        responses.sort_by_key(|(index, _)| *index);
        Ok(responses)
    }

    /// Собрать временную шкалу из сохраненных ответов
    pub fn load_timeline(&self, policy: &TimingPolicy) -> Result<Timeline> {
        let responses = self.load_responses(policy)?;
        if responses.is_empty() {
            return Err(PipelineError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("No TTS responses found in {}", self.dir.display()),
            )));
        }

        log::info!(
            "Rebuilding timeline from {} stored responses in {}",
            responses.len(),
            self.dir.display()
        );

        let mut timeline = Timeline::new();
        for (index, result) in &responses {
            match timeline.append(result, policy) {
                Some(offset) => log::debug!("Response {}: offset {:.0} ms", index, offset),
                None => log::warn!("Response {} has no words, skipping", index),
            }
        }
        timeline.check_monotonic()?;
        Ok(timeline)
    }

    /// Удалить директорию задания
    pub async fn remove(self) -> Result<()> {
        tokio::fs::remove_dir_all(&self.dir).await?;
        Ok(())
    }
}
