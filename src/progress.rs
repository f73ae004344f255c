//! Модуль для отслеживания прогресса выполнения задания
//!
//! Реализация паттерна Observer: конвейер сообщает о смене этапов и о
//! синтезе каждого чанка, наблюдатели получают `ProgressInfo`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use serde::{Deserialize, Serialize};

/// Информация о прогрессе выполнения операции
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressInfo {
    /// Текущий этап операции
    pub step: String,
    /// Процент выполнения текущего этапа (0.0 - 100.0)
    pub step_progress: f32,
    /// Общий процент выполнения задания (0.0 - 100.0)
    pub total_progress: f32,
    /// Дополнительная информация о текущем этапе
    pub details: Option<String>,
    /// Задание, к которому относится уведомление
    #[serde(default)]
    pub job_id: Option<String>,
}

impl ProgressInfo {
    pub fn new(
        step: impl Into<String>,
        step_progress: f32,
        total_progress: f32,
        details: Option<String>,
    ) -> Self {
        Self {
            step: step.into(),
            step_progress: step_progress.clamp(0.0, 100.0),
            total_progress: total_progress.clamp(0.0, 100.0),
            details,
            job_id: None,
        }
    }

    pub fn with_job_id(mut self, job_id: impl Into<String>) -> Self {
        self.job_id = Some(job_id.into());
        self
    }
}

/// Наблюдатель, получающий уведомления о прогрессе
pub trait ProgressObserver: Send + Sync {
    fn on_progress_update(&self, progress: ProgressInfo);
}

/// Объект, рассылающий уведомления о прогрессе
pub trait ProgressReporter: Send + Sync {
    /// Добавить наблюдателя
    ///
    /// Возвращает идентификатор, по которому наблюдателя можно удалить.
    fn add_observer(&mut self, observer: Box<dyn ProgressObserver>) -> usize;

    /// Удалить наблюдателя по идентификатору
    fn remove_observer(&mut self, id: usize) -> Option<Box<dyn ProgressObserver>>;

    /// Уведомить всех наблюдателей
    fn notify_progress(&self, progress: ProgressInfo);
}

/// Репортер, вызывающий наблюдателей синхронно в порядке добавления
pub struct DefaultProgressReporter {
    observers: RwLock<Vec<(usize, Box<dyn ProgressObserver>)>>,
    next_id: AtomicUsize,
}

impl DefaultProgressReporter {
    pub fn new() -> Self {
        Self {
            observers: RwLock::new(Vec::new()),
            next_id: AtomicUsize::new(0),
        }
    }

    /// Количество подключенных наблюдателей
    pub fn observer_count(&self) -> usize {
        match self.observers.read() {
            Ok(observers) => observers.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }
}

impl Default for DefaultProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter for DefaultProgressReporter {
    fn add_observer(&mut self, observer: Box<dyn ProgressObserver>) -> usize {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let observers = self
            .observers
            .get_mut()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        observers.push((id, observer));
        id
    }

    fn remove_observer(&mut self, id: usize) -> Option<Box<dyn ProgressObserver>> {
        let observers = self
            .observers
            .get_mut()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let position = observers.iter().position(|(observer_id, _)| *observer_id == id)?;
        Some(observers.remove(position).1)
    }

    fn notify_progress(&self, progress: ProgressInfo) {
        let observers = match self.observers.read() {
            Ok(observers) => observers,
            Err(poisoned) => poisoned.into_inner(),
        };
        for (_, observer) in observers.iter() {
            observer.on_progress_update(progress.clone());
        }
    }
}

/// Этапы задания
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcessStep {
    /// Разбиение текста на чанки
    Chunking,
    /// Синтез речи по чанкам
    SpeechSynthesis,
    /// Склейка WAV
    AudioMerge,
    /// Построение субтитров
    SubtitleBuilding,
    /// Сохранение артефактов
    Persisting,
}

impl ProcessStep {
    /// Все этапы в порядке выполнения
    pub const ALL: [ProcessStep; 5] = [
        ProcessStep::Chunking,
        ProcessStep::SpeechSynthesis,
        ProcessStep::AudioMerge,
        ProcessStep::SubtitleBuilding,
        ProcessStep::Persisting,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Chunking => "Разбиение текста",
            Self::SpeechSynthesis => "Синтез речи",
            Self::AudioMerge => "Склейка аудио",
            Self::SubtitleBuilding => "Построение субтитров",
            Self::Persisting => "Сохранение результатов",
        }
    }

    /// Весовой коэффициент этапа (в процентах от всего задания)
    pub fn weight(&self) -> f32 {
        match self {
            Self::Chunking => 5.0,
            Self::SpeechSynthesis => 75.0,
            Self::AudioMerge => 5.0,
            Self::SubtitleBuilding => 5.0,
            Self::Persisting => 10.0,
        }
    }

    fn position(&self) -> usize {
        Self::ALL.iter().position(|s| s == self).unwrap_or(0)
    }
}

#[derive(Debug)]
struct TrackerState {
    step: ProcessStep,
    step_progress: f32,
    total_progress: f32,
    completed_steps: HashMap<ProcessStep, f32>,
}

impl TrackerState {
    fn recalculate(&mut self) {
        let mut total: f32 = self
            .completed_steps
            .iter()
            .filter(|(step, _)| **step != self.step)
            .map(|(step, progress)| step.weight() * progress / 100.0)
            .sum();
        total += self.step.weight() * self.step_progress / 100.0;
        self.total_progress = total.clamp(0.0, 100.0);
    }
}

/// Трекер прогресса одного задания.
///
/// Состояние трекера принадлежит одному заданию, а репортер может быть
/// общим для нескольких трекеров. Наблюдатели вызываются после
/// освобождения блокировки состояния.
pub struct ProgressTracker {
    reporter: Option<Arc<dyn ProgressReporter>>,
    job_id: Option<String>,
    state: Mutex<TrackerState>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self {
            reporter: None,
            job_id: None,
            state: Mutex::new(TrackerState {
                step: ProcessStep::Chunking,
                step_progress: 0.0,
                total_progress: 0.0,
                completed_steps: HashMap::new(),
            }),
        }
    }

    /// Создать трекер с репортером
    pub fn with_reporter(reporter: Arc<dyn ProgressReporter>) -> Self {
        let mut tracker = Self::new();
        tracker.reporter = Some(reporter);
        tracker
    }

    /// Создать трекер задания `job_id`; уведомления помечаются идентификатором
    pub fn for_job(reporter: Arc<dyn ProgressReporter>, job_id: impl Into<String>) -> Self {
        let mut tracker = Self::with_reporter(reporter);
        tracker.job_id = Some(job_id.into());
        tracker
    }

    pub fn set_reporter(&mut self, reporter: Arc<dyn ProgressReporter>) {
        self.reporter = Some(reporter);
    }

    pub fn job_id(&self) -> Option<&str> {
        self.job_id.as_deref()
    }

    /// Добавить наблюдателя.
    ///
    /// Возвращает `None`, если репортера нет или он уже разделен с другими
    /// трекерами.
    pub fn add_observer(&mut self, observer: Box<dyn ProgressObserver>) -> Option<usize> {
        self.reporter
            .as_mut()
            .and_then(Arc::get_mut)
            .map(|reporter| reporter.add_observer(observer))
    }

    fn state(&self) -> MutexGuard<'_, TrackerState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Перейти к этапу; пропущенные этапы считаются завершенными
    pub fn set_step(&self, step: ProcessStep) {
        let info = {
            let mut state = self.state();
            if state.step == step {
                return;
            }
            let target = step.position();
            for passed in ProcessStep::ALL.iter().take(target) {
                state.completed_steps.insert(*passed, 100.0);
            }
            state.step = step;
            state.step_progress = 0.0;
            state.recalculate();
            self.snapshot(&state, None)
        };
        self.report(info);
    }

    /// Обновить прогресс текущего этапа
    pub fn update_step_progress(&self, progress: f32, details: Option<String>) {
        let info = {
            let mut state = self.state();
            state.step_progress = progress.clamp(0.0, 100.0);
            state.recalculate();
            self.snapshot(&state, details)
        };
        self.report(info);
    }

    /// Сообщить о завершении чанка `completed` из `total`
    pub fn chunk_completed(&self, completed: usize, total: usize) {
        let progress = if total == 0 {
            100.0
        } else {
            completed as f32 * 100.0 / total as f32
        };
        self.update_step_progress(progress, Some(format!("Чанк {}/{}", completed, total)));
    }

    /// Текущий общий прогресс
    pub fn total_progress(&self) -> f32 {
        self.state().total_progress
    }

    /// Сообщить об ошибке без изменения прогресса
    pub fn fail(&self, message: &str) {
        let info = self.snapshot(&self.state(), Some(format!("Ошибка: {}", message)));
        self.report(info);
    }

    /// Отметить завершение задания
    pub fn complete(&self) {
        let info = {
            let mut state = self.state();
            for step in ProcessStep::ALL {
                state.completed_steps.insert(step, 100.0);
            }
            state.step_progress = 100.0;
            state.total_progress = 100.0;
            self.snapshot(&state, Some("Задание завершено".to_string()))
        };
        self.report(info);
    }

    fn snapshot(&self, state: &TrackerState, details: Option<String>) -> Option<ProgressInfo> {
        self.reporter.as_ref()?;
        let info = ProgressInfo::new(
            state.step.as_str(),
            state.step_progress,
            state.total_progress,
            details,
        );
        Some(match &self.job_id {
            Some(job_id) => info.with_job_id(job_id.as_str()),
            None => info,
        })
    }

    fn report(&self, info: Option<ProgressInfo>) {
        if let (Some(reporter), Some(info)) = (&self.reporter, info) {
            reporter.notify_progress(info);
        }
    }
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}
