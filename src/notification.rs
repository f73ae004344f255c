//! Наблюдатели прогресса
//!
//! Готовые реализации `ProgressObserver`: вывод в лог, история в памяти,
//! обратный вызов, канал Tokio и комбинация нескольких наблюдателей.

use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use crate::progress::{ProgressInfo, ProgressObserver};

fn format_details(details: Option<&str>) -> String {
    match details {
        Some(details) if !details.is_empty() => format!(", {}", details),
        _ => String::new(),
    }
}

/// Наблюдатель, выводящий прогресс в консоль
pub struct ConsoleProgressObserver {
    prefix: Option<String>,
}

impl ConsoleProgressObserver {
    pub fn new() -> Self {
        Self { prefix: None }
    }

    /// Наблюдатель с префиксом перед каждой строкой
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
        }
    }

    fn format_line(&self, progress: &ProgressInfo) -> String {
        format!(
            "{}[{:>5.1}%] {}: {:.0}%{}",
            self.prefix.as_deref().unwrap_or(""),
            progress.total_progress,
            progress.step,
            progress.step_progress,
            format_details(progress.details.as_deref())
        )
    }
}

impl Default for ConsoleProgressObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressObserver for ConsoleProgressObserver {
    fn on_progress_update(&self, progress: ProgressInfo) {
        println!("{}", self.format_line(&progress));
    }
}

/// Наблюдатель, пишущий прогресс в лог на уровне info
#[derive(Debug, Default)]
pub struct LogProgressObserver;

impl ProgressObserver for LogProgressObserver {
    fn on_progress_update(&self, progress: ProgressInfo) {
        log::info!(
            "Progress {:.1}%: {} ({:.0}%){}",
            progress.total_progress,
            progress.step,
            progress.step_progress,
            format_details(progress.details.as_deref())
        );
    }
}

/// Наблюдатель, сохраняющий историю обновлений в памяти.
///
/// Клоны разделяют одну историю.
#[derive(Clone, Default)]
pub struct MemoryProgressObserver {
    history: Arc<Mutex<Vec<ProgressInfo>>>,
}

impl MemoryProgressObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// История обновлений
    pub fn history(&self) -> Vec<ProgressInfo> {
        match self.history.lock() {
            Ok(history) => history.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Последнее обновление
    pub fn last(&self) -> Option<ProgressInfo> {
        self.history().pop()
    }

    pub fn clear_history(&self) {
        if let Ok(mut history) = self.history.lock() {
            history.clear();
        }
    }
}

impl ProgressObserver for MemoryProgressObserver {
    fn on_progress_update(&self, progress: ProgressInfo) {
        if let Ok(mut history) = self.history.lock() {
            history.push(progress);
        }
    }
}

/// Наблюдатель, отправляющий прогресс в канал Tokio.
///
/// Если получатель не успевает, обновление отбрасывается.
pub struct ChannelProgressObserver {
    sender: mpsc::Sender<ProgressInfo>,
}

impl ChannelProgressObserver {
    pub fn new(sender: mpsc::Sender<ProgressInfo>) -> Self {
        Self { sender }
    }
}

impl ProgressObserver for ChannelProgressObserver {
    fn on_progress_update(&self, progress: ProgressInfo) {
        if let Err(e) = self.sender.try_send(progress) {
            log::debug!("Dropping progress update: {}", e);
        }
    }
}

/// Наблюдатель, вызывающий функцию при каждом обновлении
pub struct CallbackProgressObserver<F>
where
    F: Fn(ProgressInfo) + Send + Sync + 'static,
{
    callback: F,
}

impl<F> CallbackProgressObserver<F>
where
    F: Fn(ProgressInfo) + Send + Sync + 'static,
{
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> ProgressObserver for CallbackProgressObserver<F>
where
    F: Fn(ProgressInfo) + Send + Sync + 'static,
{
    fn on_progress_update(&self, progress: ProgressInfo) {
        (self.callback)(progress);
    }
}

/// Наблюдатель, объединяющий несколько наблюдателей
#[derive(Default)]
pub struct CompositeProgressObserver {
    observers: Vec<Box<dyn ProgressObserver>>,
}

impl CompositeProgressObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_observer(&mut self, observer: Box<dyn ProgressObserver>) {
        self.observers.push(observer);
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }
}

impl ProgressObserver for CompositeProgressObserver {
    fn on_progress_update(&self, progress: ProgressInfo) {
        for observer in &self.observers {
            observer.on_progress_update(progress.clone());
        }
    }
}
