//! Пример озвучки текстового файла
//!
//! Запуск:
//! `cargo run --example synthesize_script -- script.txt [config.json]`
//!
//! Сервер HeadTTS должен быть запущен заранее. Ctrl+C отменяет задание
//! после текущего чанка.

use anyhow::{bail, Context, Result};
use tokio_util::sync::CancellationToken;

use shorts_tts::config::PipelineConfig;
use shorts_tts::notification::{CompositeProgressObserver, ConsoleProgressObserver, LogProgressObserver};
use shorts_tts::tts::HeadTtsClient;
use shorts_tts::TtsPipeline;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut args = std::env::args().skip(1);
    let script_path = match args.next() {
        Some(path) => path,
        None => bail!("Usage: synthesize_script <script.txt> [config.json]"),
    };

    let config = match args.next() {
        Some(path) => PipelineConfig::from_file(&path)
            .with_context(|| format!("Failed to load config {}", path))?,
        None => PipelineConfig {
            work_dir: Some(std::env::temp_dir().join("shorts-tts")),
            ..PipelineConfig::default()
        },
    }
    .with_env_overrides()?;

    let text = tokio::fs::read_to_string(&script_path)
        .await
        .with_context(|| format!("Failed to read script {}", script_path))?;

    let client = HeadTtsClient::new(&config)?;
    client
        .check_health()
        .await
        .context("HeadTTS server is not reachable")?;

    let settings = config.voice.clone();
    let mut pipeline = TtsPipeline::new(config, client);

    let mut observer = CompositeProgressObserver::new();
    observer.add_observer(Box::new(ConsoleProgressObserver::with_prefix("[shorts-tts] ")));
    observer.add_observer(Box::new(LogProgressObserver));
    pipeline.add_observer(Box::new(observer));

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            println!("Отмена после текущего чанка...");
            ctrl_c.cancel();
        }
    });

    let output = pipeline.run_with_cancel(&text, &settings, &cancel).await?;

    println!("Задание {} завершено", output.job_id);
    println!("  Чанков: {}", output.chunk_count);
    println!("  Слов: {}", output.timeline.len());
    println!("  Длительность: {:.1} с", output.audio.duration_ms() / 1000.0);
    if let Some(dir) = &output.workspace {
        println!("  Результаты: {}", dir.display());
    }

    Ok(())
}
