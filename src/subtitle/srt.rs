//! Рендер субтитров в формат SRT

use std::fmt::Write;

use crate::subtitle::SubtitleCue;

/// Время в формате SRT `HH:MM:SS,mmm`
pub fn format_timestamp(ms: f64) -> String {
    let total_ms = ms.max(0.0).round() as u64;
    let millis = total_ms % 1000;
    let total_sec = total_ms / 1000;
    format!(
        "{:02}:{:02}:{:02},{:03}",
        total_sec / 3600,
        (total_sec / 60) % 60,
        total_sec % 60,
        millis
    )
}

/// Сформировать SRT файл
pub fn render_srt(cues: &[SubtitleCue]) -> String {
    let mut out = String::new();
    for (i, cue) in cues.iter().enumerate() {
        let _ = writeln!(out, "{}", i + 1);
        let _ = writeln!(
            out,
            "{} --> {}",
            format_timestamp(cue.start_ms),
            format_timestamp(cue.end_ms)
        );
        let _ = writeln!(out, "{}", cue.text);
        let _ = writeln!(out);
    }
    out
}
