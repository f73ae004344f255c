//! Рендер субтитров в формат ASS
//!
//! Стиль фиксированный: крупный шрифт по центру нижней части кадра
//! вертикального ролика 1080x1920, одно событие `Dialogue` на субтитр.

use std::fmt::Write;

use lazy_static::lazy_static;
use regex::Regex;

use crate::subtitle::SubtitleCue;

lazy_static! {
    static ref OVERRIDE_CHARS: Regex = Regex::new(r"[{}\\]").unwrap();
}

const ASS_HEADER: &str = "[Script Info]
ScriptType: v4.00+
PlayResX: 1080
PlayResY: 1920
ScaledBorderAndShadow: yes
WrapStyle: 2
Collisions: Normal

[V4+ Styles]
Format: Name, Fontname, Fontsize, PrimaryColour, SecondaryColour, OutlineColour, BackColour, Bold, Italic, Underline, StrikeOut, ScaleX, ScaleY, Spacing, Angle, BorderStyle, Outline, Shadow, Alignment, MarginL, MarginR, MarginV, Encoding
Style: ShortsCaption,Anton,250,&H0000FFFF,&H000000FF,&H00000000,&H64000000,-1,0,0,0,100,100,0,0,1,12,1,2,50,50,150,1

[Events]
Format: Layer, Start, End, Style, Name, MarginL, MarginR, MarginV, Effect, Text
";

/// Позиция подписи в кадре
const CAPTION_POSITION: &str = r"{\pos(540,1720)\an2}";

/// Время в формате ASS `HH:MM:SS.cc`
pub fn format_timestamp(ms: f64) -> String {
    let centis = (ms.max(0.0) / 10.0).round() as u64;
    let hours = centis / 360_000;
    let minutes = (centis / 6_000) % 60;
    let seconds = (centis / 100) % 60;
    format!("{:02}:{:02}:{:02}.{:02}", hours, minutes, seconds, centis % 100)
}

/// Сформировать ASS файл
pub fn render_ass(cues: &[SubtitleCue]) -> String {
    let mut out = String::from(ASS_HEADER);
    for cue in cues {
        let text = OVERRIDE_CHARS.replace_all(&cue.text, "");
        // Запись в String не может завершиться ошибкой
        let _ = writeln!(
            out,
            "Dialogue: 0,{},{},ShortsCaption,,0,0,0,,{}{}",
            format_timestamp(cue.start_ms),
            format_timestamp(cue.end_ms),
            CAPTION_POSITION,
            text
        );
    }
    out
}
