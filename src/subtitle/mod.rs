//! Модуль для работы с субтитрами
//!
//! Построение пословных субтитров по временной шкале и их рендер
//! в форматы ASS и SRT.

pub mod ass;
pub mod cue;
pub mod srt;

pub use ass::render_ass;
pub use cue::{build_cues, SubtitleCue};
pub use srt::render_srt;
