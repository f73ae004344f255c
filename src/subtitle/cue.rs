//! Построение субтитров по временной шкале слов
//!
//! Каждое слово становится отдельным субтитром. Субтитр не доживает до
//! появления следующего слова (с зазором `cue_gap_ms`), но и не бывает
//! короче `min_cue_ms`, даже если слова идут почти вплотную. Точность
//! длительности здесь уступает читаемости и отсутствию наложений.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::TimingPolicy;
use crate::tts::Timeline;

lazy_static! {
    static ref LINE_BREAK: Regex = Regex::new(r"\r?\n").unwrap();
}

/// Один субтитр
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtitleCue {
    /// Время начала (мс)
    pub start_ms: f64,
    /// Время окончания (мс)
    pub end_ms: f64,
    /// Текст субтитра
    pub text: String,
}

impl SubtitleCue {
    pub fn new(start_ms: f64, end_ms: f64, text: impl Into<String>) -> Self {
        Self {
            start_ms,
            end_ms,
            text: text.into(),
        }
    }

    pub fn duration_ms(&self) -> f64 {
        self.end_ms - self.start_ms
    }
}

/// Текст слова для показа: переводы строк заменяются пробелами
pub fn display_text(word: &str) -> String {
    LINE_BREAK.replace_all(word, " ").trim().to_string()
}

/// Построить субтитры по словам временной шкалы
pub fn build_cues(timeline: &Timeline, policy: &TimingPolicy) -> Vec<SubtitleCue> {
    let count = timeline.len();
    let mut cues = Vec::with_capacity(count);

    for i in 0..count {
        let start = timeline.times_ms[i];
        let duration = policy.word_duration(Some(timeline.durations_ms[i]));

        let end = if i + 1 < count {
            let gap_to_next = timeline.times_ms[i + 1] - start - policy.cue_gap_ms;
            start + duration.min(gap_to_next.max(policy.min_cue_ms))
        } else {
            start + duration
        };

        cues.push(SubtitleCue::new(start, end, display_text(&timeline.words[i])));
    }

    cues
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tts::{stitch, SynthesisResult};
    use quickcheck::{Arbitrary, Gen};

    fn timeline(words: &[&str], times: &[f64], durations: &[f64]) -> Timeline {
        Timeline {
            words: words.iter().map(|w| w.to_string()).collect(),
            times_ms: times.to_vec(),
            durations_ms: durations.to_vec(),
        }
    }

    #[test]
    fn test_two_chunk_scenario() {
        let policy = TimingPolicy::default();
        let a = SynthesisResult::new(
            vec!["Hello".into(), "world".into()],
            vec![0.0, 300.0],
            vec![250.0, 250.0],
            Vec::new(),
        )
        .unwrap();
        let b = SynthesisResult::new(vec!["Goodbye".into()], vec![0.0], vec![400.0], Vec::new())
            .unwrap();
        let stitched = stitch(stitch(Timeline::new(), &a, &policy), &b, &policy);

        let cues = build_cues(&stitched, &policy);
        assert_eq!(cues.len(), 3);
        assert_eq!(cues[0], SubtitleCue::new(0.0, 250.0, "Hello"));
        assert_eq!(cues[1], SubtitleCue::new(300.0, 550.0, "world"));
        assert_eq!(cues[2], SubtitleCue::new(650.0, 1050.0, "Goodbye"));
    }

    #[test]
    fn test_cue_is_clipped_before_next_word() {
        let policy = TimingPolicy::default();
        let cues = build_cues(&timeline(&["a", "b"], &[0.0, 300.0], &[500.0, 200.0]), &policy);
        assert_eq!(cues[0].end_ms, 280.0);
        assert_eq!(cues[1].end_ms, 500.0);
    }

    #[test]
    fn test_min_cue_floor_wins_over_gap() {
        let policy = TimingPolicy::default();
        let cues = build_cues(&timeline(&["a", "b"], &[0.0, 50.0], &[400.0, 200.0]), &policy);
        assert_eq!(cues[0].end_ms, 100.0);
    }

    #[test]
    fn test_short_duration_is_kept() {
        let policy = TimingPolicy::default();
        let cues = build_cues(&timeline(&["a", "b"], &[0.0, 1000.0], &[80.0, 200.0]), &policy);
        assert_eq!(cues[0].end_ms, 80.0);
    }

    #[test]
    fn test_zero_duration_uses_floor() {
        let policy = TimingPolicy::default();
        let cues = build_cues(&timeline(&["a"], &[10.0], &[0.0]), &policy);
        assert_eq!(cues[0].end_ms, 260.0);
    }

    #[test]
    fn test_text_is_collapsed() {
        assert_eq!(display_text(" two\r\nlines\n"), "two lines");
        let policy = TimingPolicy::default();
        let cues = build_cues(&timeline(&["line\nbreak "], &[0.0], &[100.0]), &policy);
        assert_eq!(cues[0].text, "line break");
    }

    #[test]
    fn test_empty_timeline() {
        assert!(build_cues(&Timeline::new(), &TimingPolicy::default()).is_empty());
    }

    #[derive(Debug, Clone)]
    struct ArbitraryTimeline(Timeline);

    impl Arbitrary for ArbitraryTimeline {
        fn arbitrary(g: &mut Gen) -> Self {
            let count = usize::arbitrary(g) % 20;
            let mut t = 0.0;
            let mut timeline = Timeline::new();
            for i in 0..count {
                timeline.words.push(format!("w{}", i));
                timeline.times_ms.push(t);
                timeline.durations_ms.push((u16::arbitrary(g) % 800) as f64);
                t += (u16::arbitrary(g) % 600) as f64;
            }
            ArbitraryTimeline(timeline)
        }
    }

    #[quickcheck_macros::quickcheck]
    fn prop_overlap_only_from_min_cue_floor(input: ArbitraryTimeline) -> bool {
        let policy = TimingPolicy::default();
        let timeline = input.0;
        let cues = build_cues(&timeline, &policy);

        cues.len() == timeline.len()
            && cues.windows(2).zip(&timeline.times_ms[1..]).all(|(pair, &next)| {
                let cue = &pair[0];
                let limit = next - policy.cue_gap_ms;
                let floor_active = limit - cue.start_ms < policy.min_cue_ms;
                cue.end_ms <= limit + 1e-9
                    || (floor_active && cue.duration_ms() <= policy.min_cue_ms + 1e-9)
            })
            && cues.windows(2).all(|pair| pair[0].start_ms <= pair[1].start_ms)
    }
}
