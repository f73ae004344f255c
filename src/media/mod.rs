//! Модуль для работы с аудио

pub mod wav;

pub use wav::{merge_wav_buffers, MergedAudio, WavFormat};
