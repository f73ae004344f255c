//! Склейка WAV буферов
//!
//! Сервер синтеза отдает каждый чанк отдельным WAV файлом с каноническим
//! 44-байтовым заголовком. Формат каждого буфера читается через `hound`,
//! затем к заголовку первого буфера дописываются PCM данные всех чанков
//! по порядку и исправляются поля размеров.

use std::fmt;
use std::io::Cursor;

use hound::{SampleFormat, WavReader, WavSpec};

use crate::error::MergeError;

/// Размер канонического заголовка RIFF/WAVE
pub const WAV_HEADER_LEN: usize = 44;

const RIFF_SIZE_OFFSET: usize = 4;
const DATA_TAG_OFFSET: usize = 36;
const DATA_SIZE_OFFSET: usize = 40;

/// Параметры формата WAV
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavFormat {
    /// Количество каналов
    pub channels: u16,
    /// Частота дискретизации (Гц)
    pub sample_rate: u32,
    /// Бит на семпл
    pub bits_per_sample: u16,
    /// Целые или плавающие семплы
    pub sample_format: SampleFormat,
}

impl From<WavSpec> for WavFormat {
    fn from(spec: WavSpec) -> Self {
        Self {
            channels: spec.channels,
            sample_rate: spec.sample_rate,
            bits_per_sample: spec.bits_per_sample,
            sample_format: spec.sample_format,
        }
    }
}

impl fmt::Display for WavFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} Hz, {} ch, {} bit {:?}",
            self.sample_rate, self.channels, self.bits_per_sample, self.sample_format
        )
    }
}

impl WavFormat {
    /// Прочитать формат буфера `chunk`.
    ///
    /// Буфер должен читаться `hound` и иметь блок `data` сразу за
    /// 44-байтовым заголовком.
    pub fn parse(bytes: &[u8], chunk: usize) -> Result<Self, MergeError> {
        if bytes.len() < WAV_HEADER_LEN {
            return Err(MergeError::TooShort {
                chunk,
                len: bytes.len(),
            });
        }
        let reader = WavReader::new(Cursor::new(bytes))
            .map_err(|source| MergeError::InvalidWav { chunk, source })?;
        if &bytes[DATA_TAG_OFFSET..DATA_TAG_OFFSET + 4] != b"data" {
            return Err(MergeError::NotCanonical { chunk });
        }
        Ok(reader.spec().into())
    }
}

fn write_u32(bytes: &mut [u8], offset: usize, value: u32) {
    bytes[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

/// Значения полей размеров RIFF и `data` для данных длиной `payload_len`
pub fn header_sizes(payload_len: usize) -> Result<(u32, u32), MergeError> {
    let data_size =
        u32::try_from(payload_len).map_err(|_| MergeError::TooLarge { len: payload_len })?;
    let riff_size = data_size
        .checked_add((WAV_HEADER_LEN - 8) as u32)
        .ok_or(MergeError::TooLarge { len: payload_len })?;
    Ok((riff_size, data_size))
}

/// Склеенный WAV файл
#[derive(Debug, Clone, PartialEq)]
pub struct MergedAudio {
    bytes: Vec<u8>,
    format: WavFormat,
    duration_ms: f64,
}

impl MergedAudio {
    fn from_bytes(bytes: Vec<u8>) -> Result<Self, MergeError> {
        let reader = WavReader::new(Cursor::new(bytes.as_slice()))?;
        let format = WavFormat::from(reader.spec());
        let duration_ms = if format.sample_rate == 0 {
            0.0
        } else {
            reader.duration() as f64 * 1000.0 / format.sample_rate as f64
        };
        drop(reader);
        Ok(Self {
            bytes,
            format,
            duration_ms,
        })
    }

    /// Формат аудио
    pub fn format(&self) -> WavFormat {
        self.format
    }

    /// Заголовок файла
    pub fn header(&self) -> &[u8] {
        &self.bytes[..WAV_HEADER_LEN]
    }

    /// PCM данные без заголовка
    pub fn payload(&self) -> &[u8] {
        &self.bytes[WAV_HEADER_LEN..]
    }

    /// Файл целиком
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Длительность аудио (мс)
    pub fn duration_ms(&self) -> f64 {
        self.duration_ms
    }
}

/// Склеить WAV буферы чанков в один файл.
///
/// Один буфер возвращается без изменений. Все буферы должны иметь
/// канонический заголовок и одинаковый формат.
pub fn merge_wav_buffers<B: AsRef<[u8]>>(buffers: &[B]) -> Result<MergedAudio, MergeError> {
    let first = buffers.first().ok_or(MergeError::Empty)?.as_ref();
    let format = WavFormat::parse(first, 0)?;

    for (chunk, buffer) in buffers.iter().enumerate().skip(1) {
        let found = WavFormat::parse(buffer.as_ref(), chunk)?;
        if found != format {
            return Err(MergeError::FormatMismatch {
                chunk,
                expected: format.to_string(),
                found: found.to_string(),
            });
        }
    }

    if buffers.len() == 1 {
        return MergedAudio::from_bytes(first.to_vec());
    }

    let total_payload: usize = buffers
        .iter()
        .map(|b| b.as_ref().len() - WAV_HEADER_LEN)
        .sum();
    let (riff_size, data_size) = header_sizes(total_payload)?;

    let mut bytes = Vec::with_capacity(WAV_HEADER_LEN + total_payload);
    bytes.extend_from_slice(&first[..WAV_HEADER_LEN]);
    for buffer in buffers {
        bytes.extend_from_slice(&buffer.as_ref()[WAV_HEADER_LEN..]);
    }
    write_u32(&mut bytes, RIFF_SIZE_OFFSET, riff_size);
    write_u32(&mut bytes, DATA_SIZE_OFFSET, data_size);

    log::debug!(
        "Merged {} WAV buffers into {} bytes of PCM ({})",
        buffers.len(),
        total_payload,
        format
    );

    MergedAudio::from_bytes(bytes)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use quickcheck::TestResult;
    use std::io::Cursor;

    /// Канонический WAV: 16 бит PCM
    pub(crate) fn wav_fixture(payload: &[u8], sample_rate: u32, channels: u16) -> Vec<u8> {
        let block_align = channels * 2;
        let byte_rate = sample_rate * block_align as u32;
        let mut bytes = Vec::with_capacity(WAV_HEADER_LEN + payload.len());
        bytes.extend_from_slice(b"RIFF");
        bytes.extend_from_slice(&(36 + payload.len() as u32).to_le_bytes());
        bytes.extend_from_slice(b"WAVE");
        bytes.extend_from_slice(b"fmt ");
        bytes.extend_from_slice(&16u32.to_le_bytes());
        bytes.extend_from_slice(&1u16.to_le_bytes());
        bytes.extend_from_slice(&channels.to_le_bytes());
        bytes.extend_from_slice(&sample_rate.to_le_bytes());
        bytes.extend_from_slice(&byte_rate.to_le_bytes());
        bytes.extend_from_slice(&block_align.to_le_bytes());
        bytes.extend_from_slice(&16u16.to_le_bytes());
        bytes.extend_from_slice(b"data");
        bytes.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        bytes.extend_from_slice(payload);
        bytes
    }

    fn samples(values: &[i16]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    fn read_u32(bytes: &[u8], offset: usize) -> u32 {
        u32::from_le_bytes([
            bytes[offset],
            bytes[offset + 1],
            bytes[offset + 2],
            bytes[offset + 3],
        ])
    }

    #[test]
    fn test_single_buffer_passthrough() {
        let wav = wav_fixture(&samples(&[1, 2, 3]), 24000, 1);
        let merged = merge_wav_buffers(&[wav.clone()]).unwrap();
        assert_eq!(merged.as_bytes(), wav.as_slice());
    }

    #[test]
    fn test_merge_concatenates_payloads_and_patches_header() {
        let a = wav_fixture(&samples(&[1, 2, 3]), 24000, 1);
        let b = wav_fixture(&samples(&[4, 5]), 24000, 1);
        let merged = merge_wav_buffers(&[a, b]).unwrap();

        assert_eq!(merged.payload(), samples(&[1, 2, 3, 4, 5]).as_slice());
        assert_eq!(read_u32(merged.header(), 4), 36 + 10);
        assert_eq!(read_u32(merged.header(), 40), 10);

        let reader = hound::WavReader::new(Cursor::new(merged.as_bytes().to_vec())).unwrap();
        assert_eq!(reader.spec().sample_rate, 24000);
        assert_eq!(reader.spec().channels, 1);
        let decoded: Vec<i16> = reader.into_samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(decoded, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_format_is_read_from_header() {
        let wav = wav_fixture(&samples(&[1, 2]), 22050, 2);
        let format = WavFormat::parse(&wav, 0).unwrap();
        assert_eq!(format.sample_rate, 22050);
        assert_eq!(format.channels, 2);
        assert_eq!(format.bits_per_sample, 16);
        assert_eq!(format.sample_format, SampleFormat::Int);
    }

    #[test]
    fn test_short_buffer_fails() {
        let a = wav_fixture(&samples(&[1]), 24000, 1);
        let err = merge_wav_buffers(&[a, vec![0u8; 20]]).unwrap_err();
        assert!(matches!(err, MergeError::TooShort { chunk: 1, len: 20 }));
    }

    #[test]
    fn test_empty_input_fails() {
        let buffers: Vec<Vec<u8>> = Vec::new();
        assert!(matches!(
            merge_wav_buffers(&buffers).unwrap_err(),
            MergeError::Empty
        ));
    }

    #[test]
    fn test_non_riff_buffer_fails() {
        let mut a = wav_fixture(&samples(&[1]), 24000, 1);
        a[0..4].copy_from_slice(b"RIFX");
        assert!(matches!(
            merge_wav_buffers(&[a]).unwrap_err(),
            MergeError::InvalidWav { chunk: 0, .. }
        ));
    }

    #[test]
    fn test_unsupported_fmt_chunk_fails() {
        // audio_format = 7 (mu-law)
        let a = wav_fixture(&samples(&[1]), 24000, 1);
        let mut b = wav_fixture(&samples(&[1]), 24000, 1);
        b[20..22].copy_from_slice(&7u16.to_le_bytes());
        assert!(matches!(
            merge_wav_buffers(&[a, b]).unwrap_err(),
            MergeError::InvalidWav { chunk: 1, .. }
        ));
    }

    #[test]
    fn test_extra_chunk_before_data_fails() {
        // Валидный для hound файл, но `data` не на смещении 36
        let payload = samples(&[1, 2]);
        let mut wav = Vec::new();
        wav.extend_from_slice(b"RIFF");
        wav.extend_from_slice(&(36 + 12 + payload.len() as u32).to_le_bytes());
        wav.extend_from_slice(&wav_fixture(&[], 24000, 1)[8..36]);
        wav.extend_from_slice(b"LIST");
        wav.extend_from_slice(&4u32.to_le_bytes());
        wav.extend_from_slice(b"INFO");
        wav.extend_from_slice(b"data");
        wav.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        wav.extend_from_slice(&payload);

        assert!(hound::WavReader::new(Cursor::new(wav.clone())).is_ok());
        assert!(matches!(
            WavFormat::parse(&wav, 3).unwrap_err(),
            MergeError::NotCanonical { chunk: 3 }
        ));
    }

    #[test]
    fn test_format_mismatch_fails() {
        let a = wav_fixture(&samples(&[1]), 24000, 1);
        let b = wav_fixture(&samples(&[1]), 44100, 1);
        match merge_wav_buffers(&[a, b]).unwrap_err() {
            MergeError::FormatMismatch { chunk, .. } => assert_eq!(chunk, 1),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_header_sizes_limit() {
        let max = (u32::MAX - 36) as usize;
        assert_eq!(header_sizes(max).unwrap(), (u32::MAX, u32::MAX - 36));
        assert!(matches!(
            header_sizes(max + 1).unwrap_err(),
            MergeError::TooLarge { len } if len == max + 1
        ));
        assert_eq!(header_sizes(0).unwrap(), (36, 0));
    }

    #[test]
    fn test_duration() {
        // 24000 Гц, моно, 16 бит: 48000 байт в секунду
        let merged = merge_wav_buffers(&[wav_fixture(&vec![0u8; 24000], 24000, 1)]).unwrap();
        assert_eq!(merged.duration_ms(), 500.0);
    }

    #[test]
    fn test_stereo_duration_counts_frames() {
        let a = wav_fixture(&vec![0u8; 4000], 1000, 2);
        let b = wav_fixture(&vec![0u8; 4000], 1000, 2);
        let merged = merge_wav_buffers(&[a, b]).unwrap();
        assert_eq!(merged.duration_ms(), 2000.0);
    }

    #[quickcheck_macros::quickcheck]
    fn prop_payload_length_is_additive(chunks: Vec<Vec<i16>>) -> TestResult {
        if chunks.is_empty() {
            return TestResult::discard();
        }
        let payloads: Vec<Vec<u8>> = chunks.iter().map(|c| samples(c)).collect();
        let buffers: Vec<Vec<u8>> = payloads.iter().map(|p| wav_fixture(p, 16000, 1)).collect();
        let merged = merge_wav_buffers(&buffers).unwrap();
        let total: usize = payloads.iter().map(|p| p.len()).sum();
        TestResult::from_bool(
            merged.payload().len() == total
                && read_u32(merged.header(), 4) as usize == 36 + total
                && read_u32(merged.header(), 40) as usize == total
                && merged.payload() == payloads.concat().as_slice(),
        )
    }
}
