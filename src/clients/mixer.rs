use anyhow::{Context, Result, bail};

/// A pure function from a list of segment files to one mixed file. DSP
/// internals (background-music ducking, fades) are an external
/// collaborator; this adapter performs the structural part the core
/// actually needs tested: ordered concatenation with inter-unit silence.
pub trait AudioMixer: Send + Sync {
    /// # Errors
    /// Returns an error if any input is not a well-formed PCM WAV file.
    fn stitch(&self, units: &[Vec<u8>], silence_ms: u32) -> Result<Vec<u8>>;
}

pub struct WavAudioMixer {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
}

impl Default for WavAudioMixer {
    fn default() -> Self {
        Self { sample_rate: 24_000, channels: 1, bits_per_sample: 16 }
    }
}

struct WavData {
    sample_rate: u32,
    channels: u16,
    bits_per_sample: u16,
    samples: Vec<u8>,
}

fn parse_wav(bytes: &[u8]) -> Result<WavData> {
    if bytes.len() < 44 || &bytes[0..4] != b"RIFF" || &bytes[8..12] != b"WAVE" {
        bail!("not a well-formed RIFF/WAVE file");
    }
    let channels = u16::from_le_bytes([bytes[22], bytes[23]]);
    let sample_rate = u32::from_le_bytes([bytes[24], bytes[25], bytes[26], bytes[27]]);
    let bits_per_sample = u16::from_le_bytes([bytes[34], bytes[35]]);

    let mut offset = 36;
    loop {
        if offset + 8 > bytes.len() {
            bail!("WAV file has no data chunk");
        }
        let chunk_id = &bytes[offset..offset + 4];
        let chunk_size =
            u32::from_le_bytes([bytes[offset + 4], bytes[offset + 5], bytes[offset + 6], bytes[offset + 7]]) as usize;
        let body_start = offset + 8;
        if chunk_id == b"data" {
            let body_end = (body_start + chunk_size).min(bytes.len());
            return Ok(WavData {
                sample_rate,
                channels,
                bits_per_sample,
                samples: bytes[body_start..body_end].to_vec(),
            });
        }
        offset = body_start + chunk_size;
    }
}

fn write_wav_header(sample_rate: u32, channels: u16, bits_per_sample: u16, data_len: u32) -> Vec<u8> {
    let byte_rate = sample_rate * u32::from(channels) * u32::from(bits_per_sample) / 8;
    let block_align = channels * bits_per_sample / 8;
    let mut header = Vec::with_capacity(44);
    header.extend_from_slice(b"RIFF");
    header.extend_from_slice(&(36 + data_len).to_le_bytes());
    header.extend_from_slice(b"WAVE");
    header.extend_from_slice(b"fmt ");
    header.extend_from_slice(&16u32.to_le_bytes());
    header.extend_from_slice(&1u16.to_le_bytes()); // PCM
    header.extend_from_slice(&channels.to_le_bytes());
    header.extend_from_slice(&sample_rate.to_le_bytes());
    header.extend_from_slice(&byte_rate.to_le_bytes());
    header.extend_from_slice(&block_align.to_le_bytes());
    header.extend_from_slice(&bits_per_sample.to_le_bytes());
    header.extend_from_slice(b"data");
    header.extend_from_slice(&data_len.to_le_bytes());
    header
}

impl AudioMixer for WavAudioMixer {
    fn stitch(&self, units: &[Vec<u8>], silence_ms: u32) -> Result<Vec<u8>> {
        if units.is_empty() {
            bail!("cannot stitch zero audio units");
        }

        let bytes_per_sample_frame = usize::from(self.channels) * usize::from(self.bits_per_sample) / 8;
        let silence_frames = (self.sample_rate as u64 * u64::from(silence_ms) / 1000) as usize;
        let silence = vec![0u8; silence_frames * bytes_per_sample_frame];

        let mut pcm = Vec::new();
        for (index, unit) in units.iter().enumerate() {
            let parsed = parse_wav(unit).with_context(|| format!("unit {index} is not a valid WAV file"))?;
            if parsed.sample_rate != self.sample_rate || parsed.channels != self.channels || parsed.bits_per_sample != self.bits_per_sample {
                bail!(
                    "unit {index} format mismatch: expected {}Hz/{}ch/{}bit, got {}Hz/{}ch/{}bit",
                    self.sample_rate,
                    self.channels,
                    self.bits_per_sample,
                    parsed.sample_rate,
                    parsed.channels,
                    parsed.bits_per_sample
                );
            }
            pcm.extend_from_slice(&parsed.samples);
            if index + 1 < units.len() {
                pcm.extend_from_slice(&silence);
            }
        }

        let mut out = write_wav_header(self.sample_rate, self.channels, self.bits_per_sample, pcm.len() as u32);
        out.extend_from_slice(&pcm);
        Ok(out)
    }
}

/// Builds a single-unit WAV file from raw 16-bit PCM, wrapping one TTS unit.
#[must_use]
pub fn wrap_pcm_as_wav(pcm: &[u8], sample_rate: u32, channels: u16, bits_per_sample: u16) -> Vec<u8> {
    let mut out = write_wav_header(sample_rate, channels, bits_per_sample, pcm.len() as u32);
    out.extend_from_slice(pcm);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn silent_wav(frames: usize) -> Vec<u8> {
        wrap_pcm_as_wav(&vec![0u8; frames * 2], 24_000, 1, 16)
    }

    #[test]
    fn stitch_concatenates_units_with_silence() {
        let mixer = WavAudioMixer::default();
        let units = vec![silent_wav(100), silent_wav(50)];
        let stitched = mixer.stitch(&units, 100).unwrap();
        let parsed = parse_wav(&stitched).unwrap();
        let silence_frames = 24_000 * 100 / 1000;
        assert_eq!(parsed.samples.len(), (100 + 50 + silence_frames) * 2);
    }

    #[test]
    fn stitch_rejects_empty_input() {
        let mixer = WavAudioMixer::default();
        assert!(mixer.stitch(&[], 0).is_err());
    }

    #[test]
    fn stitch_rejects_format_mismatch() {
        let mixer = WavAudioMixer::default();
        let mismatched = wrap_pcm_as_wav(&[0u8; 10], 16_000, 1, 16);
        assert!(mixer.stitch(&[silent_wav(10), mismatched], 0).is_err());
    }
}
