use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use tracing::warn;

use crate::clients::mixer::wrap_pcm_as_wav;
use crate::clients::{AudioMixer, TtsClient};
use crate::model::{AudioEpisode, AudioSegment, DialogueLine, PodcastScript, SegmentContentType};

const WORDS_PER_MINUTE: f64 = 150.0;
const INTER_UNIT_SILENCE_MS: u32 = 350;
const INTER_SECTION_SILENCE_MS: u32 = 500;
const TTS_SAMPLE_RATE: u32 = 24_000;
const TTS_CHANNELS: u16 = 1;
const TTS_BITS_PER_SAMPLE: u16 = 16;

/// Renders a script to per-segment audio plus a stitched episode file.
#[async_trait]
pub trait AudioStage: Send + Sync {
    /// `voice_by_speaker` maps a `DialogueLine::speaker` name (as produced by
    /// the scripting stage) to the `Host.voice_id` it should be synthesized
    /// with; a speaker with no entry falls back to its own name as the voice
    /// identifier. `tts_model` overrides the provider's configured voice
    /// model for the whole render when the job requested one.
    ///
    /// # Errors
    /// Returns an error only when every unit in a section fails to
    /// synthesize (nothing survives to stitch); a few missing units within
    /// an otherwise successful section are skipped and logged instead.
    async fn render(
        &self,
        script: &PodcastScript,
        output_dir: &Path,
        tts_parallelism: usize,
        voice_by_speaker: &HashMap<String, String>,
        tts_model: Option<&str>,
    ) -> anyhow::Result<AudioEpisode>;
}

pub struct TtsAudioRenderer {
    tts: Arc<dyn TtsClient>,
    mixer: Arc<dyn AudioMixer>,
}

impl TtsAudioRenderer {
    #[must_use]
    pub fn new(tts: Arc<dyn TtsClient>, mixer: Arc<dyn AudioMixer>) -> Self {
        Self { tts, mixer }
    }
}

fn voice_for(voice_by_speaker: &HashMap<String, String>, speaker: &str) -> String {
    voice_by_speaker.get(speaker).cloned().unwrap_or_else(|| speaker.to_string())
}

struct Unit {
    sequence: u32,
    section: String,
    speaker: String,
    text: String,
    wav: Vec<u8>,
    duration_seconds: f64,
}

#[async_trait]
impl AudioStage for TtsAudioRenderer {
    async fn render(
        &self,
        script: &PodcastScript,
        output_dir: &Path,
        tts_parallelism: usize,
        voice_by_speaker: &HashMap<String, String>,
        tts_model: Option<&str>,
    ) -> anyhow::Result<AudioEpisode> {
        tokio::fs::create_dir_all(output_dir).await?;

        let mut sections: Vec<(String, SegmentContentType, Option<String>, String, &[DialogueLine])> = Vec::new();
        sections.push(("intro".to_string(), SegmentContentType::Intro, None, "Intro".to_string(), &script.intro));
        for segment in &script.segments {
            sections.push((
                section_slug(&segment.topic_title),
                SegmentContentType::Topic,
                Some(segment.topic_id.clone()),
                segment.topic_title.clone(),
                &segment.dialogue,
            ));
        }
        sections.push(("outro".to_string(), SegmentContentType::Outro, None, "Outro".to_string(), &script.outro));

        let mut audio_segments = Vec::new();
        let mut cumulative_start = 0.0_f64;
        let mut stitched_units: Vec<Vec<u8>> = Vec::new();

        for (index, (slug, content_type, topic_id, title, dialogue)) in sections.into_iter().enumerate() {
            let units =
                self.synthesize_section(&slug, dialogue, tts_parallelism, output_dir, voice_by_speaker, tts_model).await;
            if units.is_empty() && !dialogue.is_empty() {
                warn!(section = %slug, "every unit in section failed to synthesize, section dropped");
                continue;
            }

            let section_duration: f64 = units.iter().map(|u| u.duration_seconds).sum();
            let transcript = units.iter().map(|u| u.text.clone()).collect::<Vec<_>>().join(" ");
            let section_wavs: Vec<Vec<u8>> = units.into_iter().map(|u| u.wav).collect();
            let stitched_section = if section_wavs.is_empty() {
                None
            } else {
                self.mixer.stitch(&section_wavs, INTER_UNIT_SILENCE_MS).ok()
            };

            let file_path = output_dir.join(format!("{index:03}_{slug}.wav"));
            if let Some(bytes) = &stitched_section {
                tokio::fs::write(&file_path, bytes).await?;
                stitched_units.push(bytes.clone());
            }

            audio_segments.push(AudioSegment {
                sequence_index: index as u32,
                topic_id,
                title,
                content_type,
                file_path: file_path.to_string_lossy().to_string(),
                duration_seconds: section_duration,
                transcript,
                start_time_seconds: cumulative_start,
            });
            cumulative_start += section_duration + f64::from(INTER_SECTION_SILENCE_MS) / 1000.0;
        }

        let stitched_file_path = if stitched_units.is_empty() {
            None
        } else {
            match self.mixer.stitch(&stitched_units, INTER_SECTION_SILENCE_MS) {
                Ok(bytes) => {
                    let path = output_dir.join("episode.wav");
                    tokio::fs::write(&path, bytes).await?;
                    Some(path.to_string_lossy().to_string())
                }
                Err(error) => {
                    warn!(error = %error, "full-episode stitch failed, per-section files remain available");
                    None
                }
            }
        };

        let total_duration_seconds = audio_segments.iter().map(|s| s.duration_seconds).sum();

        Ok(AudioEpisode { episode_id: script.episode_id.clone(), segments: audio_segments, stitched_file_path, total_duration_seconds })
    }
}

impl TtsAudioRenderer {
    async fn synthesize_section(
        &self,
        section: &str,
        dialogue: &[DialogueLine],
        parallelism: usize,
        output_dir: &Path,
        voice_by_speaker: &HashMap<String, String>,
        tts_model: Option<&str>,
    ) -> Vec<Unit> {
        let jobs: Vec<_> = dialogue
            .iter()
            .enumerate()
            .map(|(index, line)| {
                (index as u32, section.to_string(), line.speaker.clone(), line.text.clone(), voice_for(voice_by_speaker, &line.speaker))
            })
            .collect();

        let results = stream::iter(jobs.into_iter().map(|(sequence, section, speaker, text, voice_id)| {
            let tts = Arc::clone(&self.tts);
            let model = tts_model.map(str::to_string);
            async move {
                match tts.synthesize(&voice_id, &text, model.as_deref()).await {
                    Ok(pcm) => {
                        let wav = wrap_pcm_as_wav(&pcm, TTS_SAMPLE_RATE, TTS_CHANNELS, TTS_BITS_PER_SAMPLE);
                        let duration_seconds = text.split_whitespace().count() as f64 / WORDS_PER_MINUTE * 60.0;
                        Some(Unit { sequence, section, speaker, text, wav, duration_seconds })
                    }
                    Err(error) => {
                        warn!(sequence, speaker = %speaker, error = %error, "TTS unit failed, skipping");
                        None
                    }
                }
            }
        }))
        .buffer_unordered(parallelism.max(1))
        .collect::<Vec<_>>()
        .await;

        let mut units: Vec<Unit> = results.into_iter().flatten().collect();
        units.sort_by_key(|u| u.sequence);
        for unit in &units {
            let path = unit_file_path(output_dir, unit);
            if let Err(error) = tokio::fs::write(&path, &unit.wav).await {
                warn!(path = %path.display(), error = %error, "failed to write TTS unit file");
            }
        }
        units
    }
}

fn unit_file_path(output_dir: &Path, unit: &Unit) -> PathBuf {
    output_dir.join(format!("{:03}_{}_{}.wav", unit.sequence, unit.section, unit.speaker))
}

fn section_slug(title: &str) -> String {
    title
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '-' })
        .collect::<String>()
        .trim_matches('-')
        .to_string()
}
