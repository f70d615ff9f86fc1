use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentContentType {
    Intro,
    Topic,
    Outro,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioSegment {
    pub sequence_index: u32,
    pub topic_id: Option<String>,
    pub title: String,
    pub content_type: SegmentContentType,
    pub file_path: String,
    pub duration_seconds: f64,
    pub transcript: String,
    /// Cumulative offset into the stitched episode, including inter-section silence.
    pub start_time_seconds: f64,
}

/// The rendered episode: one `AudioSegment` per script section plus an
/// optional stitched file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioEpisode {
    pub episode_id: String,
    pub segments: Vec<AudioSegment>,
    pub stitched_file_path: Option<String>,
    pub total_duration_seconds: f64,
}
