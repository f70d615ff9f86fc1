//! The domain entities: long-lived configuration (`Profile`), the in-memory
//! pipeline artifacts that flow stage to stage, and the durable
//! `GenerationJob` record the orchestrator owns.

pub mod audio;
pub mod cluster;
pub mod content;
pub mod episode;
pub mod job;
pub mod newsletter;
pub mod profile;
pub mod research;
pub mod script;
pub mod verified;

pub use audio::{AudioEpisode, AudioSegment, SegmentContentType};
pub use cluster::TopicCluster;
pub use content::RawContentItem;
pub use episode::{Episode, EpisodeStatus, TopicHistoryEntry};
pub use job::{ActivityLogEntry, GenerationJob, JobOptions, JobStatus, LogLevel, Stage};
pub use newsletter::{Newsletter, NewsletterSection};
pub use profile::{AvoidanceKind, ContentSource, Host, Profile, Schedule, SourceKind, TopicAvoidanceRule};
pub use research::{CounterArgument, ExpertOpinion, ResearchDepth, ResearchedTopic, Stance, VerifiedFact};
pub use script::{DialogueLine, PodcastScript, ScriptSegment};
pub use verified::{SuggestedTone, VerifiedTopic};
