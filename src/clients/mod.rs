//! External collaborators: the LLM, the embedding model, the TTS engine, and
//! the audio mixer. The crate owns only the trait interface and one
//! HTTP-backed default adapter per collaborator; model and DSP internals are
//! out of scope.

pub mod embedder;
pub mod llm;
pub mod mixer;
pub mod tts;

pub use embedder::{Embedder, HttpEmbedder};
pub use llm::{HttpLlmClient, LlmClient};
pub use mixer::{AudioMixer, WavAudioMixer};
pub use tts::{HttpTtsClient, TtsClient, TtsProvider};
