use std::time::Duration;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TtsProvider {
    Google,
    CloudTtsAlt,
}

impl TtsProvider {
    /// # Errors
    /// Returns an error for any value other than `google` or `cloud-tts-alt`.
    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "google" => Ok(Self::Google),
            "cloud-tts-alt" => Ok(Self::CloudTtsAlt),
            other => bail!("unknown TTS_PROVIDER {other:?}, expected \"google\" or \"cloud-tts-alt\""),
        }
    }

    /// Default TTS unit fan-out: 5 for the cloud provider, 3 for the other.
    #[must_use]
    pub fn default_parallelism(self) -> usize {
        match self {
            Self::Google => 5,
            Self::CloudTtsAlt => 3,
        }
    }
}

/// The speech-synthesis interface for an external TTS provider. Returns raw
/// PCM bytes; the renderer wraps them as WAV.
#[async_trait]
pub trait TtsClient: Send + Sync {
    /// `model` overrides the provider's configured voice model for this unit
    /// only, when the job requested one.
    ///
    /// # Errors
    /// Returns an error on a transport failure, timeout, or missing credential.
    async fn synthesize(&self, voice_id: &str, text: &str, model: Option<&str>) -> Result<Vec<u8>>;
}

#[derive(Debug, Serialize)]
struct SynthesizeRequest<'a> {
    voice_id: &'a str,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
}

pub struct HttpTtsClient {
    client: Client,
    base_url: Url,
    api_key: String,
}

impl HttpTtsClient {
    /// # Errors
    /// Returns an error when the base URL cannot be parsed.
    pub fn new(base_url: &str, api_key: String, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build().context("failed to build TTS client")?,
            base_url: Url::parse(base_url).context("invalid TTS base URL")?,
            api_key,
        })
    }
}

#[async_trait]
impl TtsClient for HttpTtsClient {
    async fn synthesize(&self, voice_id: &str, text: &str, model: Option<&str>) -> Result<Vec<u8>> {
        if self.api_key.is_empty() {
            bail!("credential missing: no TTS API key configured");
        }
        let endpoint = self.base_url.join("v1/synthesize").context("invalid synthesize endpoint")?;
        let bytes = self
            .client
            .post(endpoint)
            .bearer_auth(&self.api_key)
            .json(&SynthesizeRequest { voice_id, text, model })
            .send()
            .await
            .context("TTS request failed")?
            .error_for_status()
            .context("TTS service returned an error")?
            .bytes()
            .await
            .context("failed to read TTS response body")?;
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_parses_known_values() {
        assert_eq!(TtsProvider::parse("google").unwrap(), TtsProvider::Google);
        assert_eq!(TtsProvider::parse("cloud-tts-alt").unwrap(), TtsProvider::CloudTtsAlt);
        assert!(TtsProvider::parse("other").is_err());
    }

    #[test]
    fn default_parallelism_matches_spec() {
        assert_eq!(TtsProvider::Google.default_parallelism(), 5);
        assert_eq!(TtsProvider::CloudTtsAlt.default_parallelism(), 3);
    }
}
