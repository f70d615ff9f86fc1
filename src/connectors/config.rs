use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForumConfig {
    pub sections: Vec<String>,
    pub sort: String,
    pub time_window_hours: u32,
    pub oauth_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsApiConfig {
    pub categories: Vec<String>,
    pub domain_allow_list: Vec<String>,
    pub query: Option<String>,
    pub api_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RssConfig {
    pub feed_urls: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoTranscriptsConfig {
    pub video_ids: Vec<String>,
    pub language_preference: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatorBoardConfig {
    pub endpoints: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum SourceConfig {
    Forum(ForumConfig),
    NewsApi(NewsApiConfig),
    Rss(RssConfig),
    VideoTranscripts(VideoTranscriptsConfig),
    AggregatorBoard(AggregatorBoardConfig),
}

impl SourceConfig {
    #[must_use]
    pub fn endpoints(&self) -> Vec<String> {
        match self {
            Self::Forum(c) => c.sections.clone(),
            Self::NewsApi(c) => c.categories.clone(),
            Self::Rss(c) => c.feed_urls.clone(),
            Self::VideoTranscripts(c) => c.video_ids.clone(),
            Self::AggregatorBoard(c) => c.endpoints.clone(),
        }
    }
}
