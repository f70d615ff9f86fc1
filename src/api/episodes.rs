use axum::{
    body::Body,
    extract::{Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    Json,
};
use rss::extension::itunes::{ITunesChannelExtensionBuilder, ITunesItemExtensionBuilder};
use rss::{ChannelBuilder, EnclosureBuilder, GuidBuilder, ItemBuilder};
use serde::Serialize;
use tracing::error;
use uuid::Uuid;

use crate::app::AppState;
use crate::model::Episode;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EpisodeSummary {
    id: String,
    title: String,
    date: chrono::NaiveDate,
    duration_seconds: f64,
    status: &'static str,
}

impl From<&Episode> for EpisodeSummary {
    fn from(episode: &Episode) -> Self {
        Self {
            id: episode.id.clone(),
            title: episode.title.clone(),
            date: episode.date,
            duration_seconds: episode.duration_seconds,
            status: match episode.status {
                crate::model::EpisodeStatus::Draft => "draft",
                crate::model::EpisodeStatus::Published => "published",
                crate::model::EpisodeStatus::Archived => "archived",
            },
        }
    }
}

/// Lists recent episodes for a profile, newest first.
pub(crate) async fn list_for_profile(State(state): State<AppState>, Path(profile_id): Path<Uuid>) -> impl IntoResponse {
    match state.dao().list_episodes_for_profile(profile_id, 100).await {
        Ok(episodes) => {
            let summaries: Vec<EpisodeSummary> = episodes.iter().map(EpisodeSummary::from).collect();
            Json(summaries).into_response()
        }
        Err(error) => {
            error!(%error, %profile_id, "failed to list episodes");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Renders the RSS 2.0 + iTunes feed: one `<item>` per published episode
/// for the episode's profile, newest first.
pub(crate) async fn feed(State(state): State<AppState>, Path(episode_id): Path<String>) -> impl IntoResponse {
    let episode = match state.dao().get_episode(&episode_id).await {
        Ok(Some(episode)) => episode,
        Ok(None) => return StatusCode::NOT_FOUND.into_response(),
        Err(error) => {
            error!(%error, %episode_id, "failed to load episode for feed");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let siblings = match state.dao().list_episodes_for_profile(episode.profile_id, 100).await {
        Ok(episodes) => episodes,
        Err(error) => {
            error!(%error, profile_id = %episode.profile_id, "failed to list sibling episodes for feed");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let items = siblings
        .iter()
        .filter(|e| matches!(e.status, crate::model::EpisodeStatus::Published))
        .map(feed_item)
        .collect::<Vec<_>>();

    let itunes_ext = ITunesChannelExtensionBuilder::default().author(Some(episode.title.clone())).build();
    let channel = ChannelBuilder::default()
        .title(format!("{} — podcast-forge", episode.title))
        .link(format!("/profiles/{}/episodes", episode.profile_id))
        .description("Generated daily briefing")
        .itunes_ext(Some(itunes_ext))
        .items(items)
        .build();

    (
        [(header::CONTENT_TYPE, "application/rss+xml; charset=utf-8")],
        channel.to_string(),
    )
        .into_response()
}

fn feed_item(episode: &Episode) -> rss::Item {
    let duration = format_duration_hhmmss(episode.duration_seconds);
    let approx_bytes = (episode.duration_seconds * 16_000.0) as u64;
    let url = format!("/episodes/{}/audio", episode.id);

    let enclosure = EnclosureBuilder::default()
        .url(url)
        .length(approx_bytes.to_string())
        .mime_type("audio/wav")
        .build();
    let guid = GuidBuilder::default().value(episode.id.clone()).permalink(false).build();
    let itunes_ext = ITunesItemExtensionBuilder::default().duration(Some(duration)).build();

    ItemBuilder::default()
        .title(Some(episode.title.clone()))
        .description(Some(episode.summary.clone()))
        .guid(Some(guid))
        .enclosure(Some(enclosure))
        .itunes_ext(Some(itunes_ext))
        .build()
}

/// Formats a duration in seconds as `HH:MM:SS` for the iTunes extension.
fn format_duration_hhmmss(duration_seconds: f64) -> String {
    let total = duration_seconds.max(0.0) as u64;
    format!("{:02}:{:02}:{:02}", total / 3600, (total % 3600) / 60, total % 60)
}

/// Serves the stitched episode audio. The mixer only ever produces WAV;
/// served as-is rather than transcoded to MP3.
pub(crate) async fn audio(State(state): State<AppState>, Path(episode_id): Path<String>) -> impl IntoResponse {
    let episode = match state.dao().get_episode(&episode_id).await {
        Ok(Some(episode)) => episode,
        Ok(None) => return StatusCode::NOT_FOUND.into_response(),
        Err(error) => {
            error!(%error, %episode_id, "failed to load episode for audio");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let Some(path) = episode.stitched_audio_path else {
        return StatusCode::NOT_FOUND.into_response();
    };

    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(error) => {
            error!(%error, %path, "failed to read stitched audio file");
            return StatusCode::NOT_FOUND.into_response();
        }
    };

    match Response::builder().header(header::CONTENT_TYPE, "audio/wav").body(Body::from(bytes)) {
        Ok(response) => response.into_response(),
        Err(error) => {
            error!(%error, "failed to build audio response");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
