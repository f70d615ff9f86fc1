use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use tracing::warn;

use crate::clients::{Embedder, LlmClient, embedder::cosine_similarity};
use crate::clients::llm::CompletionRequest;
use crate::model::{RawContentItem, TopicCluster};

const MIN_CLUSTER_SIZE: usize = 2;
const CLUSTER_SELECTION_EPSILON: f64 = 0.3;
const NOISE_ENGAGEMENT_FLOOR: f64 = 50.0;
const MERGE_SIMILARITY_THRESHOLD: f64 = 0.85;
const BREAKING_ENGAGEMENT_FLOOR: f64 = 500.0;
const BREAKING_RECENCY_FRACTION: f64 = 0.7;
const BREAKING_RECENCY_WINDOW_HOURS: i64 = 6;
const TRENDING_ENGAGEMENT_FLOOR: f64 = 200.0;
const TRENDING_MIN_SOURCE_DIVERSITY: usize = 2;

const STOPWORDS: &[&str] = &[
    "the", "a", "an", "of", "to", "in", "on", "for", "and", "or", "is", "are", "was", "were",
    "with", "at", "by", "from", "as", "it", "its", "this", "that", "be", "has", "have", "had",
    "new", "says", "say",
];

/// Partitions aggregated items into topic clusters.
#[async_trait]
pub trait ClusteringStage: Send + Sync {
    /// # Errors
    /// Returns an error when embedding every item fails; individual LLM
    /// naming failures degrade to the provisional name instead of erroring.
    async fn cluster(&self, items: Vec<RawContentItem>) -> anyhow::Result<Vec<TopicCluster>>;
}

pub struct DensityClusterer {
    embedder: std::sync::Arc<dyn Embedder>,
    llm: std::sync::Arc<dyn LlmClient>,
}

impl DensityClusterer {
    #[must_use]
    pub fn new(embedder: std::sync::Arc<dyn Embedder>, llm: std::sync::Arc<dyn LlmClient>) -> Self {
        Self { embedder, llm }
    }
}

#[derive(Deserialize)]
struct NamingSuggestion {
    name: String,
    summary: String,
    category: String,
}

#[async_trait]
impl ClusteringStage for DensityClusterer {
    async fn cluster(&self, mut items: Vec<RawContentItem>) -> anyhow::Result<Vec<TopicCluster>> {
        for item in &mut items {
            if item.embedding.is_none() {
                let text = format!(
                    "{} {} {}",
                    item.title,
                    item.title,
                    item.body.chars().take(500).collect::<String>()
                );
                match self.embedder.embed(&text).await {
                    Ok(vector) => item.embedding = Some(vector),
                    Err(error) => warn!(item_id = %item.id, error = %error, "embedding failed, item excluded from clustering"),
                }
            }
        }
        let items: Vec<RawContentItem> = items.into_iter().filter(|item| item.embedding.is_some()).collect();

        let groups = density_group(&items);

        let mut clusters: Vec<TopicCluster> = Vec::new();
        for group in groups {
            if group.len() >= MIN_CLUSTER_SIZE {
                clusters.push(build_cluster(group));
            } else if let [only] = group.as_slice() {
                if only.raw_engagement() > NOISE_ENGAGEMENT_FLOOR {
                    clusters.push(build_cluster(vec![only.clone()]));
                }
            }
        }

        name_clusters(&self.llm, &mut clusters).await;
        detect_trends(&mut clusters);
        clusters = merge_similar(clusters);
        score_priority(&mut clusters);

        clusters.sort_by(|a, b| {
            b.priority_score
                .partial_cmp(&a.priority_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.member_count().cmp(&a.member_count()))
                .then_with(|| a.earliest_published.cmp(&b.earliest_published))
        });

        Ok(clusters)
    }
}

/// Connected-components clustering over a cosine-distance graph: an edge
/// joins two items when their distance is within `clusterSelectionEpsilon`.
/// With `minSamples = 1` every point is its own core point, so this reduces
/// to single-linkage clustering at that radius.
fn density_group(items: &[RawContentItem]) -> Vec<Vec<RawContentItem>> {
    let n = items.len();
    let mut parent: Vec<usize> = (0..n).collect();

    fn find(parent: &mut [usize], x: usize) -> usize {
        if parent[x] != x {
            parent[x] = find(parent, parent[x]);
        }
        parent[x]
    }

    for i in 0..n {
        for j in (i + 1)..n {
            let (Some(a), Some(b)) = (&items[i].embedding, &items[j].embedding) else { continue };
            let distance = 1.0 - cosine_similarity(a, b);
            if distance <= CLUSTER_SELECTION_EPSILON {
                let root_i = find(&mut parent, i);
                let root_j = find(&mut parent, j);
                if root_i != root_j {
                    parent[root_i] = root_j;
                }
            }
        }
    }

    let mut groups: HashMap<usize, Vec<RawContentItem>> = HashMap::new();
    for (index, item) in items.iter().enumerate() {
        let root = find(&mut parent, index);
        groups.entry(root).or_default().push(item.clone());
    }
    groups.into_values().collect()
}

fn build_cluster(members: Vec<RawContentItem>) -> TopicCluster {
    let dimension = members.iter().find_map(|m| m.embedding.as_ref().map(Vec::len)).unwrap_or(0);
    let mut centroid = vec![0.0_f32; dimension];
    for member in &members {
        if let Some(embedding) = &member.embedding {
            for (slot, value) in centroid.iter_mut().zip(embedding) {
                *slot += value;
            }
        }
    }
    if !members.is_empty() {
        for value in &mut centroid {
            *value /= members.len() as f32;
        }
    }

    let coherence = if members.len() < 2 {
        1.0
    } else {
        let mut total = 0.0;
        let mut pairs = 0usize;
        for i in 0..members.len() {
            for j in (i + 1)..members.len() {
                if let (Some(a), Some(b)) = (&members[i].embedding, &members[j].embedding) {
                    total += cosine_similarity(a, b);
                    pairs += 1;
                }
            }
        }
        if pairs == 0 { 1.0 } else { total / pairs as f64 }
    };

    let total_engagement: f64 = members.iter().map(RawContentItem::raw_engagement).sum();
    let source_diversity = members.iter().map(|m| m.source_kind).collect::<HashSet<_>>().len();
    let earliest_published = members.iter().map(|m| m.published_at).min().unwrap_or_else(Utc::now);
    let latest_published = members.iter().map(|m| m.published_at).max().unwrap_or_else(Utc::now);
    let name = provisional_name(&members);

    TopicCluster {
        id: uuid::Uuid::new_v4().to_string(),
        name: name.clone(),
        summary: String::new(),
        category: "general".to_string(),
        members,
        centroid,
        coherence,
        total_engagement,
        source_diversity,
        earliest_published,
        latest_published,
        is_breaking: false,
        is_trending: false,
        priority_score: 0.0,
    }
}

fn provisional_name(members: &[RawContentItem]) -> String {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for member in members {
        for token in member.title.split_whitespace() {
            let normalized: String = token.chars().filter(|c| c.is_alphanumeric()).collect::<String>().to_lowercase();
            if normalized.len() < 3 || STOPWORDS.contains(&normalized.as_str()) {
                continue;
            }
            *counts.entry(normalized).or_insert(0) += 1;
        }
    }
    let mut ranked: Vec<(String, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    let top: Vec<String> = ranked.into_iter().take(4).map(|(token, _)| token).collect();
    if top.is_empty() {
        members.first().map(|m| m.title.clone()).unwrap_or_default()
    } else {
        top.join(" ")
    }
}

async fn name_clusters(llm: &std::sync::Arc<dyn LlmClient>, clusters: &mut [TopicCluster]) {
    if clusters.is_empty() {
        return;
    }
    if let Some(suggestions) = batch_naming(llm, clusters).await {
        for (cluster, suggestion) in clusters.iter_mut().zip(suggestions) {
            cluster.name = suggestion.name;
            cluster.summary = suggestion.summary;
            cluster.category = suggestion.category;
        }
        return;
    }
    for cluster in clusters.iter_mut() {
        match per_cluster_naming(llm, cluster).await {
            Some(suggestion) => {
                cluster.name = suggestion.name;
                cluster.summary = suggestion.summary;
                cluster.category = suggestion.category;
            }
            None => warn!(cluster = %cluster.id, "LLM naming unavailable, keeping provisional name"),
        }
    }
}

fn naming_prompt(cluster: &TopicCluster) -> String {
    let titles: Vec<&str> = cluster.members.iter().take(5).map(|m| m.title.as_str()).collect();
    format!(
        "Provisional topic name: {}\nMember headlines:\n{}\n\nRespond with JSON: {{\"name\": ..., \"summary\": \"two sentences\", \"category\": \"one word\"}}",
        cluster.name,
        titles.join("\n")
    )
}

async fn batch_naming(llm: &std::sync::Arc<dyn LlmClient>, clusters: &[TopicCluster]) -> Option<Vec<NamingSuggestion>> {
    let prompt = clusters
        .iter()
        .enumerate()
        .map(|(index, cluster)| format!("Cluster {index}:\n{}", naming_prompt(cluster)))
        .collect::<Vec<_>>()
        .join("\n\n");
    let request = CompletionRequest {
        system_prompt: Some("Respond with a JSON array, one object per cluster, in order.".to_string()),
        prompt,
        web_grounded: false,
    };
    let response = llm.complete(request).await.ok()?;
    let suggestions: Vec<NamingSuggestion> = serde_json::from_str(extract_json(&response)?).ok()?;
    if suggestions.len() == clusters.len() { Some(suggestions) } else { None }
}

async fn per_cluster_naming(llm: &std::sync::Arc<dyn LlmClient>, cluster: &TopicCluster) -> Option<NamingSuggestion> {
    let request = CompletionRequest { system_prompt: None, prompt: naming_prompt(cluster), web_grounded: false };
    let response = llm.complete(request).await.ok()?;
    serde_json::from_str(extract_json(&response)?).ok()
}

fn extract_json(text: &str) -> Option<&str> {
    let start = text.find(['{', '['])?;
    let end = text.rfind(['}', ']'])?;
    if end < start { None } else { Some(&text[start..=end]) }
}

fn detect_trends(clusters: &mut [TopicCluster]) {
    let now = Utc::now();
    let window = Duration::hours(BREAKING_RECENCY_WINDOW_HOURS);
    for cluster in clusters.iter_mut() {
        let recent_fraction = fraction_within(&cluster.members, now, window);
        cluster.is_breaking = recent_fraction >= BREAKING_RECENCY_FRACTION && cluster.total_engagement > BREAKING_ENGAGEMENT_FLOOR;
        cluster.is_trending =
            cluster.source_diversity >= TRENDING_MIN_SOURCE_DIVERSITY && cluster.total_engagement > TRENDING_ENGAGEMENT_FLOOR;
    }
}

fn fraction_within(members: &[RawContentItem], now: DateTime<Utc>, window: Duration) -> f64 {
    if members.is_empty() {
        return 0.0;
    }
    let recent = members.iter().filter(|m| now.signed_duration_since(m.published_at) <= window).count();
    recent as f64 / members.len() as f64
}

fn merge_similar(mut clusters: Vec<TopicCluster>) -> Vec<TopicCluster> {
    loop {
        let mut merged_any = false;
        'outer: for i in 0..clusters.len() {
            for j in (i + 1)..clusters.len() {
                if cosine_similarity(&clusters[i].centroid, &clusters[j].centroid) > MERGE_SIMILARITY_THRESHOLD {
                    let right = clusters.remove(j);
                    merge_into(&mut clusters[i], right);
                    merged_any = true;
                    break 'outer;
                }
            }
        }
        if !merged_any {
            break;
        }
    }
    clusters
}

fn merge_into(left: &mut TopicCluster, right: TopicCluster) {
    left.members.extend(right.members);
    left.source_diversity = left.members.iter().map(|m| m.source_kind).collect::<HashSet<_>>().len();
    left.total_engagement += right.total_engagement;
    left.earliest_published = left.earliest_published.min(right.earliest_published);
    left.latest_published = left.latest_published.max(right.latest_published);
    left.is_breaking = left.is_breaking || right.is_breaking;
    left.is_trending = left.is_trending || right.is_trending;
    let rebuilt = build_cluster(left.members.clone());
    left.centroid = rebuilt.centroid;
    left.coherence = rebuilt.coherence;
}

fn score_priority(clusters: &mut [TopicCluster]) {
    for cluster in clusters.iter_mut() {
        let breaking_bonus = if cluster.is_breaking { 5.0 } else { 0.0 };
        let trending_bonus = if cluster.is_trending { 3.0 } else { 0.0 };
        let score = cluster.total_engagement / 100.0 + cluster.source_diversity as f64 * 2.0 + breaking_bonus + trending_bonus;
        cluster.priority_score = score.min(10.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::profile::SourceKind;
    use chrono::TimeZone;

    fn item(id: &str, title: &str, embedding: Vec<f32>, score: f64, published_at: DateTime<Utc>, kind: SourceKind) -> RawContentItem {
        RawContentItem {
            id: id.to_string(),
            source_kind: kind,
            source_name: "src".to_string(),
            title: title.to_string(),
            body: "body text".to_string(),
            url: None,
            author: None,
            published_at,
            fetched_at: published_at,
            score: Some(score),
            comment_count: Some(0),
            share_count: None,
            source_priority: 10,
            source_credibility: 1.0,
            content_hash: 0,
            embedding: Some(embedding),
            categories: vec![],
        }
    }

    #[test]
    fn density_group_joins_nearby_and_separates_distant_items() {
        let epoch = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let items = vec![
            item("a", "Election results surprise analysts", vec![1.0, 0.0], 10.0, epoch, SourceKind::Rss),
            item("b", "Election results stun pundits", vec![0.99, 0.02], 10.0, epoch, SourceKind::NewsApi),
            item("c", "New recipe for sourdough bread", vec![0.0, 1.0], 10.0, epoch, SourceKind::Forum),
        ];
        let groups = density_group(&items);
        assert_eq!(groups.len(), 2);
        assert!(groups.iter().any(|g| g.len() == 2));
        assert!(groups.iter().any(|g| g.len() == 1));
    }

    #[test]
    fn build_cluster_computes_perfect_coherence_for_identical_embeddings() {
        let epoch = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let members = vec![
            item("a", "A", vec![1.0, 0.0], 10.0, epoch, SourceKind::Rss),
            item("b", "B", vec![1.0, 0.0], 10.0, epoch, SourceKind::Rss),
        ];
        let cluster = build_cluster(members);
        assert!((cluster.coherence - 1.0).abs() < 1e-6);
        assert_eq!(cluster.source_diversity, 1);
    }

    #[test]
    fn single_item_cluster_has_coherence_one() {
        let epoch = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let cluster = build_cluster(vec![item("a", "Solo", vec![1.0, 0.0], 10.0, epoch, SourceKind::Rss)]);
        assert!((cluster.coherence - 1.0).abs() < 1e-9);
    }

    #[test]
    fn detect_trends_flags_breaking_on_recency_and_engagement() {
        let now = Utc::now();
        let members = vec![
            item("a", "A", vec![1.0, 0.0], 400.0, now, SourceKind::Rss),
            item("b", "B", vec![1.0, 0.0], 400.0, now, SourceKind::Rss),
        ];
        let mut clusters = vec![build_cluster(members)];
        detect_trends(&mut clusters);
        assert!(clusters[0].is_breaking);
    }

    #[test]
    fn detect_trends_flags_trending_on_diversity_and_engagement() {
        let epoch = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        let members = vec![
            item("a", "A", vec![1.0, 0.0], 150.0, epoch, SourceKind::Rss),
            item("b", "B", vec![1.0, 0.0], 150.0, epoch, SourceKind::NewsApi),
        ];
        let mut clusters = vec![build_cluster(members)];
        detect_trends(&mut clusters);
        assert!(!clusters[0].is_breaking);
        assert!(clusters[0].is_trending);
    }

    #[test]
    fn merge_similar_combines_centroids_above_threshold() {
        let epoch = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let a = build_cluster(vec![
            item("a", "A", vec![1.0, 0.0], 10.0, epoch, SourceKind::Rss),
            item("b", "B", vec![1.0, 0.0], 10.0, epoch, SourceKind::Rss),
        ]);
        let b = build_cluster(vec![
            item("c", "C", vec![0.99, 0.01], 10.0, epoch, SourceKind::NewsApi),
            item("d", "D", vec![0.99, 0.01], 10.0, epoch, SourceKind::NewsApi),
        ]);
        let merged = merge_similar(vec![a, b]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].member_count(), 4);
    }

    #[test]
    fn score_priority_caps_at_ten() {
        let epoch = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let mut clusters = vec![build_cluster(vec![
            item("a", "A", vec![1.0, 0.0], 10000.0, epoch, SourceKind::Rss),
            item("b", "B", vec![1.0, 0.0], 10000.0, epoch, SourceKind::Rss),
        ])];
        clusters[0].is_breaking = true;
        clusters[0].is_trending = true;
        score_priority(&mut clusters);
        assert_eq!(clusters[0].priority_score, 10.0);
    }

    #[test]
    fn extract_json_finds_embedded_object() {
        let text = "Sure, here you go: {\"name\":\"x\",\"summary\":\"y\",\"category\":\"z\"} thanks";
        let extracted = extract_json(text).unwrap();
        let parsed: NamingSuggestion = serde_json::from_str(extracted).unwrap();
        assert_eq!(parsed.name, "x");
    }
}
