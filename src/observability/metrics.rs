/// Prometheus metric definitions for the production pipeline.
use prometheus::{
    Counter, CounterVec, Gauge, Histogram, Opts, Registry, register_counter_vec_with_registry,
    register_counter_with_registry, register_gauge_with_registry,
    register_histogram_with_registry,
};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct Metrics {
    pub jobs_started: Counter,
    pub jobs_completed: Counter,
    pub jobs_failed: Counter,
    pub jobs_cancelled: Counter,
    pub jobs_paused_for_review: Counter,

    pub connector_fetch_errors: CounterVec,
    pub connector_items_fetched: CounterVec,

    pub llm_calls_total: Counter,
    pub llm_retries_total: Counter,
    pub llm_malformed_total: Counter,

    pub tts_units_generated: Counter,
    pub tts_units_failed: Counter,

    pub stage_duration: Histogram,
    pub job_duration: Histogram,

    pub active_jobs: Gauge,
}

impl Metrics {
    #[allow(clippy::too_many_lines)]
    pub fn new(registry: Arc<Registry>) -> Result<Self, prometheus::Error> {
        Ok(Self {
            jobs_started: register_counter_with_registry!(
                "podcast_forge_jobs_started_total",
                "Total number of generation jobs started",
                registry
            )?,
            jobs_completed: register_counter_with_registry!(
                "podcast_forge_jobs_completed_total",
                "Total number of generation jobs that reached the done stage",
                registry
            )?,
            jobs_failed: register_counter_with_registry!(
                "podcast_forge_jobs_failed_total",
                "Total number of generation jobs that ended in failed",
                registry
            )?,
            jobs_cancelled: register_counter_with_registry!(
                "podcast_forge_jobs_cancelled_total",
                "Total number of generation jobs cancelled via the admin API",
                registry
            )?,
            jobs_paused_for_review: register_counter_with_registry!(
                "podcast_forge_jobs_paused_for_review_total",
                "Total number of jobs that entered the review stage awaiting approval",
                registry
            )?,
            connector_fetch_errors: register_counter_vec_with_registry!(
                Opts::new(
                    "podcast_forge_connector_fetch_errors_total",
                    "Connector fetch errors by source kind"
                ),
                &["source_kind"],
                registry
            )?,
            connector_items_fetched: register_counter_vec_with_registry!(
                Opts::new(
                    "podcast_forge_connector_items_fetched_total",
                    "Raw content items fetched by source kind"
                ),
                &["source_kind"],
                registry
            )?,
            llm_calls_total: register_counter_with_registry!(
                "podcast_forge_llm_calls_total",
                "Total number of LLM completion calls issued",
                registry
            )?,
            llm_retries_total: register_counter_with_registry!(
                "podcast_forge_llm_retries_total",
                "Total number of LLM completion call retries",
                registry
            )?,
            llm_malformed_total: register_counter_with_registry!(
                "podcast_forge_llm_malformed_total",
                "Total number of LLM responses that failed schema validation",
                registry
            )?,
            tts_units_generated: register_counter_with_registry!(
                "podcast_forge_tts_units_generated_total",
                "Total number of TTS audio units rendered successfully",
                registry
            )?,
            tts_units_failed: register_counter_with_registry!(
                "podcast_forge_tts_units_failed_total",
                "Total number of TTS audio unit render failures",
                registry
            )?,
            stage_duration: register_histogram_with_registry!(
                "podcast_forge_stage_duration_seconds",
                "Duration of a single pipeline stage execution",
                registry
            )?,
            job_duration: register_histogram_with_registry!(
                "podcast_forge_job_duration_seconds",
                "Duration of an entire generation job from pending to done",
                registry
            )?,
            active_jobs: register_gauge_with_registry!(
                "podcast_forge_active_jobs",
                "Number of jobs currently in the running state",
                registry
            )?,
        })
    }
}
