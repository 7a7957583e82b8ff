use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

use crate::models::RetrievalMode;

/// Pipeline counters, registered on a registry owned by the service.
#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    queries: IntCounterVec,
    web_fallback: IntCounter,
    web_failures: IntCounter,
    empty_evidence: IntCounter,
    generation_errors: IntCounter,
    index_version: IntGauge,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let queries = IntCounterVec::new(
            Opts::new("hybrid_rag_queries_total", "Queries processed, by retrieval mode"),
            &["mode"],
        )?;
        let web_fallback =
            IntCounter::new("hybrid_rag_web_fallback_total", "Queries that consulted the web")?;
        let web_failures = IntCounter::new(
            "hybrid_rag_web_failures_total",
            "Web lookups that degraded to no evidence",
        )?;
        let empty_evidence = IntCounter::new(
            "hybrid_rag_empty_evidence_total",
            "Queries answered with the no-evidence message",
        )?;
        let generation_errors =
            IntCounter::new("hybrid_rag_generation_errors_total", "Generation streams that broke off")?;
        let index_version =
            IntGauge::new("hybrid_rag_index_version", "Currently published index snapshot version")?;

        registry.register(Box::new(queries.clone()))?;
        registry.register(Box::new(web_fallback.clone()))?;
        registry.register(Box::new(web_failures.clone()))?;
        registry.register(Box::new(empty_evidence.clone()))?;
        registry.register(Box::new(generation_errors.clone()))?;
        registry.register(Box::new(index_version.clone()))?;

        Ok(Self {
            registry,
            queries,
            web_fallback,
            web_failures,
            empty_evidence,
            generation_errors,
            index_version,
        })
    }

    pub fn record_query(&self, mode: RetrievalMode, used_web_fallback: bool) {
        self.queries.with_label_values(&[mode.as_str()]).inc();
        if used_web_fallback {
            self.web_fallback.inc();
        }
    }

    pub fn record_web_failure(&self) {
        self.web_failures.inc();
    }

    pub fn record_empty_evidence(&self) {
        self.empty_evidence.inc();
    }

    pub fn record_generation_error(&self) {
        self.generation_errors.inc();
    }

    pub fn set_index_version(&self, version: u64) {
        self.index_version.set(i64::try_from(version).unwrap_or(i64::MAX));
    }

    /// Prometheus text exposition of every registered metric.
    pub fn render(&self) -> Result<(Vec<u8>, String), prometheus::Error> {
        let encoder = TextEncoder::new();
        let mut buffer = vec![];
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok((buffer, encoder.format_type().to_string()))
    }
}
