// src/pipeline.rs
//! Scan orchestration: gateway → normalizer → retriever → gates → scorer → ranker.
//!
//! A pipeline holds only immutable tuning plus the optional search cache, so one
//! instance serves any number of concurrent scans.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use metrics::{counter, histogram};
use serde::Serialize;
use tracing::{info, warn};

use crate::analyze::{
    AnalysisGateway, CapturedFrame, ClientOcrRecognizer, DynTextClassifier, DynTextRecognizer,
    DynVisionClassifier,
};
use crate::config::MatchConfig;
use crate::error::ScanError;
use crate::gate::MatchGate;
use crate::model::{ProductAnalysis, ScanClassification, ScanMethod, ScoredMatch};
use crate::normalize::Normalizer;
use crate::rank::rank;
use crate::retrieve::{CachedSearchIndex, CandidateRetriever, DynSearchIndex, InMemoryIndex, TypesenseIndex};
use crate::scoring::{build_scorer, Scorer};
use crate::text::anon_hash;

pub const ENV_CATALOG_PATH: &str = "SCAN_CATALOG_PATH";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchOutcome {
    Matched,
    /// The index had nothing for the query.
    NoCandidates,
    /// Candidates existed but every one was excluded.
    NoSurvivingCandidates,
}

impl MatchOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchOutcome::Matched => "matched",
            MatchOutcome::NoCandidates => "no_candidates",
            MatchOutcome::NoSurvivingCandidates => "no_surviving_candidates",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanReport {
    pub method: ScanMethod,
    pub cost_usd: f64,
    pub elapsed_ms: u64,
    pub classification: ScanClassification,
    pub outcome: MatchOutcome,
    pub matches: Vec<ScoredMatch>,
}

pub struct ScanPipeline {
    gateway: AnalysisGateway,
    normalizer: Normalizer,
    retriever: CandidateRetriever,
    gate: MatchGate,
    scorer: Arc<dyn Scorer>,
    candidate_cap: usize,
    top_k: usize,
}

impl ScanPipeline {
    pub fn new(
        cfg: &MatchConfig,
        recognizer: DynTextRecognizer,
        text: DynTextClassifier,
        vision: DynVisionClassifier,
        index: DynSearchIndex,
    ) -> Self {
        let gates = Arc::new(cfg.gates.clone());
        let taxonomy = Arc::new(cfg.taxonomy.clone());
        Self {
            gateway: AnalysisGateway::new(
                recognizer,
                text,
                vision,
                cfg.gateway.clone(),
                &gates,
                &taxonomy,
            ),
            normalizer: Normalizer::new(taxonomy.clone()),
            retriever: CandidateRetriever::new(index, cfg.retrieval.timeout()).with_taxonomy(taxonomy.clone()),
            gate: MatchGate::new(gates.clone()),
            scorer: build_scorer(&cfg.scoring, taxonomy, gates),
            candidate_cap: cfg.retrieval.candidate_cap,
            top_k: cfg.ranking.top_k,
        }
    }

    /// Production wiring from env: OpenAI classifiers (or mocks under `AI_TEST_MODE=mock`),
    /// Typesense behind the search cache when `TYPESENSE_HOST` is set, otherwise an
    /// in-memory catalog loaded from `SCAN_CATALOG_PATH`.
    pub fn from_env(cfg: &MatchConfig) -> anyhow::Result<Self> {
        let (text, vision) = crate::analyze::ai_adapter::build_classifiers(cfg.gateway.cheap_path_enabled)
            .map_err(|e| anyhow::anyhow!("Failed to build classifiers: {}", e))?;

        let index: DynSearchIndex = match TypesenseIndex::from_env()
            .map_err(|e| anyhow::anyhow!("Failed to build search client: {}", e))?
        {
            Some(ts) if cfg.retrieval.cache_enabled => Arc::new(CachedSearchIndex::new(
                ts,
                cfg.retrieval.cache_ttl(),
                cfg.retrieval.cache_capacity,
            )),
            Some(ts) => Arc::new(ts),
            None => Arc::new(load_local_catalog()?),
        };

        Ok(Self::new(cfg, Arc::new(ClientOcrRecognizer), text, vision, index))
    }

    pub fn with_scorer(mut self, scorer: Arc<dyn Scorer>) -> Self {
        self.scorer = scorer;
        self
    }

    pub fn scorer_name(&self) -> &'static str {
        self.scorer.name()
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    pub fn candidate_cap(&self) -> usize {
        self.candidate_cap
    }

    /// Full scan with the configured top-K.
    pub async fn scan(&self, frames: &[CapturedFrame]) -> Result<ScanReport, ScanError> {
        self.scan_top_k(frames, self.top_k).await
    }

    pub async fn scan_top_k(&self, frames: &[CapturedFrame], top_k: usize) -> Result<ScanReport, ScanError> {
        let started = Instant::now();
        let outcome = match self.gateway.analyze(frames).await {
            Ok(o) => o,
            Err(e) => return Err(record_failure(e)),
        };
        self.finish(outcome.analysis, outcome.method, outcome.cost_usd, top_k, started)
            .await
    }

    /// Scan that gives up as soon as `cancel` resolves. In-flight calls are dropped
    /// and nothing partial is returned.
    pub async fn scan_until<F>(&self, frames: &[CapturedFrame], cancel: F) -> Result<ScanReport, ScanError>
    where
        F: Future<Output = ()>,
    {
        tokio::select! {
            report = self.scan(frames) => report,
            _ = cancel => {
                info!("scan cancelled by caller");
                Err(record_failure(ScanError::Cancelled))
            }
        }
    }

    /// Match an analysis produced elsewhere; no analyzer call, no cost.
    pub async fn match_analysis(
        &self,
        analysis: ProductAnalysis,
        method: ScanMethod,
    ) -> Result<ScanReport, ScanError> {
        self.match_analysis_top_k(analysis, method, self.top_k).await
    }

    pub async fn match_analysis_top_k(
        &self,
        analysis: ProductAnalysis,
        method: ScanMethod,
        top_k: usize,
    ) -> Result<ScanReport, ScanError> {
        self.finish(analysis, method, 0.0, top_k, Instant::now()).await
    }

    async fn finish(
        &self,
        analysis: ProductAnalysis,
        method: ScanMethod,
        cost_usd: f64,
        top_k: usize,
        started: Instant,
    ) -> Result<ScanReport, ScanError> {
        let classification = self.normalizer.normalize(&analysis);
        let candidates = match self.retriever.retrieve(&classification, self.candidate_cap).await {
            Ok(c) => c,
            Err(e) => return Err(record_failure(e)),
        };

        let (outcome, matches) = if candidates.is_empty() {
            (MatchOutcome::NoCandidates, Vec::new())
        } else {
            let report = self.gate.filter(&classification, candidates);
            let scored = self.scorer.score(&classification, &report.survivors);
            if scored.is_empty() {
                (MatchOutcome::NoSurvivingCandidates, Vec::new())
            } else {
                // top_k of 0 is honored: matched, nothing returned
                (MatchOutcome::Matched, rank(scored, top_k))
            }
        };

        let elapsed = started.elapsed();
        record_success(method, outcome, cost_usd, elapsed);
        info!(
            type_id = %anon_hash(&classification.product_type.raw),
            method = method.as_str(),
            outcome = outcome.as_str(),
            matches = matches.len(),
            scorer = self.scorer.name(),
            elapsed_ms = elapsed.as_millis() as u64,
            "scan finished"
        );

        Ok(ScanReport {
            method,
            cost_usd,
            elapsed_ms: elapsed.as_millis() as u64,
            classification,
            outcome,
            matches,
        })
    }
}

fn record_success(method: ScanMethod, outcome: MatchOutcome, cost_usd: f64, elapsed: Duration) {
    counter!("scan_total", "method" => method.as_str()).increment(1);
    counter!("scan_outcome_total", "outcome" => outcome.as_str()).increment(1);
    histogram!("scan_duration_ms").record(elapsed.as_secs_f64() * 1000.0);
    histogram!("scan_cost_usd").record(cost_usd);
}

fn record_failure(e: ScanError) -> ScanError {
    counter!("scan_failed_total", "cause" => e.cause_tag()).increment(1);
    warn!(cause = e.cause_tag(), error = %e, "scan failed");
    e
}

fn load_local_catalog() -> anyhow::Result<InMemoryIndex> {
    let Ok(path) = std::env::var(ENV_CATALOG_PATH) else {
        warn!("no TYPESENSE_HOST or SCAN_CATALOG_PATH set, searching an empty catalog");
        return Ok(InMemoryIndex::default());
    };
    let json = std::fs::read_to_string(&path)
        .map_err(|e| anyhow::anyhow!("Failed to read catalog at {}: {}", path, e))?;
    let idx = InMemoryIndex::from_json(&json)?;
    info!(products = idx.len(), path = %path, "loaded local catalog");
    Ok(idx)
}
