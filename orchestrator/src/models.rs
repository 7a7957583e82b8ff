use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Where a piece of evidence came from. Drives how its citation is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    InternalDocument,
    Web,
    Wiki,
}

/// A retrieved text unit with provenance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceChunk {
    pub id: String,
    pub source_id: String,
    pub source_kind: SourceKind,
    pub title: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_number: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section_label: Option<String>,
}

impl EvidenceChunk {
    /// Checks the invariants a chunk must hold before it may be cited.
    pub fn validate(&self) -> Result<(), String> {
        if self.content.trim().is_empty() {
            return Err(format!("chunk '{}' has empty content", self.id));
        }
        if self.source_kind == SourceKind::Web && self.url.is_none() {
            return Err(format!("web chunk '{}' is missing its url", self.id));
        }
        Ok(())
    }

    /// `[Web] <title>` for web evidence, `[Doc] <title> (Pg n)` otherwise.
    pub fn citation_label(&self) -> String {
        match self.source_kind {
            SourceKind::Web => format!("[Web] {}", self.title),
            SourceKind::InternalDocument | SourceKind::Wiki => match self.page_number {
                Some(page) => format!("[Doc] {} (Pg {})", self.title, page),
                None => format!("[Doc] {}", self.title),
            },
        }
    }
}

/// The router's decision about which knowledge sources to consult.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetrievalMode {
    Document,
    Web,
    Hybrid,
}

impl RetrievalMode {
    pub const ALL: [RetrievalMode; 3] =
        [RetrievalMode::Document, RetrievalMode::Web, RetrievalMode::Hybrid];

    pub fn as_str(&self) -> &'static str {
        match self {
            RetrievalMode::Document => "document",
            RetrievalMode::Web => "web",
            RetrievalMode::Hybrid => "hybrid",
        }
    }
}

impl Default for RetrievalMode {
    fn default() -> Self {
        RetrievalMode::Hybrid
    }
}

impl fmt::Display for RetrievalMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RetrievalMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "document" => Ok(RetrievalMode::Document),
            "web" => Ok(RetrievalMode::Web),
            "hybrid" => Ok(RetrievalMode::Hybrid),
            other => Err(format!("unknown retrieval mode '{other}'")),
        }
    }
}

/// Merged evidence for one query: document chunks first, then web chunks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchResult {
    pub query: String,
    pub chunks: Vec<EvidenceChunk>,
    /// True when the web retriever was consulted for this request.
    pub used_web_fallback: bool,
    /// Set when the web provider failed; the web portion of `chunks` is then empty.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub web_error: Option<String>,
}

impl SearchResult {
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

// API Request/Response models
#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub query: String,
    /// Skips the router when present.
    #[serde(default)]
    pub mode: Option<RetrievalMode>,
}

#[derive(Debug, Serialize)]
pub struct QueryResponse {
    pub request_id: Uuid,
    pub query: String,
    pub mode: RetrievalMode,
    pub used_web_fallback: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub web_error: Option<String>,
    pub answer: String,
    pub citations: Vec<Citation>,
    pub unresolved_citations: Vec<usize>,
    pub created_at: DateTime<Utc>,
}

/// One entry of the citation map as shown to API callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    pub index: usize,
    pub label: String,
    pub source_kind: SourceKind,
    pub source_id: String,
    pub title: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_number: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section_label: Option<String>,
}

impl Citation {
    pub fn from_chunk(index: usize, chunk: &EvidenceChunk) -> Self {
        Self {
            index,
            label: chunk.citation_label(),
            source_kind: chunk.source_kind,
            source_id: chunk.source_id.clone(),
            title: chunk.title.clone(),
            content: chunk.content.clone(),
            page_number: chunk.page_number,
            url: chunk.url.clone(),
            section_label: chunk.section_label.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct IndexRequest {
    pub chunks: Vec<EvidenceChunk>,
}

#[derive(Debug, Serialize)]
pub struct IndexResponse {
    pub version: u64,
    pub chunk_count: usize,
}
