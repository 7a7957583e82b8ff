pub mod assembler;
pub mod generator;
pub mod orchestrator;
pub mod retriever;
pub mod router;
pub mod web;

pub use assembler::{assemble, AssembledContext, CitationMap};
pub use generator::{Answer, GenerationAdapter, NO_EVIDENCE_MESSAGE};
pub use orchestrator::{FallbackPolicy, RetrievalOrchestrator};
pub use retriever::DocumentRetriever;
pub use router::QueryRouter;
pub use web::{WebOutcome, WebRetriever};
