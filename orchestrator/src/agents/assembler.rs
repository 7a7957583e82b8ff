// Context Assembler: numbered, citation-labeled context plus the citation map

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::models::{Citation, EvidenceChunk, SearchResult};

static CITATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\[(?:sources?\s*)?(\d+(?:\s*,\s*(?:source\s*)?\d+)*)\]")
        .expect("citation regex is valid")
});
static NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+").expect("number regex is valid"));

/// Positional mapping `1..=N -> chunk`, in merged evidence order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CitationMap {
    chunks: Vec<EvidenceChunk>,
}

impl CitationMap {
    pub fn new(chunks: Vec<EvidenceChunk>) -> Self {
        Self { chunks }
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// 1-based lookup.
    pub fn get(&self, index: usize) -> Option<&EvidenceChunk> {
        index.checked_sub(1).and_then(|i| self.chunks.get(i))
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &EvidenceChunk)> {
        self.chunks.iter().enumerate().map(|(i, chunk)| (i + 1, chunk))
    }

    pub fn citations(&self) -> Vec<Citation> {
        self.iter().map(|(index, chunk)| Citation::from_chunk(index, chunk)).collect()
    }

    /// Every citation number that appears in `answer`, ascending, without repeats.
    pub fn cited_indices(answer: &str) -> Vec<usize> {
        let mut found = BTreeSet::new();
        for caps in CITATION_RE.captures_iter(answer) {
            for number in NUMBER_RE.find_iter(&caps[1]) {
                if let Ok(n) = number.as_str().parse::<usize>() {
                    found.insert(n);
                }
            }
        }
        found.into_iter().collect()
    }

    /// Citation numbers in `answer` that do not resolve against this map.
    pub fn unresolved(&self, answer: &str) -> Vec<usize> {
        Self::cited_indices(answer)
            .into_iter()
            .filter(|n| self.get(*n).is_none())
            .collect()
    }
}

/// Context block handed to the generator, paired with the map its
/// citation numbers resolve against.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssembledContext {
    pub text: String,
    pub citations: CitationMap,
}

impl AssembledContext {
    pub fn is_empty(&self) -> bool {
        self.citations.is_empty()
    }
}

/// `Source [i] (<label>): <content>` per chunk, blank line between blocks.
pub fn assemble(result: &SearchResult) -> AssembledContext {
    let text = result
        .chunks
        .iter()
        .enumerate()
        .map(|(i, chunk)| format!("Source [{}] ({}): {}", i + 1, chunk.citation_label(), chunk.content))
        .collect::<Vec<_>>()
        .join("\n\n");

    AssembledContext { text, citations: CitationMap::new(result.chunks.clone()) }
}
