use std::collections::HashSet;

/// Category inferred for a discovered link.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LinkCategory {
    /// Id of a [`crate::TargetCategory`].
    Target(String),
    Unknown,
}

impl LinkCategory {
    pub fn target_id(&self) -> Option<&str> {
        match self {
            LinkCategory::Target(id) => Some(id),
            LinkCategory::Unknown => None,
        }
    }
}

/// Which discovery tier produced a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiscoveryMethod {
    StructuredSection,
    SectionHeader,
    ButtonContext,
    DirectLink,
}

impl DiscoveryMethod {
    pub fn tag(self) -> &'static str {
        match self {
            DiscoveryMethod::StructuredSection => "structured_section",
            DiscoveryMethod::SectionHeader => "section_header",
            DiscoveryMethod::ButtonContext => "context_analysis",
            DiscoveryMethod::DirectLink => "direct_link",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkCandidate {
    /// Always absolute.
    pub url: String,
    pub text: String,
    pub category: LinkCategory,
    pub method: DiscoveryMethod,
}

/// Deduplicating accumulator shared by all discovery tiers.
///
/// The first occurrence of a URL wins and insertion order is kept.
#[derive(Debug, Clone, Default)]
pub struct CandidateSet {
    seen: HashSet<String>,
    items: Vec<LinkCandidate>,
}

impl CandidateSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `candidate` unless its URL is already present. Returns whether it was added.
    pub fn push(&mut self, candidate: LinkCandidate) -> bool {
        if self.seen.contains(&candidate.url) {
            return false;
        }
        self.seen.insert(candidate.url.clone());
        self.items.push(candidate);
        true
    }

    pub fn extend(&mut self, candidates: impl IntoIterator<Item = LinkCandidate>) -> usize {
        candidates
            .into_iter()
            .map(|c| usize::from(self.push(c)))
            .sum()
    }

    /// Number of distinct target categories among the candidates.
    pub fn distinct_categories(&self) -> usize {
        self.items
            .iter()
            .filter_map(|c| c.category.target_id())
            .collect::<HashSet<_>>()
            .len()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LinkCandidate> {
        self.items.iter()
    }

    pub fn into_vec(self) -> Vec<LinkCandidate> {
        self.items
    }
}

impl FromIterator<LinkCandidate> for CandidateSet {
    fn from_iter<I: IntoIterator<Item = LinkCandidate>>(iter: I) -> Self {
        let mut set = CandidateSet::new();
        set.extend(iter);
        set
    }
}
