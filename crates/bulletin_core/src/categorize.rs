use crate::{LinkCandidate, LinkCategory, TargetCategory};

/// Candidates bucketed per target category, plus everything else.
///
/// Built once per discovery pass. Buckets follow catalog order and keep
/// discovery order inside each bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategorizedLinks {
    buckets: Vec<(String, Vec<LinkCandidate>)>,
    other: Vec<LinkCandidate>,
}

impl CategorizedLinks {
    pub fn get(&self, category_id: &str) -> &[LinkCandidate] {
        self.buckets
            .iter()
            .find(|(id, _)| id == category_id)
            .map(|(_, links)| links.as_slice())
            .unwrap_or(&[])
    }

    pub fn buckets(&self) -> impl Iterator<Item = (&str, &[LinkCandidate])> {
        self.buckets
            .iter()
            .map(|(id, links)| (id.as_str(), links.as_slice()))
    }

    pub fn other(&self) -> &[LinkCandidate] {
        &self.other
    }

    /// Ids of the categories with at least one candidate.
    pub fn found_categories(&self) -> Vec<&str> {
        self.buckets
            .iter()
            .filter(|(_, links)| !links.is_empty())
            .map(|(id, _)| id.as_str())
            .collect()
    }
}

/// Buckets candidates by their explicit category, falling back to keyword
/// matching on text and URL for candidates marked unknown.
pub fn categorize(catalog: &[TargetCategory], candidates: &[LinkCandidate]) -> CategorizedLinks {
    let mut buckets: Vec<(String, Vec<LinkCandidate>)> =
        catalog.iter().map(|c| (c.id.clone(), Vec::new())).collect();
    let mut other = Vec::new();

    for candidate in candidates {
        let explicit = match &candidate.category {
            LinkCategory::Target(id) => buckets.iter().position(|(b, _)| b == id),
            LinkCategory::Unknown => None,
        };
        let index = explicit.or_else(|| {
            catalog.iter().position(|c| c.matches_text(&candidate.text)).or_else(|| {
                catalog
                    .iter()
                    .position(|c| c.matches_url(&candidate.url))
            })
        });
        match index {
            Some(i) => buckets[i].1.push(candidate.clone()),
            None => other.push(candidate.clone()),
        }
    }

    CategorizedLinks { buckets, other }
}

/// One link chosen per category, plus the categories nothing was found for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub chosen: Vec<(String, LinkCandidate)>,
    pub missing: Vec<String>,
}

impl Selection {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty() && !self.chosen.is_empty()
    }
}

/// Picks the first-discovered candidate of every category.
pub fn select_targets(categorized: &CategorizedLinks) -> Selection {
    let mut chosen = Vec::new();
    let mut missing = Vec::new();
    for (id, links) in categorized.buckets() {
        match links.first() {
            Some(link) => chosen.push((id.to_string(), link.clone())),
            None => missing.push(id.to_string()),
        }
    }
    Selection { chosen, missing }
}
