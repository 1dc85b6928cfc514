use bulletin_core::{
    infer_category, looks_like_spreadsheet, CandidateSet, DiscoveryMethod, LinkCandidate,
    LinkCategory, TargetCategory,
};
use bulletin_logging::{bulletin_debug, bulletin_error, bulletin_info, LogScope};
use ego_tree::NodeRef;
use regex::Regex;
use scraper::node::Node;
use scraper::{ElementRef, Html, Selector};
use url::Url;

/// Site layout state shared by every tier during one discovery pass.
pub struct DiscoveryContext<'a> {
    pub base: &'a Url,
    pub categories: &'a [TargetCategory],
    download_text: Regex,
    section_header: Option<Regex>,
}

impl<'a> DiscoveryContext<'a> {
    pub fn new(base: &'a Url, categories: &'a [TargetCategory]) -> Result<Self, regex::Error> {
        let download_text = Regex::new(r"(?i)\b(descargar|download)\b")?;
        let titles: Vec<String> = categories
            .iter()
            .filter(|c| !c.section_title.trim().is_empty())
            .map(|c| {
                c.section_title
                    .split_whitespace()
                    .map(regex::escape)
                    .collect::<Vec<_>>()
                    .join(r"\s+")
            })
            .collect();
        let section_header = if titles.is_empty() {
            None
        } else {
            Some(Regex::new(&format!(r"(?i)\b({})\b", titles.join("|")))?)
        };
        Ok(Self {
            base,
            categories,
            download_text,
            section_header,
        })
    }

    /// Absolute URL for `href`, or `None` for fragments, scripts and garbage.
    pub fn resolve(&self, href: &str) -> Option<String> {
        let trimmed = href.trim();
        let lower = trimmed.to_ascii_lowercase();
        if trimmed.is_empty() || lower.starts_with('#') || lower.starts_with("javascript:") {
            return None;
        }
        if let Ok(url) = Url::parse(trimmed) {
            return Some(url.to_string());
        }
        self.base.join(trimmed).ok().map(|url| url.to_string())
    }

    pub fn is_download_text(&self, text: &str) -> bool {
        self.download_text.is_match(text)
    }

    /// Category whose section title appears in `text`, if any.
    pub fn header_category(&self, text: &str) -> Option<&'a TargetCategory> {
        let found = self.section_header.as_ref()?.find(text)?;
        let matched = collapse_whitespace(found.as_str()).to_lowercase();
        self.categories
            .iter()
            .find(|c| collapse_whitespace(&c.section_title).to_lowercase() == matched)
    }

    fn infer(&self, text: &str, url: &str) -> LinkCategory {
        infer_category(self.categories, text, url)
            .map(|c| LinkCategory::Target(c.id.clone()))
            .unwrap_or(LinkCategory::Unknown)
    }
}

/// One heuristic stage of the discovery cascade.
pub trait CandidateExtractor: Send + Sync {
    fn method(&self) -> DiscoveryMethod;

    fn extract(&self, document: &Html, ctx: &DiscoveryContext<'_>) -> Vec<LinkCandidate>;
}

/// Runs the tiers in order, stopping once every category has a candidate.
pub struct LinkDiscovery {
    tiers: Vec<Box<dyn CandidateExtractor>>,
    log: LogScope,
}

impl LinkDiscovery {
    pub fn new(log: LogScope) -> Self {
        Self::with_tiers(default_tiers(), log)
    }

    pub fn with_tiers(tiers: Vec<Box<dyn CandidateExtractor>>, log: LogScope) -> Self {
        Self { tiers, log }
    }

    pub fn discover(
        &self,
        html: &str,
        base: &Url,
        categories: &[TargetCategory],
    ) -> Vec<LinkCandidate> {
        let ctx = match DiscoveryContext::new(base, categories) {
            Ok(ctx) => ctx,
            Err(err) => {
                bulletin_error!(self.log, "could not build discovery patterns: {err}");
                return Vec::new();
            }
        };
        let document = Html::parse_document(html);
        let wanted = categories.len().max(1);
        let mut found = CandidateSet::new();

        for (index, tier) in self.tiers.iter().enumerate() {
            if index > 0 && found.distinct_categories() >= wanted {
                break;
            }
            let added = found.extend(tier.extract(&document, &ctx));
            bulletin_debug!(
                self.log,
                "tier {} ({}) added {added} candidate(s)",
                index + 1,
                tier.method().tag()
            );
        }

        bulletin_info!(
            self.log,
            "discovered {} candidate link(s) covering {} categories",
            found.len(),
            found.distinct_categories()
        );
        found.into_vec()
    }
}

pub fn default_tiers() -> Vec<Box<dyn CandidateExtractor>> {
    vec![
        Box::new(StructuredSectionTier::new()),
        Box::new(SectionHeaderTier::new(5)),
        Box::new(ButtonContextTier::new(3)),
        Box::new(DirectLinkTier::new()),
    ]
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn element_text(element: ElementRef<'_>) -> String {
    collapse_whitespace(&element.text().collect::<String>())
}

fn anchors<'d>(document: &'d Html, selector: &'d Option<Selector>) -> Vec<ElementRef<'d>> {
    match selector {
        Some(selector) => document.select(selector).collect(),
        None => Vec::new(),
    }
}

/// Document-listing items: `div.list_item.section-item` with a title and a link block.
pub struct StructuredSectionTier {
    item: Option<Selector>,
    title: Option<Selector>,
    link: Option<Selector>,
}

impl StructuredSectionTier {
    pub fn new() -> Self {
        Self {
            item: Selector::parse("div.list_item.section-item").ok(),
            title: Selector::parse(".item_title").ok(),
            link: Selector::parse("div.item_links a[href]").ok(),
        }
    }
}

impl Default for StructuredSectionTier {
    fn default() -> Self {
        Self::new()
    }
}

impl CandidateExtractor for StructuredSectionTier {
    fn method(&self) -> DiscoveryMethod {
        DiscoveryMethod::StructuredSection
    }

    fn extract(&self, document: &Html, ctx: &DiscoveryContext<'_>) -> Vec<LinkCandidate> {
        let (Some(title_sel), Some(link_sel)) = (&self.title, &self.link) else {
            return Vec::new();
        };
        let mut out = Vec::new();
        for item in anchors(document, &self.item) {
            let Some(link) = item.select(link_sel).next() else {
                continue;
            };
            let Some(href) = link.value().attr("href") else {
                continue;
            };
            if !looks_like_spreadsheet(href) {
                continue;
            }
            let Some(url) = ctx.resolve(href) else {
                continue;
            };
            let title = item
                .select(title_sel)
                .next()
                .map(element_text)
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| element_text(link));
            out.push(LinkCandidate {
                category: ctx.infer(&title, &url),
                url,
                text: title,
                method: DiscoveryMethod::StructuredSection,
            });
        }
        out
    }
}

/// Section title text followed, within a few ancestor levels, by a download link.
pub struct SectionHeaderTier {
    max_depth: usize,
    link: Option<Selector>,
}

impl SectionHeaderTier {
    pub fn new(max_depth: usize) -> Self {
        Self {
            max_depth,
            link: Selector::parse("a[href]").ok(),
        }
    }

    fn find_download_link<'d>(
        &self,
        header: NodeRef<'d, Node>,
        ctx: &DiscoveryContext<'_>,
    ) -> Option<String> {
        let selector = self.link.as_ref()?;
        let mut level = header.parent();
        for _ in 0..self.max_depth {
            let container = ElementRef::wrap(level?)?;
            let hit = container.select(selector).find_map(|anchor| {
                let href = anchor.value().attr("href")?;
                (ctx.is_download_text(&element_text(anchor)) && looks_like_spreadsheet(href))
                    .then(|| ctx.resolve(href))
                    .flatten()
            });
            if hit.is_some() {
                return hit;
            }
            level = container.parent();
        }
        None
    }
}

impl CandidateExtractor for SectionHeaderTier {
    fn method(&self) -> DiscoveryMethod {
        DiscoveryMethod::SectionHeader
    }

    fn extract(&self, document: &Html, ctx: &DiscoveryContext<'_>) -> Vec<LinkCandidate> {
        let mut out = Vec::new();
        for node in document.root_element().descendants() {
            let Node::Text(text) = node.value() else {
                continue;
            };
            let Some(header) = node.parent() else {
                continue;
            };
            let skip = ElementRef::wrap(header)
                .map(|el| matches!(el.value().name(), "script" | "style" | "title"))
                .unwrap_or(true);
            if skip {
                continue;
            }
            let Some(category) = ctx.header_category(text) else {
                continue;
            };
            if let Some(url) = self.find_download_link(header, ctx) {
                out.push(LinkCandidate {
                    url,
                    text: category.section_title.clone(),
                    category: LinkCategory::Target(category.id.clone()),
                    method: DiscoveryMethod::SectionHeader,
                });
            }
        }
        out
    }
}

/// Download buttons classified by the text around them.
pub struct ButtonContextTier {
    max_depth: usize,
    link: Option<Selector>,
}

impl ButtonContextTier {
    pub fn new(max_depth: usize) -> Self {
        Self {
            max_depth,
            link: Selector::parse("a[href]").ok(),
        }
    }

    fn context_category<'c>(
        &self,
        anchor: ElementRef<'_>,
        ctx: &DiscoveryContext<'c>,
    ) -> Option<&'c TargetCategory> {
        let mut level = anchor.parent();
        for _ in 0..self.max_depth {
            let container = ElementRef::wrap(level?)?;
            let context = element_text(container);
            if let Some(category) = ctx.categories.iter().find(|c| c.matches_text(&context)) {
                return Some(category);
            }
            level = container.parent();
        }
        None
    }
}

impl CandidateExtractor for ButtonContextTier {
    fn method(&self) -> DiscoveryMethod {
        DiscoveryMethod::ButtonContext
    }

    fn extract(&self, document: &Html, ctx: &DiscoveryContext<'_>) -> Vec<LinkCandidate> {
        let mut out = Vec::new();
        for anchor in anchors(document, &self.link) {
            let Some(href) = anchor.value().attr("href") else {
                continue;
            };
            if !ctx.is_download_text(&element_text(anchor)) || !looks_like_spreadsheet(href) {
                continue;
            }
            let (Some(category), Some(url)) = (self.context_category(anchor, ctx), ctx.resolve(href))
            else {
                continue;
            };
            out.push(LinkCandidate {
                url,
                text: category.section_title.clone(),
                category: LinkCategory::Target(category.id.clone()),
                method: DiscoveryMethod::ButtonContext,
            });
        }
        out
    }
}

/// Every spreadsheet link on the page.
pub struct DirectLinkTier {
    link: Option<Selector>,
}

impl DirectLinkTier {
    pub fn new() -> Self {
        Self {
            link: Selector::parse("a[href]").ok(),
        }
    }
}

impl Default for DirectLinkTier {
    fn default() -> Self {
        Self::new()
    }
}

impl CandidateExtractor for DirectLinkTier {
    fn method(&self) -> DiscoveryMethod {
        DiscoveryMethod::DirectLink
    }

    fn extract(&self, document: &Html, ctx: &DiscoveryContext<'_>) -> Vec<LinkCandidate> {
        anchors(document, &self.link)
            .into_iter()
            .filter_map(|anchor| {
                let href = anchor.value().attr("href")?;
                if !looks_like_spreadsheet(href) {
                    return None;
                }
                let url = ctx.resolve(href)?;
                let text = element_text(anchor);
                Some(LinkCandidate {
                    category: ctx.infer(&text, &url),
                    url,
                    text,
                    method: DiscoveryMethod::DirectLink,
                })
            })
            .collect()
    }
}
