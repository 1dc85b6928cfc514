/// Suffix used for tables extracted from a category the catalog does not know.
pub const UNKNOWN_TABLE_SUFFIX: &str = "XX";

/// One of the fixed document types a run tries to acquire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetCategory {
    /// Stable identifier, e.g. `tabla_bancos`.
    pub id: String,
    /// Section title as published on the listing page, e.g. `Tabla de Bancos`.
    pub section_title: String,
    /// Lowercase phrases that identify the category in link or context text.
    pub keywords: Vec<String>,
    /// Lowercase fragment that identifies the category inside a URL.
    pub url_hint: String,
    /// File stem for the raw download, e.g. `tabla_de_bancos`.
    pub download_basename: String,
    /// Suffix appended to extracted table names, e.g. `BI`.
    pub table_suffix: String,
}

impl TargetCategory {
    /// Returns true when `text` (any case) mentions one of this category's keywords.
    pub fn matches_text(&self, text: &str) -> bool {
        let lower = text.to_lowercase();
        lower.contains(&self.section_title.to_lowercase())
            || self.keywords.iter().any(|k| lower.contains(k.as_str()))
    }

    /// Returns true when `url` (any case) carries this category's URL hint.
    pub fn matches_url(&self, url: &str) -> bool {
        !self.url_hint.is_empty() && url.to_lowercase().contains(&self.url_hint)
    }
}

/// Worksheet-matching rule plus output naming convention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionTarget {
    pub label: String,
    pub prefix: String,
    /// Every keyword must appear in the normalized worksheet title.
    pub keywords: Vec<String>,
}

impl ExtractionTarget {
    pub fn new(label: &str, prefix: &str, keywords: &[&str]) -> Self {
        Self {
            label: label.to_string(),
            prefix: prefix.to_string(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
        }
    }

    /// `<prefix><suffix>.csv`, e.g. `TCBI.csv`.
    pub fn output_file_name(&self, suffix: &str) -> String {
        format!("{}{}.csv", self.prefix, suffix)
    }
}

fn category(
    id: &str,
    section_title: &str,
    keywords: &[&str],
    url_hint: &str,
    download_basename: &str,
    table_suffix: &str,
) -> TargetCategory {
    TargetCategory {
        id: id.to_string(),
        section_title: section_title.to_string(),
        keywords: keywords.iter().map(|k| k.to_string()).collect(),
        url_hint: url_hint.to_string(),
        download_basename: download_basename.to_string(),
        table_suffix: table_suffix.to_string(),
    }
}

/// Bank and financial-entity bulletins published by the central bank.
pub fn default_target_categories() -> Vec<TargetCategory> {
    vec![
        category(
            "tabla_bancos",
            "Tabla de Bancos",
            &["tabla de bancos", "bancos", "sistema bancario"],
            "banco",
            "tabla_de_bancos",
            "BI",
        ),
        category(
            "tabla_financieras",
            "Tabla de Financieras",
            &["tabla de financieras", "financieras", "entidades financieras"],
            "financier",
            "tabla_de_financieras",
            "FI",
        ),
    ]
}

pub fn default_extraction_targets() -> Vec<ExtractionTarget> {
    vec![
        ExtractionTarget::new("EEFF", "ER", &["eeff"]),
        ExtractionTarget::new("TC", "TC", &["tc"]),
        ExtractionTarget::new("Credito Sector", "CS", &["cred", "sector"]),
    ]
}

/// Previously published direct links (July 2025). These expire and may 403.
pub fn default_fallback_urls() -> Vec<(String, String)> {
    vec![
        (
            "tabla_bancos".to_string(),
            "https://www.bcp.gov.py/documents/20117/0/1.1+Tablas+Bolet%C3%ADn+Bancos+Jul25+%282%29+1.xlsx/c44c7087-46a1-4569-14be-32b782902f79?t=1756399940286".to_string(),
        ),
        (
            "tabla_financieras".to_string(),
            "https://www.bcp.gov.py/documents/20117/0/2.1+Tablas+Bolet%C3%ADn+Financieras+Jul25+%281%29+1.xlsx/64887684-ae2a-9000-e3ea-dd936598c6ef?t=1756399892013".to_string(),
        ),
    ]
}

/// Infers a category id from link text first, then from the URL.
///
/// Text keywords are checked for every category before any URL hint, so a
/// link titled "Tabla de Financieras" pointing at a URL that happens to
/// contain "banco" still lands in the financial-entity bucket.
pub fn infer_category<'a>(
    catalog: &'a [TargetCategory],
    text: &str,
    url: &str,
) -> Option<&'a TargetCategory> {
    catalog
        .iter()
        .find(|c| c.matches_text(text))
        .or_else(|| catalog.iter().find(|c| c.matches_url(url)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_keywords_win_over_url_hints() {
        let catalog = default_target_categories();
        let found = infer_category(
            &catalog,
            "Tabla de Financieras",
            "https://x/documents/banco-central/fin.xlsx",
        )
        .map(|c| c.id.as_str());
        assert_eq!(found, Some("tabla_financieras"));
    }

    #[test]
    fn url_hint_used_when_text_is_silent() {
        let catalog = default_target_categories();
        let found = infer_category(&catalog, "Descargar", "https://x/Bancos_Jul25.xlsx")
            .map(|c| c.id.as_str());
        assert_eq!(found, Some("tabla_bancos"));
        assert!(infer_category(&catalog, "Descargar", "https://x/otro.xlsx").is_none());
    }

    #[test]
    fn output_file_name_joins_prefix_and_suffix() {
        let target = ExtractionTarget::new("TC", "TC", &["tc"]);
        assert_eq!(target.output_file_name("BI"), "TCBI.csv");
    }
}
