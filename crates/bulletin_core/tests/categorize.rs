use bulletin_core::{
    categorize, default_target_categories, select_targets, CandidateSet, DiscoveryMethod,
    LinkCandidate, LinkCategory,
};
use pretty_assertions::assert_eq;

fn link(url: &str, text: &str, category: LinkCategory, method: DiscoveryMethod) -> LinkCandidate {
    LinkCandidate {
        url: url.to_string(),
        text: text.to_string(),
        category,
        method,
    }
}

#[test]
fn duplicate_urls_keep_first_occurrence_and_order() {
    let a = link(
        "https://s/a.xlsx",
        "Tabla de Bancos",
        LinkCategory::Target("tabla_bancos".into()),
        DiscoveryMethod::StructuredSection,
    );
    let b = link("https://s/b.xlsx", "b", LinkCategory::Unknown, DiscoveryMethod::DirectLink);
    let a_again = link("https://s/a.xlsx", "other", LinkCategory::Unknown, DiscoveryMethod::DirectLink);

    let set: CandidateSet = vec![a.clone(), b.clone(), a_again, b.clone()].into_iter().collect();

    assert_eq!(set.into_vec(), vec![a, b]);
}

#[test]
fn distinct_categories_ignore_unknown() {
    let mut set = CandidateSet::new();
    set.push(link(
        "https://s/1.xlsx",
        "",
        LinkCategory::Target("tabla_bancos".into()),
        DiscoveryMethod::SectionHeader,
    ));
    set.push(link(
        "https://s/2.xlsx",
        "",
        LinkCategory::Target("tabla_bancos".into()),
        DiscoveryMethod::SectionHeader,
    ));
    set.push(link("https://s/3.xlsx", "", LinkCategory::Unknown, DiscoveryMethod::DirectLink));
    assert_eq!(set.distinct_categories(), 1);
}

#[test]
fn unknown_candidates_fall_back_to_keywords_then_url() {
    let catalog = default_target_categories();
    let candidates = vec![
        link("https://s/x.xlsx", "Entidades Financieras", LinkCategory::Unknown, DiscoveryMethod::DirectLink),
        link("https://s/Bancos_Jul.xlsx", "Descargar", LinkCategory::Unknown, DiscoveryMethod::DirectLink),
        link("https://s/otro.xlsx", "Anexo", LinkCategory::Unknown, DiscoveryMethod::DirectLink),
    ];

    let categorized = categorize(&catalog, &candidates);

    assert_eq!(categorized.get("tabla_financieras")[0].url, "https://s/x.xlsx");
    assert_eq!(categorized.get("tabla_bancos")[0].url, "https://s/Bancos_Jul.xlsx");
    assert_eq!(categorized.other().len(), 1);
    assert_eq!(categorized.found_categories(), vec!["tabla_bancos", "tabla_financieras"]);
}

#[test]
fn selection_prefers_first_discovered_and_reports_missing() {
    let catalog = default_target_categories();
    let candidates = vec![
        link(
            "https://s/precise.xlsx",
            "Tabla de Bancos",
            LinkCategory::Target("tabla_bancos".into()),
            DiscoveryMethod::SectionHeader,
        ),
        link(
            "https://s/loose.xlsx",
            "bancos",
            LinkCategory::Target("tabla_bancos".into()),
            DiscoveryMethod::DirectLink,
        ),
    ];

    let selection = select_targets(&categorize(&catalog, &candidates));

    assert!(!selection.is_complete());
    assert_eq!(selection.chosen.len(), 1);
    assert_eq!(selection.chosen[0].1.url, "https://s/precise.xlsx");
    assert_eq!(selection.missing, vec!["tabla_financieras".to_string()]);
}
