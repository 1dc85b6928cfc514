use std::path::PathBuf;
use std::sync::Once;
use std::time::Duration;

use bulletin_core::{
    default_target_categories, update, DiscoveryMethod, DownloadResult, Effect, LinkCandidate,
    LinkCategory, Msg, Phase, PlannedDownload, RunOutcome, RunSettings, RunState, TableOutput,
};
use pretty_assertions::assert_eq;

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(bulletin_logging::initialize_for_tests);
}

const PAGE: &str = "https://site.example/web/boletines";
const MIRROR: &str = "https://site.example/boletines";
const FALLBACK_BANKS: &str = "https://site.example/documents/old-bancos.xlsx";
const FALLBACK_FIN: &str = "https://site.example/documents/old-financieras.xlsx";

fn settings() -> RunSettings {
    RunSettings {
        page_urls: vec![PAGE.to_string(), MIRROR.to_string()],
        categories: default_target_categories(),
        fallback_urls: vec![
            ("tabla_bancos".to_string(), FALLBACK_BANKS.to_string()),
            ("tabla_financieras".to_string(), FALLBACK_FIN.to_string()),
        ],
    }
}

fn candidate(url: &str, category: Option<&str>, text: &str) -> LinkCandidate {
    LinkCandidate {
        url: url.to_string(),
        text: text.to_string(),
        category: match category {
            Some(id) => LinkCategory::Target(id.to_string()),
            None => LinkCategory::Unknown,
        },
        method: DiscoveryMethod::SectionHeader,
    }
}

fn downloaded(category: &str, url: &str, file: &str) -> DownloadResult {
    DownloadResult {
        category: category.to_string(),
        source_url: url.to_string(),
        path: PathBuf::from("downloads").join(file),
        bytes: 4096,
        duration: Duration::from_millis(15),
        sha256: "00".repeat(32),
    }
}

fn table(category: &str, prefix: &str) -> TableOutput {
    TableOutput {
        category: category.to_string(),
        label: prefix.to_string(),
        sheet: "sheet".to_string(),
        path: PathBuf::from("downloads").join(format!("{prefix}BI.csv")),
        rows: 3,
    }
}

fn started() -> RunState {
    let (state, effects) = update(RunState::new(settings()), Msg::Start);
    assert_eq!(effects, vec![Effect::EstablishSession]);
    state
}

fn finish_report(effects: &[Effect]) -> bulletin_core::RunReport {
    effects
        .iter()
        .find_map(|e| match e {
            Effect::Finish(report) => Some(report.clone()),
            _ => None,
        })
        .expect("finish effect")
}

#[test]
fn discovered_links_are_downloaded_and_extracted_in_catalog_order() {
    init_logging();
    let (state, effects) = update(started(), Msg::SessionEstablished(true));
    assert_eq!(effects, vec![Effect::FetchPage { url: PAGE.to_string() }]);

    let (state, effects) = update(
        state,
        Msg::PageFetched {
            url: PAGE.to_string(),
            html: Some("<html></html>".to_string()),
        },
    );
    assert_eq!(
        effects,
        vec![Effect::DiscoverLinks {
            html: "<html></html>".to_string(),
            page_url: PAGE.to_string(),
        }]
    );

    let fin = "https://site.example/documents/2.1+Financieras.xlsx/abc";
    let banks = "https://site.example/documents/1.1+Bancos.xlsx/def";
    let (state, effects) = update(
        state,
        Msg::LinksDiscovered(vec![
            candidate(fin, Some("tabla_financieras"), "Tabla de Financieras"),
            candidate(banks, None, "Tabla de Bancos"),
        ]),
    );
    assert_eq!(
        effects,
        vec![Effect::Download(PlannedDownload {
            category: "tabla_bancos".to_string(),
            url: banks.to_string(),
            file_name: "tabla_de_bancos.xlsx".to_string(),
        })]
    );
    assert_eq!(state.phase(), Phase::Downloading);

    let first = downloaded("tabla_bancos", banks, "tabla_de_bancos.xlsx");
    let (state, effects) = update(
        state,
        Msg::DownloadFinished {
            category: "tabla_bancos".to_string(),
            result: Some(first.clone()),
        },
    );
    assert_eq!(
        effects,
        vec![Effect::ExtractTables {
            category: "tabla_bancos".to_string(),
            path: first.path.clone(),
        }]
    );

    let (state, effects) = update(
        state,
        Msg::TablesExtracted {
            category: "tabla_bancos".to_string(),
            tables: vec![table("tabla_bancos", "TC"), table("tabla_bancos", "CS")],
        },
    );
    assert_eq!(effects.len(), 2);
    assert_eq!(effects[0], Effect::CourtesyPause);
    assert!(matches!(&effects[1], Effect::Download(p) if p.url == fin));

    let second = downloaded("tabla_financieras", fin, "tabla_de_financieras.xlsx");
    let (state, _) = update(
        state,
        Msg::DownloadFinished {
            category: "tabla_financieras".to_string(),
            result: Some(second.clone()),
        },
    );
    let (state, effects) = update(
        state,
        Msg::TablesExtracted {
            category: "tabla_financieras".to_string(),
            tables: Vec::new(),
        },
    );

    assert_eq!(state.phase(), Phase::Done);
    assert_eq!(
        effects[0],
        Effect::SaveMetadata {
            files: vec![first, second]
        }
    );
    let report = finish_report(&effects);
    assert_eq!(report.outcome, RunOutcome::Success);
    assert_eq!(report.downloaded.len(), 2);
    assert_eq!(report.tables.len(), 2);
    assert!(!report.used_fallback);
}

#[test]
fn failed_session_goes_straight_to_fallback() {
    init_logging();
    let (state, effects) = update(started(), Msg::SessionEstablished(false));

    assert!(state.used_fallback());
    assert_eq!(
        effects,
        vec![Effect::Download(PlannedDownload {
            category: "tabla_bancos".to_string(),
            url: FALLBACK_BANKS.to_string(),
            file_name: "tabla_de_bancos.xlsx".to_string(),
        })]
    );
}

#[test]
fn mirrors_are_tried_before_falling_back() {
    init_logging();
    let (state, _) = update(started(), Msg::SessionEstablished(true));
    let (state, effects) = update(
        state,
        Msg::PageFetched {
            url: PAGE.to_string(),
            html: None,
        },
    );
    assert_eq!(effects, vec![Effect::FetchPage { url: MIRROR.to_string() }]);

    let (state, effects) = update(
        state,
        Msg::PageFetched {
            url: MIRROR.to_string(),
            html: None,
        },
    );
    assert!(state.used_fallback());
    assert!(matches!(&effects[0], Effect::Download(p) if p.url == FALLBACK_BANKS));
}

#[test]
fn incomplete_discovery_uses_fallback_for_every_category() {
    init_logging();
    let (state, _) = update(started(), Msg::SessionEstablished(true));
    let (state, _) = update(
        state,
        Msg::PageFetched {
            url: PAGE.to_string(),
            html: Some(String::new()),
        },
    );
    let (state, effects) = update(
        state,
        Msg::LinksDiscovered(vec![candidate(
            "https://site.example/x/Bancos.xlsx",
            Some("tabla_bancos"),
            "Tabla de Bancos",
        )]),
    );

    let report = state.report();
    assert!(report.used_fallback);
    assert_eq!(
        report.fallback_reason.as_deref(),
        Some("target links not found on the listing page")
    );
    assert!(matches!(&effects[0], Effect::Download(p) if p.url == FALLBACK_BANKS));
}

#[test]
fn one_terminal_failure_still_completes_as_partial_success() {
    init_logging();
    let (state, _) = update(started(), Msg::SessionEstablished(false));
    let (state, effects) = update(
        state,
        Msg::DownloadFinished {
            category: "tabla_bancos".to_string(),
            result: None,
        },
    );
    assert_eq!(effects[0], Effect::CourtesyPause);
    assert!(matches!(&effects[1], Effect::Download(p) if p.url == FALLBACK_FIN));

    let fin = downloaded("tabla_financieras", FALLBACK_FIN, "tabla_de_financieras.xlsx");
    let (state, _) = update(
        state,
        Msg::DownloadFinished {
            category: "tabla_financieras".to_string(),
            result: Some(fin),
        },
    );
    let (state, effects) = update(
        state,
        Msg::TablesExtracted {
            category: "tabla_financieras".to_string(),
            tables: Vec::new(),
        },
    );

    assert_eq!(state.phase(), Phase::Done);
    let report = finish_report(&effects);
    assert_eq!(report.outcome, RunOutcome::PartialSuccess);
    assert_eq!(report.missing, vec!["tabla_bancos".to_string()]);
    assert!(report.is_success());
}

#[test]
fn nothing_downloaded_fails_without_metadata() {
    init_logging();
    let (state, _) = update(started(), Msg::SessionEstablished(false));
    let (state, _) = update(
        state,
        Msg::DownloadFinished {
            category: "tabla_bancos".to_string(),
            result: None,
        },
    );
    let (state, effects) = update(
        state,
        Msg::DownloadFinished {
            category: "tabla_financieras".to_string(),
            result: None,
        },
    );

    assert_eq!(state.phase(), Phase::Failed);
    assert_eq!(effects.len(), 1);
    let report = finish_report(&effects);
    assert_eq!(report.outcome, RunOutcome::Failed);
    assert_eq!(report.missing.len(), 2);
}

#[test]
fn empty_fallback_map_fails_the_run() {
    init_logging();
    let mut settings = settings();
    settings.fallback_urls.clear();
    let (state, _) = update(RunState::new(settings), Msg::Start);
    let (state, effects) = update(state, Msg::SessionEstablished(false));

    assert_eq!(state.phase(), Phase::Failed);
    assert_eq!(finish_report(&effects).outcome, RunOutcome::Failed);
}

#[test]
fn cancellation_marks_pending_categories_missing() {
    init_logging();
    let (state, _) = update(started(), Msg::SessionEstablished(false));
    let (state, effects) = update(state, Msg::Cancelled);

    assert_eq!(state.phase(), Phase::Failed);
    let report = finish_report(&effects);
    assert!(report.cancelled);
    assert_eq!(
        report.missing,
        vec!["tabla_bancos".to_string(), "tabla_financieras".to_string()]
    );
}

#[test]
fn messages_out_of_phase_are_ignored() {
    init_logging();
    let state = RunState::new(settings());
    let (state, effects) = update(state, Msg::SessionEstablished(true));
    assert!(effects.is_empty());
    assert_eq!(state.phase(), Phase::Init);

    let (state, effects) = update(state, Msg::LinksDiscovered(Vec::new()));
    assert!(effects.is_empty());
    assert_eq!(state, RunState::new(settings()));
}
