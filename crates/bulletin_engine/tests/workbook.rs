mod common;

use std::fs;

use bulletin_core::{default_extraction_targets, ExtractionTarget};
use bulletin_engine::{find_sheet, ExtractError, WorkbookExtractor};
use bulletin_logging::Level;
use pretty_assertions::assert_eq;
use tempfile::TempDir;

use common::{bulletin_workbook, capture, workbook_bytes};

fn write_workbook(dir: &TempDir, name: &str, bytes: Vec<u8>) -> std::path::PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, bytes).unwrap();
    path
}

#[test]
fn keyword_match_ignores_case_accents_and_punctuation() {
    let names = vec![
        "1. Summary".to_string(),
        "5. Credit by Sector".to_string(),
    ];
    assert_eq!(find_sheet(&names, &["credit", "sector"]), Some("5. Credit by Sector"));

    let names = vec!["Índice".to_string(), "5 - CRÉDITO / Sector (Gs.)".to_string()];
    assert_eq!(find_sheet(&names, &["sector", "cred"]), Some("5 - CRÉDITO / Sector (Gs.)"));
}

#[test]
fn writes_one_csv_per_target_next_to_the_workbook() {
    let temp = TempDir::new().unwrap();
    let path = write_workbook(&temp, "tabla_de_bancos.xlsx", bulletin_workbook("Banco Uno"));
    let (log, _) = capture("test");
    let extractor = WorkbookExtractor::new(default_extraction_targets(), log);

    let outputs = extractor.extract(&path, "tabla_bancos", "BI").unwrap();

    assert_eq!(
        outputs
            .iter()
            .map(|o| (o.label.as_str(), o.sheet.as_str(), o.rows))
            .collect::<Vec<_>>(),
        vec![
            ("EEFF", "1. EEFF", 2),
            ("TC", "3. TC", 2),
            ("Credito Sector", "5. Crédito por Sector", 2),
        ]
    );
    assert_eq!(
        fs::read_to_string(temp.path().join("ERBI.csv")).unwrap(),
        "Entidad,Activo\r\nBanco Uno,1500000\r\n"
    );
    assert_eq!(
        fs::read_to_string(temp.path().join("TCBI.csv")).unwrap(),
        "Moneda,Cierre\r\nUSD,7300.5\r\n"
    );
    assert_eq!(
        fs::read_to_string(temp.path().join("CSBI.csv")).unwrap(),
        "Sector,Monto\r\nAgricultura,42\r\n"
    );
}

#[test]
fn rows_are_aligned_to_the_first_cell() {
    let temp = TempDir::new().unwrap();
    let bytes = workbook_bytes(&[(
        "TC",
        (2, 1),
        vec![vec!["Moneda", "", "Cierre"], vec!["EUR", "x", "8000"]],
    )]);
    let path = write_workbook(&temp, "tc.xlsx", bytes);
    let (log, _) = capture("test");
    let extractor =
        WorkbookExtractor::new(vec![ExtractionTarget::new("TC", "TC", &["tc"])], log);

    extractor.extract(&path, "tabla_financieras", "FI").unwrap();

    assert_eq!(
        fs::read_to_string(temp.path().join("TCFI.csv")).unwrap(),
        ",,,\r\n,,,\r\n,Moneda,,Cierre\r\n,EUR,x,8000\r\n"
    );
}

#[test]
fn missing_sheet_is_skipped_with_a_warning() {
    let temp = TempDir::new().unwrap();
    let bytes = workbook_bytes(&[
        ("EEFF", (0, 0), vec![vec!["a"]]),
        ("Credito Sector", (0, 0), vec![vec!["b"]]),
    ]);
    let path = write_workbook(&temp, "tabla_de_bancos.xlsx", bytes);
    let (log, sink) = capture("test");
    let extractor = WorkbookExtractor::new(default_extraction_targets(), log);

    let outputs = extractor.extract(&path, "tabla_bancos", "BI").unwrap();

    let labels: Vec<&str> = outputs.iter().map(|o| o.label.as_str()).collect();
    assert_eq!(labels, vec!["EEFF", "Credito Sector"]);
    assert!(!temp.path().join("TCBI.csv").exists());
    assert!(sink
        .messages_at(Level::Warn)
        .iter()
        .any(|m| m.contains("no worksheet") && m.contains("TC")));
}

#[test]
fn extraction_is_byte_for_byte_repeatable() {
    let temp = TempDir::new().unwrap();
    let path = write_workbook(&temp, "tabla_de_bancos.xlsx", bulletin_workbook("Banco, S.A."));
    let (log, _) = capture("test");
    let extractor = WorkbookExtractor::new(default_extraction_targets(), log);

    extractor.extract(&path, "tabla_bancos", "BI").unwrap();
    let first: Vec<Vec<u8>> = ["ERBI.csv", "TCBI.csv", "CSBI.csv"]
        .iter()
        .map(|name| fs::read(temp.path().join(name)).unwrap())
        .collect();
    extractor.extract(&path, "tabla_bancos", "BI").unwrap();
    let second: Vec<Vec<u8>> = ["ERBI.csv", "TCBI.csv", "CSBI.csv"]
        .iter()
        .map(|name| fs::read(temp.path().join(name)).unwrap())
        .collect();

    assert_eq!(first, second);
    assert!(String::from_utf8_lossy(&first[0]).contains("\"Banco, S.A.\""));
}

#[test]
fn unreadable_workbook_is_an_open_error() {
    let temp = TempDir::new().unwrap();
    let path = write_workbook(&temp, "broken.xlsx", b"<html>blocked</html>".to_vec());
    let (log, _) = capture("test");
    let extractor = WorkbookExtractor::new(default_extraction_targets(), log);

    let err = extractor.tables(&path).unwrap_err();
    assert!(matches!(err, ExtractError::Open { .. }), "{err}");
}
