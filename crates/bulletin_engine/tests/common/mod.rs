#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use bulletin_engine::{
    ClientSettings, PipelineConfig, ReqwestClientFactory, Session, SessionConfig,
};
use bulletin_logging::{CaptureSink, LogScope};
use rust_xlsxwriter::Workbook;
use url::Url;

pub const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

pub fn capture(name: &'static str) -> (LogScope, Arc<CaptureSink>) {
    let sink = Arc::new(CaptureSink::new());
    (LogScope::new(name, sink.clone()), sink)
}

pub fn client_settings() -> ClientSettings {
    ClientSettings {
        connect_timeout: Duration::from_secs(5),
        redirect_limit: 5,
    }
}

pub fn session_config(site: &str) -> SessionConfig {
    SessionConfig {
        site_root: Url::parse(site).unwrap(),
        probe_timeout: Duration::from_secs(5),
        establish_attempts: 3,
        establish_step: Duration::ZERO,
    }
}

pub fn plain_session(site: &str, log: &LogScope) -> Session {
    let factory = Arc::new(ReqwestClientFactory::new(client_settings(), None));
    Session::new(session_config(site), factory, log.child("session")).unwrap()
}

/// Site defaults aimed at a mock server, with every wait removed.
pub fn test_config(site: &str, download_dir: &Path) -> PipelineConfig {
    let mut config = PipelineConfig::for_site(site);
    config.download_dir = download_dir.to_path_buf();
    config.fallback_urls = Vec::new();
    config.courtesy_pause = Duration::ZERO;
    config.fetch.backoff_base = Duration::ZERO;
    config.fetch.probe_timeout = Duration::from_secs(5);
    config.fetch.page_timeout = Duration::from_secs(5);
    config.fetch.download_timeout = Duration::from_secs(5);
    config.session.establish_step = Duration::ZERO;
    config.download.min_plausible_bytes = 0;
    config.clock = Arc::new(|| "2025-08-01T12:00:00+00:00".to_string());
    config
}

/// Builds an xlsx in memory. Cells that parse as numbers are written as numbers,
/// empty strings are left blank. `origin` is the (row, col) of the first cell.
pub fn workbook_bytes(sheets: &[(&str, (u32, u16), Vec<Vec<&str>>)]) -> Vec<u8> {
    let mut workbook = Workbook::new();
    for (name, (row0, col0), rows) in sheets {
        let sheet = workbook.add_worksheet();
        sheet.set_name(*name).unwrap();
        for (r, row) in rows.iter().enumerate() {
            for (c, value) in row.iter().enumerate() {
                let (r, c) = (row0 + r as u32, col0 + c as u16);
                if value.is_empty() {
                    continue;
                }
                match value.parse::<f64>() {
                    Ok(number) => sheet.write_number(r, c, number).unwrap(),
                    Err(_) => sheet.write_string(r, c, *value).unwrap(),
                };
            }
        }
    }
    workbook.save_to_buffer().unwrap()
}

/// A bulletin with all three sheets the default catalog looks for.
pub fn bulletin_workbook(entity: &str) -> Vec<u8> {
    workbook_bytes(&[
        (
            "1. EEFF",
            (0, 0),
            vec![vec!["Entidad", "Activo"], vec![entity, "1500000"]],
        ),
        (
            "3. TC",
            (0, 0),
            vec![vec!["Moneda", "Cierre"], vec!["USD", "7300.5"]],
        ),
        (
            "5. Crédito por Sector",
            (0, 0),
            vec![vec!["Sector", "Monto"], vec!["Agricultura", "42"]],
        ),
    ])
}
