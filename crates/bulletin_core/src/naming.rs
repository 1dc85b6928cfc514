use url::Url;

const SPREADSHEET_EXTENSIONS: [&str; 2] = [".xlsx", ".xls"];
const DEFAULT_EXTENSION: &str = ".xlsx";

/// True when `href` mentions a spreadsheet extension anywhere.
pub fn looks_like_spreadsheet(href: &str) -> bool {
    href.to_ascii_lowercase().contains(".xls")
}

/// Spreadsheet extension for a download URL, `.xlsx` when none can be read.
///
/// Document stores often append an id segment after the file name
/// (`/…/Bancos.xlsx/c44c…?t=…`), so every path segment is inspected, last first.
pub fn spreadsheet_extension(url: &str) -> &'static str {
    let Ok(parsed) = Url::parse(url) else {
        return DEFAULT_EXTENSION;
    };
    let Some(segments) = parsed.path_segments() else {
        return DEFAULT_EXTENSION;
    };
    let segments: Vec<String> = segments.map(|s| s.to_ascii_lowercase()).collect();
    for segment in segments.iter().rev() {
        for ext in SPREADSHEET_EXTENSIONS {
            if segment.ends_with(ext) {
                return ext;
            }
        }
    }
    DEFAULT_EXTENSION
}

/// `<basename><ext>` for a raw download.
pub fn download_file_name(basename: &str, url: &str) -> String {
    format!("{basename}{}", spreadsheet_extension(url))
}
