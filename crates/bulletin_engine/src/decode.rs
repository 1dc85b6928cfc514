use chardetng::EncodingDetector;
use encoding_rs::Encoding;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedPage {
    pub text: String,
    pub encoding_label: String,
    /// Some byte sequences were replaced with U+FFFD.
    pub lossy: bool,
}

/// Decodes page bytes: BOM, then `Content-Type` charset, then chardetng.
///
/// Never fails; undecodable sequences are replaced and flagged.
pub fn decode_page(bytes: &[u8], content_type: Option<&str>) -> DecodedPage {
    if let Some((encoding, _)) = Encoding::for_bom(bytes) {
        return decode_with(bytes, encoding);
    }

    if let Some(encoding) = content_type
        .and_then(charset_label)
        .and_then(|label| Encoding::for_label(label.as_bytes()))
    {
        return decode_with(bytes, encoding);
    }

    let mut detector = EncodingDetector::new();
    detector.feed(bytes, true);
    decode_with(bytes, detector.guess(None, true))
}

fn charset_label(content_type: &str) -> Option<String> {
    content_type.split(';').find_map(|part| {
        let (key, value) = part.split_once('=')?;
        key.trim()
            .eq_ignore_ascii_case("charset")
            .then(|| value.trim().trim_matches(['"', '\'']).to_string())
    })
}

fn decode_with(bytes: &[u8], encoding: &'static Encoding) -> DecodedPage {
    let (text, _, had_errors) = encoding.decode(bytes);
    DecodedPage {
        text: text.into_owned(),
        encoding_label: encoding.name().to_string(),
        lossy: had_errors,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_charset_wins_over_detection() {
        let bytes = b"Cr\xe9dito por Sector";
        let page = decode_page(bytes, Some("text/html; Charset=\"ISO-8859-1\""));
        assert_eq!(page.text, "Crédito por Sector");
        assert_eq!(page.encoding_label, "windows-1252");
        assert!(!page.lossy);
    }

    #[test]
    fn bom_is_honoured() {
        let page = decode_page(b"\xEF\xBB\xBFhola", Some("text/html; charset=latin1"));
        assert_eq!(page.text, "hola");
        assert_eq!(page.encoding_label, "UTF-8");
    }

    #[test]
    fn broken_utf8_is_flagged_not_rejected() {
        let page = decode_page(b"ok \xff\xfe end", Some("text/html; charset=utf-8"));
        assert!(page.lossy);
        assert!(page.text.starts_with("ok "));
    }
}
