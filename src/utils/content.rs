//! MIME-typed broadcast content handling for the taproot era.

/// Problems with a broadcast's mime type / content pair. The strings feed
/// straight into the validation reason list.
pub fn check_content(mime_type: &str, text: Option<&str>) -> Vec<String> {
    let mut problems = Vec::new();

    let mime_type = if mime_type.is_empty() {
        "text/plain"
    } else {
        mime_type
    };

    if !is_valid_mime_type(mime_type) {
        problems.push(format!("invalid mime type: {mime_type}"));
        return problems;
    }

    if !mime_type.starts_with("text/") {
        // Binary contents travel hex-encoded above the codec
        match text {
            Some(text) if hex::decode(text).is_err() => {
                problems.push("could not decode content".to_string());
            }
            _ => {}
        }
    }

    problems
}

/// Content as it goes on the wire: UTF-8 for text mime types, raw bytes
/// (hex-decoded) for everything else.
pub fn content_to_bytes(text: &str, mime_type: &str) -> Result<Vec<u8>, String> {
    if mime_type.is_empty() || mime_type.starts_with("text/") {
        Ok(text.as_bytes().to_vec())
    } else {
        hex::decode(text).map_err(|_| "could not decode content".to_string())
    }
}

/// Inverse of [`content_to_bytes`]. Fails only for text mime types whose
/// bytes are not valid UTF-8.
pub fn bytes_to_content(bytes: &[u8], mime_type: &str) -> Result<String, String> {
    if mime_type.is_empty() || mime_type.starts_with("text/") {
        String::from_utf8(bytes.to_vec()).map_err(|_| "invalid utf-8 content".to_string())
    } else {
        Ok(hex::encode(bytes))
    }
}

/// Minimal syntactic mime check: `type/subtype`, printable ASCII, no
/// whitespace.
fn is_valid_mime_type(mime_type: &str) -> bool {
    let Some((main, sub)) = mime_type.split_once('/') else {
        return false;
    };
    let token_ok = |token: &str| {
        !token.is_empty()
            && token
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '+' | '.'))
    };
    token_ok(main) && token_ok(sub)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_content_defaults_to_text_plain() {
        assert!(check_content("", Some("hello")).is_empty());
        assert!(check_content("text/plain", Some("hello")).is_empty());
    }

    #[test]
    fn test_check_content_rejects_malformed_mime() {
        let problems = check_content("not a mime", Some("x"));
        assert_eq!(problems, vec!["invalid mime type: not a mime".to_string()]);
    }

    #[test]
    fn test_check_content_binary_requires_hex() {
        assert!(check_content("image/png", Some("89504e47")).is_empty());
        let problems = check_content("image/png", Some("zzzz"));
        assert_eq!(problems, vec!["could not decode content".to_string()]);
    }

    #[test]
    fn test_content_round_trip_text() {
        let bytes = content_to_bytes("héllo", "text/plain").unwrap();
        assert_eq!(bytes_to_content(&bytes, "text/plain").unwrap(), "héllo");
    }

    #[test]
    fn test_content_round_trip_binary() {
        let bytes = content_to_bytes("cafebabe", "application/octet-stream").unwrap();
        assert_eq!(bytes, vec![0xca, 0xfe, 0xba, 0xbe]);
        assert_eq!(
            bytes_to_content(&bytes, "application/octet-stream").unwrap(),
            "cafebabe"
        );
    }

    #[test]
    fn test_bytes_to_content_invalid_utf8() {
        assert!(bytes_to_content(&[0xff, 0xfe], "text/plain").is_err());
    }
}
