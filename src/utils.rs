/// Renders a characteristic value as text.
///
/// Invalid UTF-8 is replaced with U+FFFD and trailing NUL padding is dropped,
/// so any byte sequence can be printed.
pub fn render_value(value: &[u8]) -> String {
    String::from_utf8_lossy(value)
        .trim_end_matches('\0')
        .to_string()
}

/// Parses a write payload: `hex:` followed by hex digits, or literal text
pub fn parse_payload(raw: &str) -> Result<Vec<u8>, String> {
    match raw.strip_prefix("hex:") {
        Some(digits) => {
            let digits: String = digits.chars().filter(|c| !c.is_whitespace()).collect();
            if digits.is_empty() {
                return Err("no hex digits after 'hex:'".to_string());
            }
            hex::decode(&digits).map_err(|e| e.to_string())
        }
        None => Ok(raw.as_bytes().to_vec()),
    }
}
