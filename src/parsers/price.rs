use once_cell::sync::Lazy;
use regex::Regex;

static RUPEE_ABBREVIATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\brs\.")
        .expect("Invalid rupee abbreviation regex")
});

static NON_NUMERIC: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[^\d.\-]")
        .expect("Invalid price cleanup regex")
});

/// Convert raw price text into a single number.
///
/// Everything but digits, `.` and `-` is dropped, so currency glyphs and
/// mis-decoded bytes (`â‚¹`) disappear. A hyphen marks a range and the mean
/// of its parts is returned: `"₹0-₹803"` gives `401.5`. Returns `None` when
/// nothing numeric is left; `Some(0.0)` is a real zero, not a failure.
pub fn normalize_price(raw: &str) -> Option<f64> {
    let without_abbreviation = RUPEE_ABBREVIATION.replace_all(raw, "");
    let cleaned = NON_NUMERIC.replace_all(&without_abbreviation, "");

    if cleaned.contains('-') {
        let parts = cleaned
            .split('-')
            .filter(|part| !part.is_empty())
            .map(parse_number)
            .collect::<Option<Vec<f64>>>()?;

        if parts.is_empty() {
            return None;
        }
        return Some(parts.iter().sum::<f64>() / parts.len() as f64);
    }

    parse_number(&cleaned)
}

// Sentence-ending dots ("₹35 per strip.") survive the cleanup.
fn parse_number(part: &str) -> Option<f64> {
    let trimmed = part.trim_end_matches('.');
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|value| value.is_finite())
}
