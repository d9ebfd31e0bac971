/// Parse a coordinate or height cell. Accepts a decimal comma and surrounding
/// whitespace; rejects empty cells and non-finite values.
pub fn parse_number(s: &str) -> Option<f64> {
    let t = s.trim();
    if t.is_empty() {
        return None;
    }
    let v: f64 = if t.contains(',') {
        t.replace(',', ".").parse().ok()?
    } else {
        t.parse().ok()?
    };
    v.is_finite().then_some(v)
}
