use serde::{Deserialize, Serialize};
use std::fmt;

/// A point of the phase plane.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn x(&self) -> f64 {
        self.x
    }

    pub fn y(&self) -> f64 {
        self.y
    }

    /// Euclidean distance to `other`.
    pub fn distance(&self, other: &Point) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    pub fn into_tuple(self) -> (f64, f64) {
        (self.x, self.y)
    }

    /// Parses the textual form `(x, y)` found somewhere inside `text`.
    ///
    /// Each coordinate is an optional run of digits followed by an optional
    /// `.` and at least one fractional digit; signs and exponents are not
    /// accepted. Whitespace is allowed around both coordinates. Returns `None`
    /// unless the string holds exactly one such pair.
    pub fn try_parse(text: &str) -> Option<Point> {
        let bytes = text.as_bytes();
        let mut found = None;
        let mut matches = 0usize;
        let mut pos = 0usize;

        while pos < bytes.len() {
            if bytes[pos] == b'(' {
                if let Some((end, x, y)) = match_pair(bytes, pos) {
                    matches += 1;
                    found = Some((x, y));
                    pos = end;
                    continue;
                }
            }
            pos += 1;
        }

        if matches != 1 {
            return None;
        }
        let (x, y) = found?;
        Some(Point::new(x.parse().ok()?, y.parse().ok()?))
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Point({}, {})", self.x, self.y)
    }
}

impl From<(f64, f64)> for Point {
    fn from((x, y): (f64, f64)) -> Self {
        Point::new(x, y)
    }
}

impl From<Point> for (f64, f64) {
    fn from(point: Point) -> Self {
        point.into_tuple()
    }
}

/// Matches `( number , number )` starting at the opening parenthesis.
/// Returns the index one past the closing parenthesis and both number slices.
fn match_pair(bytes: &[u8], open: usize) -> Option<(usize, &str, &str)> {
    let mut pos = skip_spaces(bytes, open + 1);
    let (x_end, x) = match_number(bytes, pos);
    pos = skip_spaces(bytes, x_end);
    if bytes.get(pos) != Some(&b',') {
        return None;
    }
    pos = skip_spaces(bytes, pos + 1);
    let (y_end, y) = match_number(bytes, pos);
    pos = skip_spaces(bytes, y_end);
    if bytes.get(pos) != Some(&b')') {
        return None;
    }
    Some((pos + 1, x, y))
}

fn skip_spaces(bytes: &[u8], mut pos: usize) -> usize {
    while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
        pos += 1;
    }
    pos
}

/// Greedy `[0-9]*(\.[0-9]+)?`; the match may be empty.
fn match_number(bytes: &[u8], start: usize) -> (usize, &str) {
    let mut pos = start;
    while pos < bytes.len() && bytes[pos].is_ascii_digit() {
        pos += 1;
    }
    if bytes.get(pos) == Some(&b'.') && bytes.get(pos + 1).is_some_and(u8::is_ascii_digit) {
        pos += 1;
        while pos < bytes.len() && bytes[pos].is_ascii_digit() {
            pos += 1;
        }
    }
    // Only ASCII bytes were consumed, so the slice lies on char boundaries.
    let text = std::str::from_utf8(&bytes[start..pos]).unwrap_or("");
    (pos, text)
}

#[cfg(test)]
mod tests {
    use super::Point;

    #[test]
    fn distance_is_euclidean() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(3.0, 4.0);
        assert_eq!(a.distance(&b), 5.0);
        assert_eq!(b.distance(&a), 5.0);
        assert_eq!(a.distance(&a), 0.0);
    }

    #[test]
    fn display_uses_canonical_form() {
        assert_eq!(Point::new(1.5, 2.0).to_string(), "Point(1.5, 2)");
    }

    #[test]
    fn tuple_decomposition_keeps_order() {
        let (x, y) = Point::new(0.25, 7.0).into();
        assert_eq!((x, y), (0.25, 7.0));
        assert_eq!(Point::from((1.0, 2.0)), Point::new(1.0, 2.0));
    }

    #[test]
    fn try_parse_accepts_flexible_whitespace_and_fractions() {
        assert_eq!(Point::try_parse("(1, 2)"), Some(Point::new(1.0, 2.0)));
        assert_eq!(Point::try_parse("(  0.5 ,3.25  )"), Some(Point::new(0.5, 3.25)));
        assert_eq!(Point::try_parse("(.5,.75)"), Some(Point::new(0.5, 0.75)));
        assert_eq!(Point::try_parse("start at (0.1, 4) please"), Some(Point::new(0.1, 4.0)));
    }

    #[test]
    fn try_parse_round_trips_display() {
        for &(x, y) in &[(0.0, 0.0), (0.123456, 7.5), (12.0, 0.000001), (3.141592, 2.718281)] {
            let point = Point::new(x, y);
            let parsed = Point::try_parse(&point.to_string()).expect("display form should parse");
            assert!((parsed.x - x).abs() < 1e-12, "x mismatch for {point}");
            assert!((parsed.y - y).abs() < 1e-12, "y mismatch for {point}");
        }
    }

    #[test]
    fn try_parse_rejects_malformed_text() {
        assert_eq!(Point::try_parse("(1,2"), None);
        assert_eq!(Point::try_parse("hello"), None);
        assert_eq!(Point::try_parse(""), None);
        assert_eq!(Point::try_parse("(-1, 2)"), None);
        assert_eq!(Point::try_parse("(1., 2)"), None);
        assert_eq!(Point::try_parse("(1e3, 2)"), None);
    }

    #[test]
    fn try_parse_rejects_empty_coordinates() {
        assert_eq!(Point::try_parse("( , )"), None);
        assert_eq!(Point::try_parse("(1, )"), None);
    }

    #[test]
    fn try_parse_rejects_multiple_pairs() {
        assert_eq!(Point::try_parse("(1, 2) (3, 4)"), None);
    }
}
