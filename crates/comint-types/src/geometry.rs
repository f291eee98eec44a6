//! Buffer coordinates.

use serde::{Deserialize, Serialize};

/// A zero-indexed buffer position. Ordering is row-major: a point on an
/// earlier row always compares less than a point on a later row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Point {
    pub row: usize,
    pub column: usize,
}

impl Point {
    pub fn new(row: usize, column: usize) -> Self {
        Self { row, column }
    }

    /// The buffer origin.
    pub fn zero() -> Self {
        Self { row: 0, column: 0 }
    }
}

impl std::fmt::Display for Point {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.row, self.column)
    }
}

/// A half-open region of buffer text: `start` is included, `end` is not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Range {
    pub start: Point,
    pub end: Point,
}

impl Range {
    pub fn new(start: Point, end: Point) -> Self {
        Self { start, end }
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    pub fn contains(&self, point: Point) -> bool {
        point >= self.start && point < self.end
    }
}

impl std::fmt::Display for Range {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_ordering_is_row_major() {
        assert!(Point::new(0, 99) < Point::new(1, 0));
        assert!(Point::new(2, 3) < Point::new(2, 4));
        assert_eq!(Point::new(1, 1), Point::new(1, 1));
    }

    #[test]
    fn test_range_contains_is_half_open() {
        let range = Range::new(Point::new(0, 2), Point::new(1, 0));
        assert!(range.contains(Point::new(0, 2)));
        assert!(range.contains(Point::new(0, 50)));
        assert!(!range.contains(Point::new(1, 0)));
        assert!(!range.contains(Point::new(0, 1)));
    }
}
