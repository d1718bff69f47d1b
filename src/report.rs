//! Text helpers for presenting coverage state.

/// Collapse sorted line numbers into inclusive `(start, end)` runs.
#[must_use]
pub fn coalesce_ranges(lines: &[u32]) -> Vec<(u32, u32)> {
    let mut ranges: Vec<(u32, u32)> = Vec::new();
    for &line in lines {
        match ranges.last_mut() {
            Some((_, end)) if end.checked_add(1) == Some(line) => *end = line,
            Some((_, end)) if line == *end => {}
            _ => ranges.push((line, line)),
        }
    }
    ranges
}

/// Format line numbers into compact range notation, e.g. "1, 3-5, 8".
///
/// The input slice must be sorted in ascending order.
#[must_use]
pub fn format_line_ranges(lines: &[u32]) -> String {
    coalesce_ranges(lines)
        .iter()
        .map(|&(start, end)| {
            if start == end {
                start.to_string()
            } else {
                format!("{start}-{end}")
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coalesce_ranges_empty() {
        assert_eq!(coalesce_ranges(&[]), Vec::<(u32, u32)>::new());
    }

    #[test]
    fn test_coalesce_ranges_single() {
        assert_eq!(coalesce_ranges(&[5]), vec![(5, 5)]);
    }

    #[test]
    fn test_coalesce_ranges_consecutive() {
        assert_eq!(coalesce_ranges(&[0, 1, 2]), vec![(0, 2)]);
    }

    #[test]
    fn test_coalesce_ranges_gaps_and_duplicates() {
        assert_eq!(coalesce_ranges(&[1, 2, 2, 4, 7, 8]), vec![(1, 2), (4, 4), (7, 8)]);
    }

    #[test]
    fn test_format_line_ranges() {
        assert_eq!(format_line_ranges(&[1, 3, 4, 5, 8]), "1, 3-5, 8");
        assert_eq!(format_line_ranges(&[]), "");
    }
}
