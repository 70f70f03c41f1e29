/// Title heuristic in `[0, 1]`.
///
/// Four independent signals, 0.25 each:
/// - contains `!` or `?`
/// - at least 60% of alphabetic characters are uppercase
/// - length between 10 and 80 characters
/// - contains a digit
pub fn title_quality_bonus(title: &str) -> f64 {
    let mut bonus = 0.0;

    if title.contains('!') || title.contains('?') {
        bonus += 0.25;
    }

    let (alpha, upper) = title
        .chars()
        .filter(|c| c.is_alphabetic())
        .fold((0usize, 0usize), |(a, u), c| {
            (a + 1, u + usize::from(c.is_uppercase()))
        });
    if alpha > 0 && upper as f64 / alpha as f64 >= 0.6 {
        bonus += 0.25;
    }

    let len = title.chars().count();
    if (10..=80).contains(&len) {
        bonus += 0.25;
    }

    if title.chars().any(|c| c.is_ascii_digit()) {
        bonus += 0.25;
    }

    bonus
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_title() {
        assert_eq!(title_quality_bonus(""), 0.0);
    }

    #[test]
    fn test_all_signals() {
        assert_eq!(title_quality_bonus("INSANE 1V5 CLUTCH!"), 1.0);
    }

    #[test]
    fn test_length_only() {
        assert_eq!(title_quality_bonus("a quiet little moment"), 0.25);
    }

    #[test]
    fn test_uppercase_ratio_boundary() {
        // 3 of 5 letters uppercase = 0.6
        assert_eq!(title_quality_bonus("ABCde"), 0.25);
        // 2 of 5 = 0.4
        assert_eq!(title_quality_bonus("ABcde"), 0.0);
    }

    #[test]
    fn test_too_long_title() {
        let title = "x".repeat(81);
        assert_eq!(title_quality_bonus(&title), 0.0);
    }
}
