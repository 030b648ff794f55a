/// Computes the arithmetic mean of a slice of values. Returns `None` for empty input.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Rounds halves toward positive infinity, so `79.5` becomes `80` and `-0.5` becomes `0`.
pub fn round_half_up(value: f64) -> f64 {
    (value + 0.5).floor()
}

/// Formats a score for labels: whole numbers without decimals, others with one.
pub fn format_score(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        format!("{value:.1}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean() {
        assert_eq!(mean(&[]), None);
        assert_eq!(mean(&[70.0, 80.0, 90.0]), Some(80.0));
        assert_eq!(mean(&[1.0, 2.0]), Some(1.5));
    }

    #[test]
    fn test_round_half_up() {
        assert_eq!(round_half_up(79.5), 80.0);
        assert_eq!(round_half_up(79.49), 79.0);
        assert_eq!(round_half_up(84.5), 85.0);
        assert_eq!(round_half_up(-0.5), 0.0);
        assert_eq!(round_half_up(90.0), 90.0);
    }

    #[test]
    fn test_format_score() {
        assert_eq!(format_score(81.0), "81");
        assert_eq!(format_score(81.3), "81.3");
    }
}
