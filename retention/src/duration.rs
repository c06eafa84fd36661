use crate::error::RetentionError;
use std::time::Duration;

/// Parses an `older_than` age expression: an integer followed by `h`
/// (hours) or `d` (days), e.g. `72h`, `30d`. This is the only policy shape
/// the core compiles; richer predicates are left to a future policy
/// abstraction.
pub fn parse_age(expr: &str) -> Result<Duration, RetentionError> {
    let expr = expr.trim();
    let (digits, unit) = expr.split_at(expr.len().saturating_sub(1));

    let count: u64 = digits.parse().map_err(|_| RetentionError::InvalidAge {
        expr: expr.to_string(),
    })?;

    let seconds = match unit {
        "h" => count.checked_mul(3600),
        "d" => count.checked_mul(3600 * 24),
        _ => None,
    }
    .ok_or_else(|| RetentionError::InvalidAge { expr: expr.to_string() })?;

    Ok(Duration::from_secs(seconds))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hours_and_days() {
        assert_eq!(parse_age("72h").unwrap(), Duration::from_secs(72 * 3600));
        assert_eq!(parse_age("30d").unwrap(), Duration::from_secs(30 * 24 * 3600));
    }

    #[test]
    fn rejects_unknown_units() {
        assert!(parse_age("72m").is_err());
        assert!(parse_age("").is_err());
    }
}
