//! Probability-threshold classification.

use crate::error::{QcError, Result};

/// Validate a posterior cutoff before any fitting work is attempted.
pub fn validate_cutoff(cutoff: f64) -> Result<()> {
    if !(cutoff.is_finite() && (0.0..=1.0).contains(&cutoff)) {
        return Err(QcError::InvalidParameter(format!(
            "posterior cutoff must be in [0, 1], got {}",
            cutoff
        )));
    }
    Ok(())
}

/// Keep decision for one record.
///
/// The cutoff measures tolerance for compromised-probability, not a
/// keep-probability threshold: a record is kept when its compromised
/// posterior stays strictly below the cutoff. Both endpoints are pinned:
/// at 1 every record is kept, at 0 only records with posterior exactly
/// zero survive.
pub fn keep_record(prob_compromised: f64, cutoff: f64) -> bool {
    if cutoff >= 1.0 {
        return true;
    }
    if cutoff <= 0.0 {
        return prob_compromised <= 0.0;
    }
    prob_compromised < cutoff
}

/// Apply the cutoff to per-record posteriors.
pub fn classify(posteriors: &[[f64; 2]], compromised: usize, cutoff: f64) -> Result<Vec<bool>> {
    validate_cutoff(cutoff)?;
    Ok(posteriors
        .iter()
        .map(|p| keep_record(p[compromised], cutoff))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn posteriors() -> Vec<[f64; 2]> {
        vec![
            [1.0, 0.0],
            [0.8, 0.2],
            [0.5, 0.5],
            [0.2, 0.8],
            [0.0, 1.0],
        ]
    }

    #[test]
    fn test_cutoff_validation() {
        assert!(validate_cutoff(1.5).is_err());
        assert!(validate_cutoff(-0.1).is_err());
        assert!(validate_cutoff(f64::NAN).is_err());
        assert!(validate_cutoff(0.0).is_ok());
        assert!(validate_cutoff(1.0).is_ok());
    }

    #[test]
    fn test_zero_cutoff_keeps_only_zero_posterior() {
        let keep = classify(&posteriors(), 1, 0.0).unwrap();
        assert_eq!(keep, vec![true, false, false, false, false]);
    }

    #[test]
    fn test_one_cutoff_keeps_everything() {
        let keep = classify(&posteriors(), 1, 1.0).unwrap();
        assert!(keep.iter().all(|&k| k));
    }

    #[test]
    fn test_directionality() {
        let keep = classify(&posteriors(), 1, 0.75).unwrap();
        assert_eq!(keep, vec![true, true, true, false, false]);
    }

    #[test]
    fn test_monotonic_in_cutoff() {
        let post = posteriors();
        let mut previous = 0;
        for step in 0..=10 {
            let cutoff = step as f64 / 10.0;
            let kept = classify(&post, 1, cutoff)
                .unwrap()
                .iter()
                .filter(|&&k| k)
                .count();
            assert!(kept >= previous);
            previous = kept;
        }
        assert_eq!(previous, post.len());
    }
}
