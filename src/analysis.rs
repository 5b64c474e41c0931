use crate::audio::Track;
use crate::error::{LoopError, Result};
use crate::fingerprint::{extract_fingerprint, FingerprintSeries};
use crate::{AnalysisSettings, LoopPoints, SearchSettings};

/// A window pair in fingerprint-series indices. `end` is where playback jumps back to `start`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LoopCandidate {
    pub start: usize,
    pub end: usize,
    pub score: f64,
}

impl LoopCandidate {
    pub fn span(&self) -> usize {
        self.end - self.start
    }
}

pub fn detect_loop(track: &Track, settings: &AnalysisSettings) -> Result<LoopPoints> {
    // 1. Fingerprint
    let series = extract_fingerprint(track, &settings.fingerprint)?;
    log::info!(
        "Fingerprinted {} frames ({} masked)",
        series.len(),
        series.masked_count()
    );

    // 2. Correlation search
    let candidate = find_loop_point(&series, &settings.search)?;

    // 3. Back to track frames
    Ok(LoopPoints {
        start_frame: series.to_track_frame(candidate.start),
        end_frame: series.to_track_frame(candidate.end),
        confidence: candidate.score,
        candidate,
    })
}

/// Coarse over start positions, exhaustive over end positions.
pub fn find_loop_point(series: &FingerprintSeries, settings: &SearchSettings) -> Result<LoopCandidate> {
    let n = series.len();
    let test_len = settings.test_length;

    if test_len == 0 {
        return Err(LoopError::InsufficientData("test length is zero".to_string()));
    }
    // Need at least one (s, e) with e < n - test_len
    let too_short = test_len
        .checked_mul(2)
        .and_then(|d| d.checked_add(settings.start_offset))
        .map_or(true, |need| need >= n);
    if too_short {
        return Err(LoopError::InsufficientData(format!(
            "series of {} values is too short for start offset {} and test length {}",
            n, settings.start_offset, test_len
        )));
    }

    let last = n - test_len;
    let start_step = (n / settings.start_step_divisor.max(1)).max(1);

    let mut best: Option<LoopCandidate> = None;
    let mut best_score = 0.0;

    for start in (settings.start_offset..last).step_by(start_step) {
        for end in (start + test_len)..last {
            let Some(score) = sig_corr(series, start, end, test_len) else {
                continue;
            };
            if score > best_score {
                best_score = score;
                best = Some(LoopCandidate { start, end, score });
            }
        }
    }

    match best {
        Some(candidate) => {
            log::debug!(
                "Best candidate: {} -> {} (corr {:.4})",
                candidate.end,
                candidate.start,
                candidate.score
            );
            Ok(candidate)
        }
        None => Err(LoopError::NoLoopFound),
    }
}

/// Pearson correlation of `[s1, s1 + len)` against `[s2, s2 + len)`, skipping
/// positions masked on either side. `None` when there is nothing to compare.
pub fn sig_corr(series: &FingerprintSeries, s1: usize, s2: usize, len: usize) -> Option<f64> {
    let a = series.window(s1, len)?;
    let b = series.window(s2, len)?;
    pearson(&paired(a, b))
}

/// Fraction of positions, unmasked on both sides, where the two windows agree exactly.
pub fn pct_match(series: &FingerprintSeries, s1: usize, s2: usize, len: usize) -> Option<f64> {
    let pairs = paired(series.window(s1, len)?, series.window(s2, len)?);
    if pairs.is_empty() {
        return None;
    }
    let matches = pairs.iter().filter(|(x, y)| x == y).count();
    Some(matches as f64 / pairs.len() as f64)
}

fn paired(a: &[Option<f64>], b: &[Option<f64>]) -> Vec<(f64, f64)> {
    a.iter()
        .zip(b)
        .filter_map(|(x, y)| Some(((*x)?, (*y)?)))
        .collect()
}

fn pearson(pairs: &[(f64, f64)]) -> Option<f64> {
    let n = pairs.len();
    if n < 2 {
        return None;
    }

    let mean_x = pairs.iter().map(|(x, _)| x).sum::<f64>() / n as f64;
    let mean_y = pairs.iter().map(|(_, y)| y).sum::<f64>() / n as f64;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (x, y) in pairs {
        let dx = x - mean_x;
        let dy = y - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    // Flat window: no pattern to match
    if var_x <= 0.0 || var_y <= 0.0 {
        return None;
    }

    // sqrt(v * v) == v, so identical windows score exactly 1.0
    Some((cov / (var_x * var_y).sqrt()).clamp(-1.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// Deterministic "melody": bins 2..24 from a small LCG.
    fn melody(len: usize, seed: u64) -> Vec<Option<f64>> {
        let mut state = seed;
        (0..len)
            .map(|_| {
                state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                let bin = 2 + (state >> 33) % 23;
                Some(bin as f64 / 1152.0)
            })
            .collect()
    }

    fn repeating_series(period: usize, total: usize) -> FingerprintSeries {
        let pattern = melody(period, 7);
        let values = (0..total).map(|i| pattern[i % period]).collect();
        FingerprintSeries::new(values, 1)
    }

    #[test]
    fn test_sig_corr_self_is_one() {
        let series = FingerprintSeries::new(melody(300, 3), 0);
        assert_eq!(sig_corr(&series, 20, 20, 100), Some(1.0));
    }

    #[test]
    fn test_sig_corr_bounded() {
        let series = FingerprintSeries::new(melody(400, 11), 0);
        for s2 in (0..300).step_by(13) {
            if let Some(r) = sig_corr(&series, 0, s2, 100) {
                assert!((-1.0..=1.0).contains(&r));
            }
        }
    }

    #[test]
    fn test_sig_corr_skips_masked_pairs() {
        let mut a = melody(50, 5);
        let mut b = a.clone();
        // Garbage on masked positions must not affect the score
        a[3] = None;
        b[3] = Some(0.9);
        b[10] = None;
        a[10] = Some(0.0);
        let mut values = a;
        values.extend(b);
        let series = FingerprintSeries::new(values, 0);

        assert_relative_eq!(sig_corr(&series, 0, 50, 50).unwrap(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_sig_corr_degenerate_inputs() {
        let flat = FingerprintSeries::new(vec![Some(0.1); 40], 0);
        assert_eq!(sig_corr(&flat, 0, 20, 20), None);

        let masked = FingerprintSeries::new(vec![None; 40], 0);
        assert_eq!(sig_corr(&masked, 0, 20, 20), None);

        let short = FingerprintSeries::new(melody(30, 1), 0);
        assert_eq!(sig_corr(&short, 0, 20, 20), None);
    }

    #[test]
    fn test_anti_correlation() {
        let up: Vec<Option<f64>> = (0..20).map(|i| Some(i as f64)).collect();
        let down: Vec<Option<f64>> = (0..20).map(|i| Some(-(i as f64))).collect();
        let series = FingerprintSeries::new([up, down].concat(), 0);
        assert_relative_eq!(sig_corr(&series, 0, 20, 20).unwrap(), -1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_pct_match() {
        let mut values = melody(60, 9);
        values[5] = None;
        let series = FingerprintSeries::new(values, 0);
        assert_eq!(pct_match(&series, 0, 0, 30), Some(1.0));

        let series = FingerprintSeries::new(
            vec![Some(1.0), Some(2.0), None, Some(4.0), Some(1.0), Some(3.0), Some(3.0), None],
            0,
        );
        // Pairs: (1,1) (2,3) masked (4,masked) -> 1 of 2
        assert_eq!(pct_match(&series, 0, 4, 4), Some(0.5));

        let masked = FingerprintSeries::new(vec![None; 10], 0);
        assert_eq!(pct_match(&masked, 0, 5, 5), None);
    }

    #[test]
    fn test_repeating_pattern_found() {
        let series = repeating_series(400, 1000);
        let settings = SearchSettings {
            start_offset: 0,
            test_length: 100,
            start_step_divisor: 10,
        };

        let candidate = find_loop_point(&series, &settings).unwrap();
        assert_eq!(candidate.start, 0);
        assert_eq!(candidate.end, 400);
        assert_eq!(candidate.span(), 400);
        assert_relative_eq!(candidate.score, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_candidate_invariants() {
        let settings = SearchSettings {
            start_offset: 5,
            test_length: 40,
            start_step_divisor: 10,
        };
        for seed in 0..5 {
            let series = FingerprintSeries::new(melody(300, seed), 0);
            if let Ok(c) = find_loop_point(&series, &settings) {
                assert!(c.start < c.end);
                assert!(c.end + settings.test_length <= series.len());
                assert!(c.start >= settings.start_offset);
                assert!(c.score > 0.0 && c.score <= 1.0);
            }
        }
    }

    #[test]
    fn test_ties_keep_first_found() {
        // Period 50: every end that is a multiple of 50 after start scores 1.0
        let series = repeating_series(50, 400);
        let settings = SearchSettings {
            start_offset: 0,
            test_length: 40,
            start_step_divisor: 10,
        };

        let candidate = find_loop_point(&series, &settings).unwrap();
        assert_eq!((candidate.start, candidate.end), (0, 50));
    }

    #[test]
    fn test_all_masked_is_no_loop() {
        let series = FingerprintSeries::new(vec![None; 500], 1);
        let err = find_loop_point(&series, &SearchSettings { start_offset: 0, test_length: 50, start_step_divisor: 10 })
            .unwrap_err();
        assert!(matches!(err, LoopError::NoLoopFound));
    }

    #[test]
    fn test_test_length_too_long() {
        let series = FingerprintSeries::new(melody(100, 2), 1);
        let err = find_loop_point(&series, &SearchSettings { start_offset: 0, test_length: 150, start_step_divisor: 10 })
            .unwrap_err();
        assert!(matches!(err, LoopError::InsufficientData(_)));

        let err = find_loop_point(&series, &SearchSettings { start_offset: 0, test_length: 0, start_step_divisor: 10 })
            .unwrap_err();
        assert!(matches!(err, LoopError::InsufficientData(_)));
    }

    #[test]
    fn test_huge_settings_are_insufficient() {
        let series = FingerprintSeries::new(melody(1000, 6), 1);
        let huge_len = SearchSettings {
            start_offset: 0,
            test_length: usize::MAX / 2 + 1,
            start_step_divisor: 10,
        };
        assert!(matches!(
            find_loop_point(&series, &huge_len),
            Err(LoopError::InsufficientData(_))
        ));

        let huge_offset = SearchSettings {
            start_offset: usize::MAX - 1,
            test_length: 100,
            start_step_divisor: 10,
        };
        assert!(matches!(
            find_loop_point(&series, &huge_offset),
            Err(LoopError::InsufficientData(_))
        ));
    }

    #[test]
    fn test_constant_bin_is_no_loop() {
        // A single held note has no variance, so no window pair can match
        let series = FingerprintSeries::new(vec![Some(7.0 / 1152.0); 1000], 1);
        let settings = SearchSettings {
            start_offset: 0,
            test_length: 100,
            start_step_divisor: 10,
        };
        assert!(matches!(
            find_loop_point(&series, &settings),
            Err(LoopError::NoLoopFound)
        ));
    }

    #[test]
    fn test_default_settings_need_long_series() {
        // Defaults need start_offset + 2 * test_length < n
        let series = FingerprintSeries::new(melody(1200, 4), 1);
        let err = find_loop_point(&series, &SearchSettings::default()).unwrap_err();
        assert!(matches!(err, LoopError::InsufficientData(_)));
    }
}
