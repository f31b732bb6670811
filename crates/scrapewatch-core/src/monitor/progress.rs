//! Completion percentages per depth and across a session.

use std::collections::BTreeSet;

use scrapewatch_protocol::DepthStats;

/// Progress of one depth, 0-100.
///
/// Depth 0 has no analysis phase, so scraping alone counts. Deeper levels
/// weigh scraping and analysis equally. An empty depth is 0, not skipped.
pub fn depth_progress(stats: &DepthStats) -> f64 {
    if stats.total == 0 {
        return 0.0;
    }
    let scraping = (stats.scraped + stats.failed) as f64 / stats.total as f64 * 100.0;
    if stats.depth == 0 {
        return scraping;
    }
    let analysis = if stats.scraped > 0 {
        stats.analyzed_profiles as f64 / stats.scraped as f64 * 100.0
    } else {
        0.0
    };
    scraping * 0.5 + analysis * 0.5
}

/// Rounded mean of [`depth_progress`] over depths `0..=max_depth`. Depths
/// with no stats count as 0; the first row wins for a repeated depth.
///
/// Only depths that actually have stats are visited, so the cost does not
/// grow with `max_depth`.
pub fn overall_progress(stats: &[DepthStats], max_depth: u32) -> u32 {
    let mut seen = BTreeSet::new();
    let total: f64 = stats
        .iter()
        .filter(|s| s.depth <= max_depth && seen.insert(s.depth))
        .map(depth_progress)
        .sum();
    (total / (f64::from(max_depth) + 1.0)).round() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(depth: u32, total: u64, scraped: u64, failed: u64, analyzed: u64) -> DepthStats {
        DepthStats {
            depth,
            total,
            scraped,
            failed,
            analyzed_profiles: analyzed,
            ..DepthStats::default()
        }
    }

    #[test]
    fn test_fully_done_session_is_100() {
        let all = [stats(0, 10, 10, 0, 0), stats(1, 5, 5, 0, 5)];
        assert_eq!(depth_progress(&all[0]), 100.0);
        assert_eq!(depth_progress(&all[1]), 100.0);
        assert_eq!(overall_progress(&all, 1), 100);
    }

    #[test]
    fn test_unstarted_depth_drags_average_down() {
        let all = [stats(0, 10, 10, 0, 0), stats(1, 5, 0, 0, 0)];
        assert_eq!(depth_progress(&all[1]), 0.0);
        assert_eq!(overall_progress(&all, 1), 50);
    }

    #[test]
    fn test_missing_depth_counts_as_zero() {
        let all = [stats(0, 4, 4, 0, 0)];
        assert_eq!(overall_progress(&all, 3), 25);
    }

    #[test]
    fn test_max_depth_at_u32_limit_does_not_overflow() {
        assert_eq!(overall_progress(&[], u32::MAX), 0);
        assert_eq!(overall_progress(&[stats(0, 4, 4, 0, 0)], u32::MAX), 0);
    }

    #[test]
    fn test_rows_beyond_max_depth_and_duplicates_are_ignored() {
        let all = [
            stats(0, 4, 4, 0, 0),
            stats(0, 4, 0, 0, 0),
            stats(5, 4, 4, 0, 0),
        ];
        assert_eq!(overall_progress(&all, 1), 50);
    }

    #[test]
    fn test_deeper_levels_split_scraping_and_analysis() {
        let half_analyzed = stats(2, 10, 8, 2, 4);
        assert_eq!(depth_progress(&half_analyzed), 75.0);
    }

    #[test]
    fn test_failures_count_toward_scraping() {
        assert_eq!(depth_progress(&stats(0, 4, 1, 1, 0)), 50.0);
    }

    #[test]
    fn test_empty_depth_is_zero() {
        assert_eq!(depth_progress(&stats(1, 0, 0, 0, 0)), 0.0);
    }
}
