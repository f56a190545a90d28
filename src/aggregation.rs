//! Review aggregation pipeline.
//!
//! Pure functions over an explicit record set: filtering and sorting produce
//! the display list, statistics always describe the full unfiltered corpus.
//! Nothing here performs I/O or holds state.

use std::cmp::Ordering;

use crate::models::{
    RatingDistribution, ReviewRecord, SortKey, StatisticsSummary, ViewParameters,
};

/// Output of [`aggregate`].
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregation<'a> {
    /// Filtered, ordered view over the input records.
    pub display_list: Vec<&'a ReviewRecord>,
    /// Statistics over every input record.
    pub stats: StatisticsSummary,
}

/// Produces the display list and summary statistics for one snapshot.
pub fn aggregate<'a>(records: &'a [ReviewRecord], params: &ViewParameters) -> Aggregation<'a> {
    let mut display_list = filter_reviews(records.iter(), params);
    sort_reviews(&mut display_list, params.sort_key);

    Aggregation {
        display_list,
        stats: compute_statistics(records),
    }
}

/// Applies the category and verified-only filters, preserving input order.
pub fn filter_reviews<'a, I>(records: I, params: &ViewParameters) -> Vec<&'a ReviewRecord>
where
    I: IntoIterator<Item = &'a ReviewRecord>,
{
    records
        .into_iter()
        .filter(|r| params.category_filter.matches(&r.service_type))
        .filter(|r| !params.verified_only || r.verified)
        .collect()
}

/// Stable in-place sort of a display list.
pub fn sort_reviews(list: &mut [&ReviewRecord], sort_key: SortKey) {
    match sort_key {
        SortKey::Newest => list.sort_by(|a, b| newest_first(a, b)),
        SortKey::Highest => list.sort_by(|a, b| b.rating.cmp(&a.rating)),
        SortKey::Lowest => list.sort_by(|a, b| a.rating.cmp(&b.rating)),
    }
}

// Pending writes (no timestamp yet) are the most recent.
fn newest_first(a: &ReviewRecord, b: &ReviewRecord) -> Ordering {
    match (a.created_at, b.created_at) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => b.cmp(&a),
    }
}

/// Summary statistics over the full record set.
///
/// Records without a valid star rating still count toward `total` and
/// `verified_total` but are left out of the distribution and the average.
pub fn compute_statistics(records: &[ReviewRecord]) -> StatisticsSummary {
    let mut distribution = RatingDistribution::default();
    let mut verified_total = 0;
    let mut rating_sum: u64 = 0;

    for record in records {
        if record.verified {
            verified_total += 1;
        }
        if let Some(star) = record.valid_rating() {
            distribution.record(star);
            rating_sum += u64::from(star);
        }
    }

    let rated = distribution.bucketed();
    let average = if rated == 0 {
        0.0
    } else {
        round_to_tenth(rating_sum as f64 / rated as f64)
    };

    StatisticsSummary {
        total: records.len(),
        verified_total,
        average,
        distribution,
    }
}

fn round_to_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Verified reviews in input order; the spotlight rotates over this subset.
pub fn verified_subset(records: &[ReviewRecord]) -> Vec<&ReviewRecord> {
    records.iter().filter(|r| r.verified).collect()
}
