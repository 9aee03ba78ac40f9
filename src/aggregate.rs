//! Year-windowed cumulative aggregation.
//!
//! Builds the tables behind the validation heatmap (per-group hit
//! ratios over time) and the time plot (per-year collection/release
//! tallies). Each target year's counts cover every record collected on
//! or before that year, so the matrices are cumulative left to right.

use indexmap::IndexMap;
use itertools::{Itertools, MinMaxResult};
use log::info;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::assay::AssessedRecord;
use crate::counts::{collapse_data, count_data, CollapseMap};

/// Collapsed hit/total counts per group, one column pair per target
/// year. Cells with no qualifying records hold 0, not a missing marker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YearlyCounts {
    /// (Virus Group, TaxID) per matrix row; the group name is the index
    /// used downstream.
    pub groups: Vec<(String, u32)>,
    pub years: Vec<i32>,
    pub hits: Array2<f64>,
    pub totals: Array2<f64>,
}

/// Counts and collapses the data once per target year, keeping only
/// records collected on or before it.
///
/// Records with a missing collection year never qualify. Per-year
/// tables are outer-merged on (group, taxid) in first-appearance order
/// and absent cells are filled with 0. For a fixed group, hits and
/// totals are non-decreasing across ascending years.
pub fn aggregate_counts(
    assessed: &[AssessedRecord],
    years: &[i32],
    map: &CollapseMap,
) -> YearlyCounts {
    let mut per_year = Vec::with_capacity(years.len());
    let mut row_index: IndexMap<(String, u32), usize> = IndexMap::new();

    for &yr in years {
        let window: Vec<AssessedRecord> = assessed
            .iter()
            .filter(|r| r.collection_year.map_or(false, |y| y <= yr))
            .cloned()
            .collect();
        let collapsed = collapse_data(&count_data(&window), map);
        for gc in &collapsed {
            let next = row_index.len();
            row_index.entry((gc.group.clone(), gc.taxid)).or_insert(next);
        }
        per_year.push(collapsed);
    }

    let mut hits = Array2::zeros((row_index.len(), years.len()));
    let mut totals = Array2::zeros((row_index.len(), years.len()));
    for (col, collapsed) in per_year.iter().enumerate() {
        for gc in collapsed {
            if let Some(&row) = row_index.get(&(gc.group.clone(), gc.taxid)) {
                hits[[row, col]] = gc.hits as f64;
                totals[[row, col]] = gc.total as f64;
            }
        }
    }

    info!(
        "Aggregated {} group(s) over {} target year(s)",
        row_index.len(),
        years.len()
    );
    YearlyCounts {
        groups: row_index.into_keys().collect(),
        years: years.to_vec(),
        hits,
        totals,
    }
}

/// A group-by-year matrix with bare year column labels.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YearMatrix {
    pub groups: Vec<(String, u32)>,
    pub years: Vec<i32>,
    pub values: Array2<f64>,
}

/// Splits an aggregate into its totals and elementwise hit ratios.
///
/// 0/0 yields NaN, which propagates; no special-casing. hits <= total
/// per cell, so a positive numerator never meets a zero denominator.
pub fn calc_totals_ratios(agg: &YearlyCounts) -> (YearMatrix, YearMatrix) {
    let totals = YearMatrix {
        groups: agg.groups.clone(),
        years: agg.years.clone(),
        values: agg.totals.clone(),
    };
    let ratios = YearMatrix {
        groups: agg.groups.clone(),
        years: agg.years.clone(),
        values: &agg.hits / &agg.totals,
    };
    (totals, ratios)
}

/// Column labels of [`YearCounts`], in matrix order.
pub const YEAR_COUNT_COLUMNS: [&str; 4] = [
    "Total Collection",
    "Total Release",
    "Hit Collection",
    "Hit Release",
];

/// Year-indexed tallies over the full record set and its hit subset.
///
/// The index is dense over the observed min..=max year; years nothing
/// landed on hold NaN rather than being omitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YearCounts {
    pub years: Vec<i32>,
    /// Rows follow `years`; columns follow [`YEAR_COUNT_COLUMNS`].
    pub values: Array2<f64>,
}

/// Tallies how many records fall on each collection/release year,
/// across all records and across the hit-only subset.
pub fn count_years(assessed: &[AssessedRecord]) -> YearCounts {
    let mut tallies: [BTreeMap<i32, u64>; 4] = Default::default();
    for r in assessed {
        if let Some(y) = r.collection_year {
            *tallies[0].entry(y).or_insert(0) += 1;
        }
        if let Some(y) = r.release_year {
            *tallies[1].entry(y).or_insert(0) += 1;
        }
        if r.hit {
            if let Some(y) = r.collection_year {
                *tallies[2].entry(y).or_insert(0) += 1;
            }
            if let Some(y) = r.release_year {
                *tallies[3].entry(y).or_insert(0) += 1;
            }
        }
    }

    let observed = tallies.iter().flat_map(|t| t.keys().copied());
    let (min_year, max_year) = match observed.minmax() {
        MinMaxResult::NoElements => {
            return YearCounts {
                years: Vec::new(),
                values: Array2::from_elem((0, YEAR_COUNT_COLUMNS.len()), f64::NAN),
            }
        }
        MinMaxResult::OneElement(y) => (y, y),
        MinMaxResult::MinMax(lo, hi) => (lo, hi),
    };

    let years: Vec<i32> = (min_year..=max_year).collect();
    let mut values = Array2::from_elem((years.len(), YEAR_COUNT_COLUMNS.len()), f64::NAN);
    for (col, tally) in tallies.iter().enumerate() {
        for (&year, &n) in tally {
            values[[(year - min_year) as usize, col]] = n as f64;
        }
    }

    YearCounts { years, values }
}

/// Running cumulative sum down the year index, per column.
///
/// Missing cells count as 0 in the running sum. A cumulative value of
/// zero means nothing has been observed yet and is rendered as NaN;
/// callers treat zero and missing identically. The masking applies to
/// the result column, so a raw zero after the first observation keeps
/// its accumulated value.
pub fn make_cumulative(counts: &YearCounts) -> YearCounts {
    let mut values = counts.values.clone();
    for mut col in values.columns_mut() {
        let mut running = 0.0;
        for cell in col.iter_mut() {
            if !cell.is_nan() {
                running += *cell;
            }
            *cell = if running == 0.0 { f64::NAN } else { running };
        }
    }

    YearCounts {
        years: counts.years.clone(),
        values,
    }
}

/// Total/Hit tallies against one kind of year (collection or release).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YearSeries {
    /// "Collection Year" or "Release Year".
    pub index_label: String,
    pub years: Vec<i32>,
    pub total: Vec<f64>,
    pub hit: Vec<f64>,
}

/// Splits the four tally columns into a Collection pair and a Release
/// pair for time-series plotting.
pub fn separate_year_types(counts: &YearCounts) -> (YearSeries, YearSeries) {
    let column = |i: usize| counts.values.column(i).to_vec();
    let collection = YearSeries {
        index_label: "Collection Year".to_string(),
        years: counts.years.clone(),
        total: column(0),
        hit: column(2),
    };
    let release = YearSeries {
        index_label: "Release Year".to_string(),
        years: counts.years.clone(),
        total: column(1),
        hit: column(3),
    };
    (collection, release)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::arr2;

    fn assessed(
        accession: &str,
        taxid: u32,
        collection_year: Option<i32>,
        release_year: Option<i32>,
        hit: bool,
    ) -> AssessedRecord {
        AssessedRecord {
            accession: accession.to_string(),
            taxid,
            collection_year,
            release_year,
            hit,
        }
    }

    fn test_map() -> CollapseMap {
        let mut map = CollapseMap::new();
        map.insert(100, "GroupX", 1);
        map.insert(200, "GroupY", 2);
        map
    }

    #[test]
    fn test_aggregate_counts_cumulative_windows() {
        let records = vec![
            assessed("A1", 100, Some(2010), None, true),
            assessed("A2", 100, Some(2012), None, false),
            assessed("B1", 200, Some(2012), None, true),
            assessed("A3", 100, None, None, true), // missing year, excluded
        ];
        let agg = aggregate_counts(&records, &[2010, 2011, 2012], &test_map());

        assert_eq!(agg.years, vec![2010, 2011, 2012]);
        assert_eq!(
            agg.groups,
            vec![("GroupX".to_string(), 1), ("GroupY".to_string(), 2)]
        );

        // GroupX: one hit in 2010, second record joins in 2012
        assert_eq!(agg.hits.row(0).to_vec(), vec![1.0, 1.0, 1.0]);
        assert_eq!(agg.totals.row(0).to_vec(), vec![1.0, 1.0, 2.0]);
        // GroupY only appears in 2012; earlier cells fill with 0
        assert_eq!(agg.hits.row(1).to_vec(), vec![0.0, 0.0, 1.0]);
        assert_eq!(agg.totals.row(1).to_vec(), vec![0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_aggregate_counts_monotonic_per_group() {
        let records = vec![
            assessed("A1", 100, Some(2009), None, true),
            assessed("A2", 100, Some(2010), None, false),
            assessed("A3", 100, Some(2011), None, true),
            assessed("B1", 200, Some(2011), None, false),
        ];
        let agg = aggregate_counts(&records, &[2009, 2010, 2011], &test_map());

        for row in 0..agg.groups.len() {
            for col in 1..agg.years.len() {
                assert!(agg.hits[[row, col]] >= agg.hits[[row, col - 1]]);
                assert!(agg.totals[[row, col]] >= agg.totals[[row, col - 1]]);
            }
        }
    }

    #[test]
    fn test_calc_totals_ratios() {
        let records = vec![
            assessed("A1", 100, Some(2010), None, true),
            assessed("A2", 100, Some(2010), None, false),
            assessed("B1", 200, Some(2011), None, true),
        ];
        let agg = aggregate_counts(&records, &[2010, 2011], &test_map());
        let (totals, ratios) = calc_totals_ratios(&agg);

        assert_eq!(totals.values, arr2(&[[2.0, 2.0], [0.0, 1.0]]));

        // GroupX: 1 hit of 2 both years
        assert_relative_eq!(ratios.values[[0, 0]], 0.5);
        assert_relative_eq!(ratios.values[[0, 1]], 0.5);
        // GroupY in 2010 is 0/0 -> NaN, then 1/1
        assert!(ratios.values[[1, 0]].is_nan());
        assert_relative_eq!(ratios.values[[1, 1]], 1.0);
    }

    #[test]
    fn test_count_years_dense_index_with_gaps() {
        let records = vec![
            assessed("A1", 100, Some(2010), Some(2011), true),
            assessed("A2", 100, Some(2013), Some(2013), false),
        ];
        let counts = count_years(&records);

        assert_eq!(counts.years, vec![2010, 2011, 2012, 2013]);

        // Total Collection: 2010 and 2013 observed, 2011/2012 missing
        assert_relative_eq!(counts.values[[0, 0]], 1.0);
        assert!(counts.values[[1, 0]].is_nan());
        assert!(counts.values[[2, 0]].is_nan());
        assert_relative_eq!(counts.values[[3, 0]], 1.0);
        // Hit Collection only counts the hit record
        assert_relative_eq!(counts.values[[0, 2]], 1.0);
        assert!(counts.values[[3, 2]].is_nan());
        // Hit Release follows the hit record's release year
        assert_relative_eq!(counts.values[[1, 3]], 1.0);
    }

    #[test]
    fn test_count_years_empty_input() {
        let counts = count_years(&[]);
        assert!(counts.years.is_empty());
        assert_eq!(counts.values.nrows(), 0);
    }

    #[test]
    fn test_make_cumulative_masks_result_zeros_only() {
        // Raw column [0, 0, 3, 0, 2]: running sum is [0, 0, 3, 3, 5];
        // only the leading zeros (where the sum itself is 0) are masked
        let counts = YearCounts {
            years: vec![2000, 2001, 2002, 2003, 2004],
            values: arr2(&[
                [0.0, 0.0, 0.0, 0.0],
                [0.0, 0.0, 0.0, 0.0],
                [3.0, 0.0, 0.0, 0.0],
                [0.0, 0.0, 0.0, 0.0],
                [2.0, 0.0, 0.0, 0.0],
            ]),
        };
        let cumulative = make_cumulative(&counts);

        let col: Vec<f64> = cumulative.values.column(0).to_vec();
        assert!(col[0].is_nan());
        assert!(col[1].is_nan());
        assert_relative_eq!(col[2], 3.0);
        assert_relative_eq!(col[3], 3.0);
        assert_relative_eq!(col[4], 5.0);
    }

    #[test]
    fn test_make_cumulative_treats_nan_as_zero() {
        let counts = YearCounts {
            years: vec![2000, 2001, 2002],
            values: arr2(&[
                [f64::NAN, 1.0, f64::NAN, f64::NAN],
                [2.0, f64::NAN, f64::NAN, f64::NAN],
                [1.0, 1.0, f64::NAN, f64::NAN],
            ]),
        };
        let cumulative = make_cumulative(&counts);

        assert!(cumulative.values[[0, 0]].is_nan());
        assert_relative_eq!(cumulative.values[[1, 0]], 2.0);
        assert_relative_eq!(cumulative.values[[2, 0]], 3.0);
        assert_relative_eq!(cumulative.values[[0, 1]], 1.0);
        assert_relative_eq!(cumulative.values[[1, 1]], 1.0);
        assert_relative_eq!(cumulative.values[[2, 1]], 2.0);
        // A column with no observations stays fully masked
        assert!(cumulative.values.column(2).iter().all(|v| v.is_nan()));
    }

    #[test]
    fn test_separate_year_types() {
        let records = vec![
            assessed("A1", 100, Some(2010), Some(2011), true),
            assessed("A2", 100, Some(2010), Some(2010), false),
        ];
        let counts = count_years(&records);
        let (collection, release) = separate_year_types(&counts);

        assert_eq!(collection.index_label, "Collection Year");
        assert_eq!(release.index_label, "Release Year");
        assert_eq!(collection.years, counts.years);

        // 2010: two collected, one of them a hit
        assert_relative_eq!(collection.total[0], 2.0);
        assert_relative_eq!(collection.hit[0], 1.0);
        // Releases: one in 2010 (miss), one in 2011 (hit)
        assert_relative_eq!(release.total[0], 1.0);
        assert!(release.hit[0].is_nan());
        assert_relative_eq!(release.total[1], 1.0);
        assert_relative_eq!(release.hit[1], 1.0);
    }
}
