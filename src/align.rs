use std::collections::{BTreeSet, HashMap};

use crate::models::{AlignedChart, AlignedSeries, SchoolYear, SourceSeries};

/// Aligns every source onto one shared, strictly increasing school-year axis.
///
/// Periods a source has no value for come back as `None`. When a source repeats
/// a period the later point wins. Sources with no points still produce a series.
pub fn align(sources: &[SourceSeries]) -> AlignedChart {
    let axis: Vec<SchoolYear> = sources
        .iter()
        .flat_map(|source| source.points.iter().map(|point| point.period))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let series = sources
        .iter()
        .map(|source| {
            let lookup: HashMap<SchoolYear, f64> = source
                .points
                .iter()
                .map(|point| (point.period, point.value))
                .collect();

            AlignedSeries {
                label: source.district.clone(),
                values: axis.iter().map(|period| lookup.get(period).copied()).collect(),
            }
        })
        .collect();

    AlignedChart { axis, series }
}
