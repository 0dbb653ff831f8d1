use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static SCHOOL_YEAR_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([0-9]{4})-([0-9]{4})$").expect("school year pattern compiles")
});

/// One data file in the catalog, keyed by the selection it serves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDescriptor {
    pub filename: String,
    pub year: String,
    pub district: String,
    pub subject: String,
}

/// A school year label of the form `YYYY-YYYY`.
///
/// Ordering is numeric on the start year, then the end year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SchoolYear {
    pub start: u16,
    pub end: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid school year label {0:?}")]
pub struct InvalidSchoolYear(pub String);

impl FromStr for SchoolYear {
    type Err = InvalidSchoolYear;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || InvalidSchoolYear(s.to_string());
        let caps = SCHOOL_YEAR_PATTERN.captures(s).ok_or_else(invalid)?;
        let start = caps[1].parse().map_err(|_| invalid())?;
        let end = caps[2].parse().map_err(|_| invalid())?;
        Ok(SchoolYear { start, end })
    }
}

impl fmt::Display for SchoolYear {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:04}", self.start, self.end)
    }
}

impl Serialize for SchoolYear {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeriesPoint {
    pub period: SchoolYear,
    pub value: f64,
}

/// Validated points for one district, in file order.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceSeries {
    pub district: String,
    pub points: Vec<SeriesPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlignedSeries {
    pub label: String,
    #[serde(rename = "data")]
    pub values: Vec<Option<f64>>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct AlignedChart {
    pub axis: Vec<SchoolYear>,
    pub series: Vec<AlignedSeries>,
}

impl AlignedChart {
    pub fn is_empty(&self) -> bool {
        self.axis.is_empty() || self.series.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct ChartSpec {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub chart: AlignedChart,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogOptions {
    pub years: Vec<String>,
    pub districts: Vec<String>,
    pub subjects: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_strict_school_year_labels() {
        let year: SchoolYear = "2019-2020".parse().unwrap();
        assert_eq!(year, SchoolYear { start: 2019, end: 2020 });
        assert_eq!(year.to_string(), "2019-2020");
    }

    #[test]
    fn rejects_malformed_labels() {
        for label in ["abc", "", "2019", "2019-20", " 2019-2020", "2019-2020 ", "2019/2020", "19-20", "２０１９-2020"] {
            assert!(label.parse::<SchoolYear>().is_err(), "accepted {label:?}");
        }
    }

    #[test]
    fn orders_numerically_by_start_then_end() {
        let a: SchoolYear = "2019-2020".parse().unwrap();
        let b: SchoolYear = "2020-2021".parse().unwrap();
        let c: SchoolYear = "2020-2022".parse().unwrap();
        assert!(a < b);
        assert!(b < c);
    }
}
