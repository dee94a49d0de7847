//! Row filters and column normalization applied by the cleaning job.
//!
//! Numeric predicates cast their column to `Float64` first; values that are
//! missing or do not parse as numbers become null, and a null predicate drops
//! the row.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use polars::prelude::*;

use crate::dataset::{LAST_REVIEW, LATITUDE, LONGITUDE, PRICE};

pub const LONGITUDE_RANGE: (f64, f64) = (-74.25, -73.50);
pub const LATITUDE_RANGE: (f64, f64) = (40.5, 41.2);

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%Y%m%d"];
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

fn within(column: &str, (min, max): (f64, f64)) -> Expr {
    let value = col(column).cast(DataType::Float64);
    value.clone().gt_eq(lit(min)).and(value.lt_eq(lit(max)))
}

/// Keeps rows with `min_price <= price <= max_price`.
pub fn filter_price_range(df: DataFrame, min_price: f64, max_price: f64) -> PolarsResult<DataFrame> {
    df.lazy()
        .filter(within(PRICE, (min_price, max_price)))
        .collect()
}

pub fn filter_geolocation(df: DataFrame) -> PolarsResult<DataFrame> {
    df.lazy()
        .filter(within(LONGITUDE, LONGITUDE_RANGE).and(within(LATITUDE, LATITUDE_RANGE)))
        .collect()
}

/// Parses a review date. Datetime inputs are truncated to their date.
pub fn normalize_review_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(raw, format).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
                .map(|datetime| datetime.date())
        })
        .or_else(|| {
            DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|datetime| datetime.date_naive())
        })
}

/// Replaces `last_review` with a `Date` column; unparseable values become null.
pub fn normalize_last_review(mut df: DataFrame) -> PolarsResult<DataFrame> {
    let dates = {
        let column = df.column(LAST_REVIEW)?.cast(&DataType::String)?;
        let raw = column.str()?;
        DateChunked::from_naive_date_options(
            LAST_REVIEW.into(),
            raw.into_iter()
                .map(|value| value.and_then(normalize_review_date)),
        )
    };

    df.with_column(dates.into_series())?;
    Ok(df)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_common_date_shapes() {
        let expected = NaiveDate::from_ymd_opt(2019, 5, 21).unwrap();
        for raw in [
            "2019-05-21",
            " 2019-05-21 ",
            "2019/05/21",
            "05/21/2019",
            "20190521",
            "2019-05-21 13:45:00",
            "2019-05-21T13:45:00.250",
            "2019-05-21T13:45:00+02:00",
        ] {
            assert_eq!(normalize_review_date(raw), Some(expected), "{raw}");
        }
    }

    #[test]
    fn rejects_garbage_and_impossible_dates() {
        for raw in ["", "bad", "2019-02-30", "2019-13-01", "21 May"] {
            assert_eq!(normalize_review_date(raw), None, "{raw}");
        }
    }
}
