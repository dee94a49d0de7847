use basic_cleaning_core::filters::{
    filter_geolocation, filter_price_range, normalize_last_review, LATITUDE_RANGE,
    LONGITUDE_RANGE,
};
use polars::prelude::*;
use proptest::prelude::*;
use proptest::strategy::Strategy;

fn listings(
    prices: Vec<Option<f64>>,
    longitudes: Vec<Option<f64>>,
    latitudes: Vec<Option<f64>>,
) -> PolarsResult<DataFrame> {
    let len = prices.len();
    DataFrame::new(vec![
        Series::new("id".into(), (0..len as i64).collect::<Vec<_>>()).into(),
        Series::new("price".into(), prices).into(),
        Series::new("last_review".into(), vec![Some("2019-01-01"); len]).into(),
        Series::new("longitude".into(), longitudes).into(),
        Series::new("latitude".into(), latitudes).into(),
    ])
}

fn ids(df: &DataFrame) -> PolarsResult<Vec<i64>> {
    Ok(df.column("id")?.i64()?.into_iter().flatten().collect())
}

#[test]
fn price_bounds_are_inclusive() -> PolarsResult<()> {
    let df = listings(
        vec![Some(9.99), Some(10.0), Some(500.0), Some(1000.0), Some(1000.01)],
        vec![Some(-73.9); 5],
        vec![Some(40.7); 5],
    )?;

    let filtered = filter_price_range(df, 10.0, 1000.0)?;
    assert_eq!(ids(&filtered)?, vec![1, 2, 3]);
    Ok(())
}

#[test]
fn missing_and_non_numeric_prices_are_dropped() -> PolarsResult<()> {
    let df = DataFrame::new(vec![
        Series::new("id".into(), vec![0i64, 1, 2, 3]).into(),
        Series::new("price".into(), vec![Some("50"), None, Some("n/a"), Some("75.5")]).into(),
    ])?;

    let filtered = filter_price_range(df, 10.0, 100.0)?;
    assert_eq!(ids(&filtered)?, vec![0, 3]);
    // The price column keeps its original type.
    assert_eq!(filtered.column("price")?.dtype(), &DataType::String);
    Ok(())
}

#[test]
fn inverted_bounds_empty_the_dataset() -> PolarsResult<()> {
    let df = listings(
        vec![Some(10.0), Some(50.0), Some(100.0)],
        vec![Some(-73.9); 3],
        vec![Some(40.7); 3],
    )?;

    let filtered = filter_price_range(df, 100.0, 10.0)?;
    assert_eq!(filtered.height(), 0);
    assert_eq!(filtered.width(), 5);
    Ok(())
}

#[test]
fn geolocation_box_is_inclusive_and_excludes_missing() -> PolarsResult<()> {
    let df = listings(
        vec![Some(100.0); 7],
        vec![
            Some(-74.25),
            Some(-73.50),
            Some(-74.26),
            Some(-73.49),
            Some(-73.9),
            None,
            Some(-73.9),
        ],
        vec![
            Some(40.5),
            Some(41.2),
            Some(40.7),
            Some(40.7),
            Some(41.21),
            Some(40.7),
            None,
        ],
    )?;

    let filtered = filter_geolocation(df)?;
    assert_eq!(ids(&filtered)?, vec![0, 1]);
    Ok(())
}

#[test]
fn last_review_becomes_date_with_nulls_for_garbage() -> PolarsResult<()> {
    let df = DataFrame::new(vec![Series::new(
        "last_review".into(),
        vec![Some("2019-01-01"), Some("bad"), None, Some("2018-12-31 08:00:00")],
    )
    .into()])?;

    let normalized = normalize_last_review(df)?;
    let column = normalized.column("last_review")?;
    assert_eq!(column.dtype(), &DataType::Date);

    let rendered = column.cast(&DataType::String)?;
    let rendered = rendered.str()?;
    assert_eq!(rendered.get(0), Some("2019-01-01"));
    assert_eq!(rendered.get(1), None);
    assert_eq!(rendered.get(2), None);
    assert_eq!(rendered.get(3), Some("2018-12-31"));
    Ok(())
}

#[test]
fn all_null_last_review_column_normalizes() -> PolarsResult<()> {
    let df = DataFrame::new(vec![
        Series::new("last_review".into(), vec![None::<&str>, None]).into(),
    ])?;

    let normalized = normalize_last_review(df)?;
    assert_eq!(normalized.column("last_review")?.null_count(), 2);
    Ok(())
}

fn row_strategy() -> impl Strategy<Value = (Option<f64>, Option<f64>, Option<f64>)> {
    (
        proptest::option::of(-100.0f64..2000.0),
        proptest::option::of(-74.5f64..-73.2),
        proptest::option::of(40.2f64..41.5),
    )
}

proptest! {
    #[test]
    fn filters_only_keep_rows_inside_bounds(
        rows in proptest::collection::vec(row_strategy(), 0..64),
        min_price in 0.0f64..1000.0,
        max_price in 0.0f64..1000.0,
    ) {
        let (prices, rest): (Vec<_>, Vec<_>) =
            rows.iter().map(|(p, lon, lat)| (*p, (*lon, *lat))).unzip();
        let (longitudes, latitudes): (Vec<_>, Vec<_>) = rest.into_iter().unzip();
        let df = listings(prices, longitudes, latitudes).unwrap();
        let input_rows = df.height();

        let priced = filter_price_range(df, min_price, max_price).unwrap();
        prop_assert!(priced.height() <= input_rows);
        for price in priced.column("price").unwrap().f64().unwrap().into_iter() {
            let price = price.expect("null price survived the filter");
            prop_assert!(min_price <= price && price <= max_price);
        }

        let expected_priced = rows
            .iter()
            .filter(|(p, _, _)| p.is_some_and(|p| min_price <= p && p <= max_price))
            .count();
        prop_assert_eq!(priced.height(), expected_priced);

        let located = filter_geolocation(priced).unwrap();
        prop_assert!(located.height() <= expected_priced);
        let longitudes = located.column("longitude").unwrap().f64().unwrap();
        let latitudes = located.column("latitude").unwrap().f64().unwrap();
        for (lon, lat) in longitudes.into_iter().zip(latitudes.into_iter()) {
            let (lon, lat) = (lon.unwrap(), lat.unwrap());
            prop_assert!(LONGITUDE_RANGE.0 <= lon && lon <= LONGITUDE_RANGE.1);
            prop_assert!(LATITUDE_RANGE.0 <= lat && lat <= LATITUDE_RANGE.1);
        }
    }
}
