//! CSV export of a coin's feature table.

use crate::domain::error::AdvisorError;
use crate::domain::features::{FEATURE_NAMES, FeatureTable, WINDOW};
use crate::domain::price_series::PriceSeries;
use std::io::Write;

/// Writes one CSV record per feature row, dated by the price point the row
/// predicts. `table` must have been built from `series`.
pub fn write_features<W: Write>(
    series: &PriceSeries,
    table: &FeatureTable,
    writer: W,
) -> Result<(), AdvisorError> {
    let mut wtr = csv::Writer::from_writer(writer);

    let mut header = vec!["date"];
    header.extend(FEATURE_NAMES);
    header.push("target");
    wtr.write_record(&header).map_err(std::io::Error::from)?;

    for (offset, row) in table.rows.iter().enumerate() {
        let date = series
            .points
            .get(WINDOW + offset)
            .map(|p| p.timestamp.format("%Y-%m-%d").to_string())
            .unwrap_or_default();

        let mut record = vec![date];
        record.extend(row.features().iter().map(|v| format!("{v:.6}")));
        record.push(format!("{:.6}", row.target_price));
        wtr.write_record(&record).map_err(std::io::Error::from)?;
    }

    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::features::build_features;
    use crate::domain::price_series::PricePoint;
    use chrono::{TimeZone, Utc};

    fn daily_series(prices: &[f64]) -> PriceSeries {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        PriceSeries::new(
            "bitcoin",
            prices
                .iter()
                .enumerate()
                .map(|(i, &price)| PricePoint {
                    timestamp: start + chrono::Duration::days(i as i64),
                    price,
                })
                .collect(),
        )
    }

    #[test]
    fn writes_header_and_dated_rows() {
        let series = daily_series(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0]);
        let table = build_features(&series);
        let mut out = Vec::new();
        write_features(&series, &table, &mut out).unwrap();

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "date,prev_price,ma3,ma7,volatility3,target");
        assert_eq!(lines.len(), 3);
        assert!(lines[1].starts_with("2024-01-08,7.000000,6.000000,4.000000,"));
        assert!(lines[2].ends_with(",9.000000"));
    }

    #[test]
    fn empty_table_writes_header_only() {
        let series = daily_series(&[1.0, 2.0]);
        let mut out = Vec::new();
        write_features(&series, &FeatureTable::default(), &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap().lines().count(), 1);
    }
}
