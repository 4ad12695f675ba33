//! Wide-to-long reshaping of pivoted heatmap rows.

use otb_core::{parse_measure_cell, HeatmapRecord, Scalar, SourceRow};

/// Declares how one pivoted row set maps onto normalized records.
///
/// `columns` pairs each pivoted column key with the sub-category it stands
/// for; the *last* declared column doubles as the source of the grand-total
/// sentinel value.
#[derive(Debug, Clone, Copy)]
pub struct PivotSpec {
    pub period_field: &'static str,
    pub category_field: &'static str,
    pub sentinel_period: &'static str,
    pub sentinel_category: &'static str,
    pub columns: &'static [(&'static str, &'static str)],
}

/// Output of one reshape pass.
#[derive(Debug, Clone, Default)]
pub struct Reshaped {
    pub records: Vec<HeatmapRecord>,
    pub sentinel: Option<i64>,
}

/// Reshape wide pivoted rows into long-format records.
///
/// A row whose dimensions both carry the reserved sentinel values contributes
/// no records; its last-column measure (rounded count) becomes `sentinel`.
/// Cells that fail to decode, or decode to an all-zero pair, are dropped.
/// Emission order is insertion order over `(row, column)` pairs.
pub fn reshape(rows: &[SourceRow], spec: &PivotSpec) -> Reshaped {
    let mut out = Reshaped::default();
    let Some((last_column, _)) = spec.columns.last() else {
        return out;
    };

    for row in rows {
        let Some(period) = dimension(row, spec.period_field) else {
            continue;
        };
        let Some(category) = dimension(row, spec.category_field) else {
            continue;
        };

        if period == spec.sentinel_period && category == spec.sentinel_category {
            if let Some(pair) = cell(row, last_column) {
                out.sentinel = Some(pair.count.round() as i64);
            }
            continue;
        }

        for (column, sub_category) in spec.columns {
            let Some(pair) = cell(row, column) else {
                continue;
            };
            if pair.count > 0.0 || pair.rate > 0.0 {
                out.records.push(HeatmapRecord {
                    month_key: period.to_string(),
                    market: category.to_string(),
                    room_type: (*sub_category).to_string(),
                    rn: pair.count,
                    price: pair.rate,
                });
            }
        }
    }
    out
}

fn dimension<'a>(row: &'a SourceRow, field: &str) -> Option<&'a str> {
    row.get(field)
        .and_then(Scalar::as_text)
        .filter(|s| !s.is_empty())
}

fn cell(row: &SourceRow, column: &str) -> Option<otb_core::MeasurePair> {
    row.get(column).and_then(parse_measure_cell)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SPEC: PivotSpec = PivotSpec {
        period_field: "stay_ay",
        category_field: "pazar",
        sentinel_period: "TOTAL",
        sentinel_category: "GRAND TOTAL",
        columns: &[("villa", "BUNGALOV"), ("toplam_508", "TUM_ODALAR")],
    };

    fn row(pairs: &[(&str, &str)]) -> SourceRow {
        SourceRow::from_pairs(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), Scalar::Text(v.to_string()))),
        )
    }

    #[test]
    fn wide_row_expands_to_long_records() {
        let rows = vec![row(&[
            ("STAY_AY", "2026-01"),
            ("PAZAR", "Local"),
            ("VILLA", "10 / 200.00"),
        ])];
        let reshaped = reshape(&rows, &SPEC);

        assert_eq!(reshaped.sentinel, None);
        assert_eq!(reshaped.records.len(), 1);
        let record = &reshaped.records[0];
        assert_eq!(record.month_key, "2026-01");
        assert_eq!(record.market, "Local");
        assert_eq!(record.room_type, "BUNGALOV");
        assert_eq!(record.rn, 10.0);
        assert_eq!(record.price, 200.0);
    }

    #[test]
    fn sentinel_row_feeds_the_total_and_emits_nothing() {
        let rows = vec![
            row(&[
                ("stay_ay", "TOTAL"),
                ("pazar", "GRAND TOTAL"),
                ("villa", "999 / 1.00"),
                ("toplam_508", "120,508 / 175.25"),
            ]),
            row(&[
                ("stay_ay", "2026-02"),
                ("pazar", "Russia"),
                ("villa", "3 / 150.00"),
            ]),
        ];
        let reshaped = reshape(&rows, &SPEC);

        assert_eq!(reshaped.sentinel, Some(120_508));
        assert_eq!(reshaped.records.len(), 1);
        assert!(reshaped.records.iter().all(|r| r.month_key != "TOTAL"));
    }

    #[test]
    fn zero_and_unparseable_cells_are_dropped() {
        let rows = vec![row(&[
            ("stay_ay", "2026-03"),
            ("pazar", "Local"),
            ("villa", "0 / 0.00"),
            ("toplam_508", "not a cell"),
        ])];
        let reshaped = reshape(&rows, &SPEC);
        assert!(reshaped.records.is_empty());
        assert!(reshaped
            .records
            .iter()
            .all(|r| r.rn > 0.0 || r.price > 0.0));
    }

    #[test]
    fn rows_missing_a_dimension_are_skipped() {
        let rows = vec![
            row(&[("pazar", "Local"), ("villa", "5 / 10.00")]),
            row(&[("stay_ay", "2026-04"), ("villa", "5 / 10.00")]),
        ];
        assert!(reshape(&rows, &SPEC).records.is_empty());
    }

    #[test]
    fn reshaping_is_idempotent_over_the_same_rows() {
        let rows = vec![
            row(&[
                ("stay_ay", "2026-01"),
                ("pazar", "Local"),
                ("villa", "10 / 200.00"),
                ("toplam_508", "12 / 180.00"),
            ]),
            row(&[
                ("stay_ay", "2026-01"),
                ("pazar", "Russia"),
                ("villa", "4 / 90.00"),
            ]),
        ];
        let first = reshape(&rows, &SPEC);
        let second = reshape(&rows, &SPEC);
        assert_eq!(first.records, second.records);
        assert_eq!(first.sentinel, second.sentinel);
    }

    #[test]
    fn emission_follows_row_then_column_order() {
        let rows = vec![
            row(&[
                ("stay_ay", "2026-01"),
                ("pazar", "Local"),
                ("villa", "1 / 1.00"),
                ("toplam_508", "2 / 2.00"),
            ]),
            row(&[
                ("stay_ay", "2026-02"),
                ("pazar", "Local"),
                ("villa", "3 / 3.00"),
            ]),
        ];
        let reshaped = reshape(&rows, &SPEC);
        let kinds: Vec<(&str, &str)> = reshaped
            .records
            .iter()
            .map(|r| (r.month_key.as_str(), r.room_type.as_str()))
            .collect();
        assert_eq!(
            kinds,
            vec![
                ("2026-01", "BUNGALOV"),
                ("2026-01", "TUM_ODALAR"),
                ("2026-02", "BUNGALOV"),
            ]
        );
    }
}
