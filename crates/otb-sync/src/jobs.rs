//! The fixed replication job registry: one extraction query and one load
//! definition per dashboard table.
//!
//! Revenue is always normalized to a single currency at the daily rate:
//! local-market bookings convert at the sale-date rate, every other market
//! at the stay-date rate. Pax counts half-rate children at one half.

use serde_json::{json, Value as JsonValue};

use crate::{Load, PivotSpec, SyncJob};
use otb_core::SourceRow;

/// Room-type pivot for the room-nights heatmap. The last column is the
/// all-rooms aggregate and doubles as the grand-total source.
const RN_HEATMAP_SPEC: PivotSpec = PivotSpec {
    period_field: "stay_ay",
    category_field: "pazar",
    sentinel_period: "TOPLAM",
    sentinel_category: "GENEL TOPLAM",
    columns: &[
        ("bungalov_236", "BUNGALOV"),
        ("standart_land_view_57", "STANDART_LAND_VIEW"),
        ("standart_sea_view_70", "STANDART_SEA_VIEW"),
        ("bungalov_aile_133", "BUNGALOV_AILE_ODASI"),
        ("standart_family_8", "STANDART_FAMILY_ROOM"),
        ("suite_4", "SUITE"),
        ("toplam_508", "TUM_ODALAR"),
    ],
};

const TODAY_METRICS_QUERY: &str = r#"
SELECT COUNT(DISTINCT r.reservation_id) AS today_reservations,
       COUNT(*) AS today_rn,
       ROUND(SUM(CASE WHEN r.market = 'Local'
                      THEN r.net_amount / NULLIF(ex_s.day_rate, 0)
                      ELSE r.net_amount / NULLIF(ex_d.day_rate, 0) END), 0) AS today_revenue
FROM reservations r
LEFT JOIN exchange_rates ex_s ON ex_s.rate_date = r.sale_date AND ex_s.currency_id = 1013
LEFT JOIN exchange_rates ex_d ON ex_d.rate_date = r.stay_date AND ex_d.currency_id = 1013
WHERE r.status = 1
  AND r.sale_date = CURRENT_DATE
  AND EXTRACT(YEAR FROM r.stay_date) = 2026
"#;

const MONTHLY_DATA_QUERY: &str = r#"
WITH m AS (
    SELECT lpad(gs::text, 2, '0') AS month_num FROM generate_series(1, 12) gs
),
d2026 AS (
    SELECT to_char(r.stay_date, 'MM') AS month_num,
           COUNT(*) AS total_rn,
           ROUND(SUM(CASE WHEN r.market = 'Local' THEN r.net_amount / NULLIF(ex_s.day_rate, 0)
                          ELSE r.net_amount / NULLIF(ex_d.day_rate, 0) END), 0) AS total_revenue,
           ROUND(SUM(CASE WHEN r.market = 'Local' THEN r.net_amount / NULLIF(ex_s.day_rate, 0)
                          ELSE r.net_amount / NULLIF(ex_d.day_rate, 0) END)
                 / NULLIF(SUM(r.adults + COALESCE(r.children_half, 0) / 2.0), 0), 2) AS avg_rate
    FROM reservations r
    LEFT JOIN exchange_rates ex_s ON ex_s.rate_date = r.sale_date AND ex_s.currency_id = 1013
    LEFT JOIN exchange_rates ex_d ON ex_d.rate_date = r.stay_date AND ex_d.currency_id = 1013
    WHERE r.status = 1 AND EXTRACT(YEAR FROM r.stay_date) = 2026
      AND r.sale_date <= CURRENT_DATE
    GROUP BY to_char(r.stay_date, 'MM')
),
d2025 AS (
    SELECT to_char(r.stay_date, 'MM') AS month_num,
           COUNT(*) AS total_rn_2025,
           ROUND(SUM(CASE WHEN r.market = 'Local' THEN r.net_amount / NULLIF(ex_s.day_rate, 0)
                          ELSE r.net_amount / NULLIF(ex_d.day_rate, 0) END), 0) AS total_revenue_2025,
           ROUND(SUM(CASE WHEN r.market = 'Local' THEN r.net_amount / NULLIF(ex_s.day_rate, 0)
                          ELSE r.net_amount / NULLIF(ex_d.day_rate, 0) END)
                 / NULLIF(SUM(r.adults + COALESCE(r.children_half, 0) / 2.0), 0), 2) AS avg_rate_2025
    FROM reservations r
    LEFT JOIN exchange_rates ex_s ON ex_s.rate_date = r.sale_date AND ex_s.currency_id = 1013
    LEFT JOIN exchange_rates ex_d ON ex_d.rate_date = r.stay_date AND ex_d.currency_id = 1013
    WHERE r.status = 1 AND EXTRACT(YEAR FROM r.stay_date) = 2025
      AND r.sale_date <= CURRENT_DATE - INTERVAL '12 months'
    GROUP BY to_char(r.stay_date, 'MM')
),
d2024 AS (
    SELECT to_char(r.stay_date, 'MM') AS month_num,
           COUNT(*) AS total_rn_2024,
           ROUND(SUM(CASE WHEN r.market = 'Local' THEN r.net_amount / NULLIF(ex_s.day_rate, 0)
                          ELSE r.net_amount / NULLIF(ex_d.day_rate, 0) END), 0) AS total_revenue_2024,
           ROUND(SUM(CASE WHEN r.market = 'Local' THEN r.net_amount / NULLIF(ex_s.day_rate, 0)
                          ELSE r.net_amount / NULLIF(ex_d.day_rate, 0) END)
                 / NULLIF(SUM(r.adults + COALESCE(r.children_half, 0) / 2.0), 0), 2) AS avg_rate_2024
    FROM reservations r
    LEFT JOIN exchange_rates ex_s ON ex_s.rate_date = r.sale_date AND ex_s.currency_id = 1013
    LEFT JOIN exchange_rates ex_d ON ex_d.rate_date = r.stay_date AND ex_d.currency_id = 1013
    WHERE r.status = 1 AND EXTRACT(YEAR FROM r.stay_date) = 2024
      AND r.sale_date <= CURRENT_DATE - INTERVAL '24 months'
    GROUP BY to_char(r.stay_date, 'MM')
),
d2023 AS (
    SELECT to_char(r.stay_date, 'MM') AS month_num,
           COUNT(*) AS total_rn_2023,
           ROUND(SUM(CASE WHEN r.market = 'Local' THEN r.net_amount / NULLIF(ex_s.day_rate, 0)
                          ELSE r.net_amount / NULLIF(ex_d.day_rate, 0) END), 0) AS total_revenue_2023,
           ROUND(SUM(CASE WHEN r.market = 'Local' THEN r.net_amount / NULLIF(ex_s.day_rate, 0)
                          ELSE r.net_amount / NULLIF(ex_d.day_rate, 0) END)
                 / NULLIF(SUM(r.adults + COALESCE(r.children_half, 0) / 2.0), 0), 2) AS avg_rate_2023
    FROM reservations r
    LEFT JOIN exchange_rates ex_s ON ex_s.rate_date = r.sale_date AND ex_s.currency_id = 1013
    LEFT JOIN exchange_rates ex_d ON ex_d.rate_date = r.stay_date AND ex_d.currency_id = 1013
    WHERE r.status = 1 AND EXTRACT(YEAR FROM r.stay_date) = 2023
      AND r.sale_date <= CURRENT_DATE - INTERVAL '36 months'
    GROUP BY to_char(r.stay_date, 'MM')
),
d2022 AS (
    SELECT to_char(r.stay_date, 'MM') AS month_num,
           COUNT(*) AS total_rn_2022,
           ROUND(SUM(CASE WHEN r.market = 'Local' THEN r.net_amount / NULLIF(ex_s.day_rate, 0)
                          ELSE r.net_amount / NULLIF(ex_d.day_rate, 0) END), 0) AS total_revenue_2022,
           ROUND(SUM(CASE WHEN r.market = 'Local' THEN r.net_amount / NULLIF(ex_s.day_rate, 0)
                          ELSE r.net_amount / NULLIF(ex_d.day_rate, 0) END)
                 / NULLIF(SUM(r.adults + COALESCE(r.children_half, 0) / 2.0), 0), 2) AS avg_rate_2022
    FROM reservations r
    LEFT JOIN exchange_rates ex_s ON ex_s.rate_date = r.sale_date AND ex_s.currency_id = 1013
    LEFT JOIN exchange_rates ex_d ON ex_d.rate_date = r.stay_date AND ex_d.currency_id = 1013
    WHERE r.status = 1 AND EXTRACT(YEAR FROM r.stay_date) = 2022
      AND r.sale_date <= CURRENT_DATE - INTERVAL '48 months'
    GROUP BY to_char(r.stay_date, 'MM')
)
SELECT to_char(to_date(m.month_num, 'MM'), 'Mon') AS month_label,
       m.month_num,
       COALESCE(d2026.total_rn, 0) AS total_rn,
       COALESCE(d2026.total_revenue, 0) AS total_revenue,
       COALESCE(d2026.avg_rate, 0) AS avg_rate,
       COALESCE(d2025.total_rn_2025, 0) AS total_rn_2025,
       COALESCE(d2025.total_revenue_2025, 0) AS total_revenue_2025,
       COALESCE(d2025.avg_rate_2025, 0) AS avg_rate_2025,
       COALESCE(d2024.total_rn_2024, 0) AS total_rn_2024,
       COALESCE(d2024.total_revenue_2024, 0) AS total_revenue_2024,
       COALESCE(d2024.avg_rate_2024, 0) AS avg_rate_2024,
       COALESCE(d2023.total_rn_2023, 0) AS total_rn_2023,
       COALESCE(d2023.total_revenue_2023, 0) AS total_revenue_2023,
       COALESCE(d2023.avg_rate_2023, 0) AS avg_rate_2023,
       COALESCE(d2022.total_rn_2022, 0) AS total_rn_2022,
       COALESCE(d2022.total_revenue_2022, 0) AS total_revenue_2022,
       COALESCE(d2022.avg_rate_2022, 0) AS avg_rate_2022
FROM m
LEFT JOIN d2026 ON m.month_num = d2026.month_num
LEFT JOIN d2025 ON m.month_num = d2025.month_num
LEFT JOIN d2024 ON m.month_num = d2024.month_num
LEFT JOIN d2023 ON m.month_num = d2023.month_num
LEFT JOIN d2022 ON m.month_num = d2022.month_num
ORDER BY m.month_num
"#;

const RN_HEATMAP_QUERY: &str = r#"
WITH stays AS (
    SELECT to_char(r.stay_date, 'YYYY-MM') AS stay_ay,
           r.market AS pazar,
           r.room_type AS oda_tipi,
           1 AS rn_oda,
           r.adults + COALESCE(r.children_half, 0) / 2.0 AS pax_hesabi,
           CASE WHEN r.market = 'Local'
                THEN r.net_amount / NULLIF(ex_s.day_rate, 0)
                ELSE r.net_amount / NULLIF(ex_d.day_rate, 0) END AS rev
    FROM reservations r
    LEFT JOIN exchange_rates ex_s ON ex_s.rate_date = r.sale_date AND ex_s.currency_id = 1013
    LEFT JOIN exchange_rates ex_d ON ex_d.rate_date = r.stay_date AND ex_d.currency_id = 1013
    WHERE r.status = 1
      AND r.stay_date >= CURRENT_DATE
      AND EXTRACT(YEAR FROM r.stay_date) IN (2025, 2026)
    UNION ALL
    SELECT to_char(r.stay_date, 'YYYY-MM'),
           r.market,
           'TUM_ODALAR',
           1,
           r.adults + COALESCE(r.children_half, 0) / 2.0,
           CASE WHEN r.market = 'Local'
                THEN r.net_amount / NULLIF(ex_s.day_rate, 0)
                ELSE r.net_amount / NULLIF(ex_d.day_rate, 0) END
    FROM reservations r
    LEFT JOIN exchange_rates ex_s ON ex_s.rate_date = r.sale_date AND ex_s.currency_id = 1013
    LEFT JOIN exchange_rates ex_d ON ex_d.rate_date = r.stay_date AND ex_d.currency_id = 1013
    WHERE r.status = 1
      AND r.stay_date >= CURRENT_DATE
      AND EXTRACT(YEAR FROM r.stay_date) IN (2025, 2026)
),
rolled AS (
    SELECT COALESCE(stay_ay, 'TOPLAM') AS stay_ay,
           COALESCE(pazar, 'GENEL TOPLAM') AS pazar,
           oda_tipi,
           to_char(SUM(rn_oda), 'FM999,990') || ' / ' ||
           to_char(ROUND(SUM(rev) / NULLIF(SUM(pax_hesabi), 0), 2), 'FM999,990.00') AS rn_adb
    FROM stays
    GROUP BY ROLLUP (stay_ay, pazar), oda_tipi
)
SELECT stay_ay,
       pazar,
       MAX(rn_adb) FILTER (WHERE oda_tipi = 'VILLA') AS bungalov_236,
       MAX(rn_adb) FILTER (WHERE oda_tipi = 'OTEL') AS standart_land_view_57,
       MAX(rn_adb) FILTER (WHERE oda_tipi = 'ODNZ') AS standart_sea_view_70,
       MAX(rn_adb) FILTER (WHERE oda_tipi = 'FAM') AS bungalov_aile_133,
       MAX(rn_adb) FILTER (WHERE oda_tipi = 'OFAM') AS standart_family_8,
       MAX(rn_adb) FILTER (WHERE oda_tipi = 'SUIT') AS suite_4,
       MAX(rn_adb) FILTER (WHERE oda_tipi = 'TUM_ODALAR') AS toplam_508
FROM rolled
GROUP BY stay_ay, pazar
ORDER BY CASE WHEN stay_ay = 'TOPLAM' THEN 2 ELSE 1 END, stay_ay,
         CASE WHEN pazar = 'GENEL TOPLAM' THEN 2 ELSE 1 END, pazar
"#;

const ALOS_ADB_HEATMAP_QUERY: &str = r#"
WITH stays AS (
    SELECT to_char(r.stay_date, 'YYYY-MM') AS ay,
           r.market AS pazar,
           r.departure_date - r.arrival_date AS los,
           CASE WHEN r.market = 'Local'
                THEN r.net_amount / NULLIF(ex_s.day_rate, 0)
                ELSE r.net_amount / NULLIF(ex_d.day_rate, 0) END AS rev
    FROM reservations r
    LEFT JOIN exchange_rates ex_s ON ex_s.rate_date = r.sale_date AND ex_s.currency_id = 1013
    LEFT JOIN exchange_rates ex_d ON ex_d.rate_date = r.stay_date AND ex_d.currency_id = 1013
    WHERE r.status = 1
      AND r.departure_date - r.arrival_date > 0
      AND ((EXTRACT(YEAR FROM r.stay_date) = 2025 AND r.sale_date <= CURRENT_DATE - INTERVAL '12 months')
        OR (EXTRACT(YEAR FROM r.stay_date) = 2026 AND r.sale_date <= CURRENT_DATE))
),
cells AS (
    SELECT ay, pazar,
           ROUND(AVG(los), 1) || ' ; ' || ROUND(SUM(rev) / NULLIF(SUM(los), 0), 2) AS alos_adb
    FROM stays
    GROUP BY ay, pazar
)
SELECT pazar,
       MAX(alos_adb) FILTER (WHERE ay = '2025-01') AS jan_25,
       MAX(alos_adb) FILTER (WHERE ay = '2025-02') AS feb_25,
       MAX(alos_adb) FILTER (WHERE ay = '2025-03') AS mar_25,
       MAX(alos_adb) FILTER (WHERE ay = '2025-04') AS apr_25,
       MAX(alos_adb) FILTER (WHERE ay = '2025-05') AS may_25,
       MAX(alos_adb) FILTER (WHERE ay = '2025-06') AS jun_25,
       MAX(alos_adb) FILTER (WHERE ay = '2025-07') AS jul_25,
       MAX(alos_adb) FILTER (WHERE ay = '2025-08') AS aug_25,
       MAX(alos_adb) FILTER (WHERE ay = '2025-09') AS sep_25,
       MAX(alos_adb) FILTER (WHERE ay = '2025-10') AS oct_25,
       MAX(alos_adb) FILTER (WHERE ay = '2025-11') AS nov_25,
       MAX(alos_adb) FILTER (WHERE ay = '2025-12') AS dec_25,
       MAX(alos_adb) FILTER (WHERE ay = '2026-01') AS jan_26,
       MAX(alos_adb) FILTER (WHERE ay = '2026-02') AS feb_26,
       MAX(alos_adb) FILTER (WHERE ay = '2026-03') AS mar_26,
       MAX(alos_adb) FILTER (WHERE ay = '2026-04') AS apr_26,
       MAX(alos_adb) FILTER (WHERE ay = '2026-05') AS may_26,
       MAX(alos_adb) FILTER (WHERE ay = '2026-06') AS jun_26,
       MAX(alos_adb) FILTER (WHERE ay = '2026-07') AS jul_26,
       MAX(alos_adb) FILTER (WHERE ay = '2026-08') AS aug_26,
       MAX(alos_adb) FILTER (WHERE ay = '2026-09') AS sep_26,
       MAX(alos_adb) FILTER (WHERE ay = '2026-10') AS oct_26,
       MAX(alos_adb) FILTER (WHERE ay = '2026-11') AS nov_26,
       MAX(alos_adb) FILTER (WHERE ay = '2026-12') AS dec_26
FROM cells
GROUP BY pazar
ORDER BY pazar
"#;

const BOB_REVENUE_QUERY: &str = r#"
SELECT to_char(r.stay_date, 'MM') AS month_num,
       r.market,
       EXTRACT(YEAR FROM r.stay_date)::int AS year,
       SUM(CASE WHEN r.market = 'Local'
                THEN r.net_amount / NULLIF(ex_s.day_rate, 0)
                ELSE r.net_amount / NULLIF(ex_d.day_rate, 0) END) AS bob_revenue,
       SUM(r.adults + COALESCE(r.children_half, 0) / 2.0) AS bob_pax,
       COUNT(*) AS bob_rn
FROM reservations r
LEFT JOIN exchange_rates ex_s ON ex_s.rate_date = r.sale_date AND ex_s.currency_id = 1013
LEFT JOIN exchange_rates ex_d ON ex_d.rate_date = r.stay_date AND ex_d.currency_id = 1013
WHERE r.status = 1
  AND EXTRACT(YEAR FROM r.stay_date) BETWEEN 2022 AND 2026
  AND r.sale_date <= CURRENT_DATE
      - make_interval(months => 12 * (2026 - EXTRACT(YEAR FROM r.stay_date)::int))
GROUP BY to_char(r.stay_date, 'MM'), r.market, EXTRACT(YEAR FROM r.stay_date)::int
"#;

const TODAY_AGENT_RN_QUERY: &str = r#"
SELECT r.agent_name AS segment,
       COUNT(*) AS rn_count,
       ROUND(SUM(CASE WHEN r.market = 'Local'
                      THEN r.net_amount / NULLIF(ex_s.day_rate, 0)
                      ELSE r.net_amount / NULLIF(ex_d.day_rate, 0) END), 0) AS revenue
FROM reservations r
LEFT JOIN exchange_rates ex_s ON ex_s.rate_date = r.sale_date AND ex_s.currency_id = 1013
LEFT JOIN exchange_rates ex_d ON ex_d.rate_date = r.stay_date AND ex_d.currency_id = 1013
WHERE r.status = 1
  AND r.sale_date = CURRENT_DATE
  AND EXTRACT(YEAR FROM r.stay_date) = 2026
GROUP BY r.agent_name
ORDER BY rn_count DESC
"#;

const TODAY_RN_BY_MONTH_QUERY: &str = r#"
SELECT to_char(r.stay_date, 'MM') AS month_num,
       COUNT(*) AS total_rn,
       ROUND(SUM(CASE WHEN r.market = 'Local'
                      THEN r.net_amount / NULLIF(ex_s.day_rate, 0)
                      ELSE r.net_amount / NULLIF(ex_d.day_rate, 0) END), 0) AS total_revenue,
       ROUND(SUM(CASE WHEN r.market = 'Local'
                      THEN r.net_amount / NULLIF(ex_s.day_rate, 0)
                      ELSE r.net_amount / NULLIF(ex_d.day_rate, 0) END)
             / NULLIF(SUM(r.adults + COALESCE(r.children_half, 0) / 2.0), 0), 2) AS adb
FROM reservations r
LEFT JOIN exchange_rates ex_s ON ex_s.rate_date = r.sale_date AND ex_s.currency_id = 1013
LEFT JOIN exchange_rates ex_d ON ex_d.rate_date = r.stay_date AND ex_d.currency_id = 1013
WHERE r.status = 1
  AND r.sale_date = CURRENT_DATE
  AND EXTRACT(YEAR FROM r.stay_date) = 2026
GROUP BY to_char(r.stay_date, 'MM')
ORDER BY to_char(r.stay_date, 'MM')
"#;

const TODAY_RN_BY_MONTH_MARKET_QUERY: &str = r#"
WITH market_totals AS (
    SELECT r.market, COUNT(*) AS total_rn
    FROM reservations r
    WHERE r.status = 1 AND EXTRACT(YEAR FROM r.stay_date) = 2026
      AND r.sale_date <= CURRENT_DATE
    GROUP BY r.market
    ORDER BY total_rn DESC
    LIMIT 15
),
today_by_month_market AS (
    SELECT to_char(r.stay_date, 'MM') AS month_num, r.market, COUNT(*) AS rn
    FROM reservations r
    WHERE r.status = 1
      AND r.sale_date = CURRENT_DATE
      AND EXTRACT(YEAR FROM r.stay_date) = 2026
      AND r.market IN (SELECT market FROM market_totals)
    GROUP BY to_char(r.stay_date, 'MM'), r.market
)
SELECT t.month_num, t.market, t.rn, mt.total_rn AS market_total
FROM today_by_month_market t
JOIN market_totals mt ON t.market = mt.market
ORDER BY t.month_num, mt.total_rn DESC
"#;

const DAILY_MARKET_RN_QUERY: &str = r#"
WITH market_totals AS (
    SELECT r.market, COUNT(*) AS total_rn
    FROM reservations r
    WHERE r.status = 1 AND EXTRACT(YEAR FROM r.stay_date) = 2026
      AND r.sale_date <= CURRENT_DATE
    GROUP BY r.market
    ORDER BY total_rn DESC
    LIMIT 15
),
daily_data AS (
    SELECT r.stay_date, r.market, COUNT(*) AS rn_count
    FROM reservations r
    WHERE r.status = 1 AND EXTRACT(YEAR FROM r.stay_date) = 2026
      AND r.sale_date <= CURRENT_DATE
      AND r.market IN (SELECT market FROM market_totals)
    GROUP BY r.stay_date, r.market
)
SELECT to_char(dd.stay_date, 'YYYY-MM-DD') AS date_str,
       dd.market,
       dd.rn_count,
       mt.total_rn AS market_total
FROM daily_data dd
JOIN market_totals mt ON dd.market = mt.market
ORDER BY dd.stay_date, mt.total_rn DESC
"#;

const DAILY_MARKET_RN_TOTALS_QUERY: &str = r#"
WITH market_totals AS (
    SELECT r.market, COUNT(*) AS total_rn
    FROM reservations r
    WHERE r.status = 1 AND EXTRACT(YEAR FROM r.stay_date) = 2026
      AND r.sale_date <= CURRENT_DATE
    GROUP BY r.market
    ORDER BY total_rn DESC
    LIMIT 15
)
SELECT EXTRACT(YEAR FROM r.stay_date)::int AS year_num,
       to_char(r.stay_date, 'MM-DD') AS month_day,
       COUNT(*) AS total_rn
FROM reservations r
WHERE r.status = 1
  AND EXTRACT(YEAR FROM r.stay_date) BETWEEN 2022 AND 2025
  AND r.sale_date <= CURRENT_DATE
      - make_interval(months => 12 * (2026 - EXTRACT(YEAR FROM r.stay_date)::int))
  AND r.market IN (SELECT market FROM market_totals)
GROUP BY EXTRACT(YEAR FROM r.stay_date)::int, to_char(r.stay_date, 'MM-DD')
ORDER BY year_num DESC, month_day
"#;

const BOOKING_PACE_QUERY: &str = r#"
WITH m AS (
    SELECT lpad(gs::text, 2, '0') AS month_num FROM generate_series(1, 12) gs
),
last_30_2026 AS (
    SELECT to_char(r.stay_date, 'MM') AS month_num, COUNT(*) AS rn
    FROM reservations r
    WHERE r.status = 1 AND EXTRACT(YEAR FROM r.stay_date) = 2026
      AND r.sale_date > CURRENT_DATE - INTERVAL '30 days'
      AND r.sale_date <= CURRENT_DATE - INTERVAL '15 days'
    GROUP BY to_char(r.stay_date, 'MM')
),
last_15_2026 AS (
    SELECT to_char(r.stay_date, 'MM') AS month_num, COUNT(*) AS rn
    FROM reservations r
    WHERE r.status = 1 AND EXTRACT(YEAR FROM r.stay_date) = 2026
      AND r.sale_date > CURRENT_DATE - INTERVAL '15 days'
    GROUP BY to_char(r.stay_date, 'MM')
),
last_30_2025 AS (
    SELECT to_char(r.stay_date, 'MM') AS month_num, COUNT(*) AS rn
    FROM reservations r
    WHERE r.status = 1 AND EXTRACT(YEAR FROM r.stay_date) = 2025
      AND r.sale_date > CURRENT_DATE - INTERVAL '12 months' - INTERVAL '30 days'
      AND r.sale_date <= CURRENT_DATE - INTERVAL '12 months' - INTERVAL '15 days'
    GROUP BY to_char(r.stay_date, 'MM')
),
last_15_2025 AS (
    SELECT to_char(r.stay_date, 'MM') AS month_num, COUNT(*) AS rn
    FROM reservations r
    WHERE r.status = 1 AND EXTRACT(YEAR FROM r.stay_date) = 2025
      AND r.sale_date > CURRENT_DATE - INTERVAL '12 months' - INTERVAL '15 days'
      AND r.sale_date <= CURRENT_DATE - INTERVAL '12 months'
    GROUP BY to_char(r.stay_date, 'MM')
)
SELECT to_char(to_date(m.month_num, 'MM'), 'Mon') AS month_label,
       m.month_num,
       COALESCE(last_30_2026.rn, 0) AS last_30_days_rn,
       COALESCE(last_15_2026.rn, 0) AS last_15_days_rn,
       COALESCE(last_30_2025.rn, 0) AS last_30_days_2025_rn,
       COALESCE(last_15_2025.rn, 0) AS last_15_days_2025_rn
FROM m
LEFT JOIN last_30_2026 ON m.month_num = last_30_2026.month_num
LEFT JOIN last_15_2026 ON m.month_num = last_15_2026.month_num
LEFT JOIN last_30_2025 ON m.month_num = last_30_2025.month_num
LEFT JOIN last_15_2025 ON m.month_num = last_15_2025.month_num
ORDER BY m.month_num
"#;

const ANNUAL_TARGET_QUERY: &str = r#"
SELECT ROUND(SUM(CASE WHEN r.market = 'Local'
                      THEN r.net_amount / NULLIF(ex_s.day_rate, 0)
                      ELSE r.net_amount / NULLIF(ex_d.day_rate, 0) END), 0) AS total_revenue_2026
FROM reservations r
LEFT JOIN exchange_rates ex_s ON ex_s.rate_date = r.sale_date AND ex_s.currency_id = 1013
LEFT JOIN exchange_rates ex_d ON ex_d.rate_date = r.stay_date AND ex_d.currency_id = 1013
WHERE r.status = 1
  AND EXTRACT(YEAR FROM r.stay_date) = 2026
  AND r.sale_date <= CURRENT_DATE
"#;

const AGENT_PERFORMANCE_QUERY: &str = r#"
WITH detail AS (
    SELECT r.agent_name,
           EXTRACT(YEAR FROM r.stay_date)::int AS year_num,
           CASE WHEN r.market = 'Local'
                THEN r.net_amount / NULLIF(ex_s.day_rate, 0)
                ELSE r.net_amount / NULLIF(ex_d.day_rate, 0) END AS revenue,
           COALESCE(NULLIF(TRIM(r.market), ''), 'Other') AS market
    FROM reservations r
    LEFT JOIN exchange_rates ex_s ON ex_s.rate_date = r.sale_date AND ex_s.currency_id = 1013
    LEFT JOIN exchange_rates ex_d ON ex_d.rate_date = r.stay_date AND ex_d.currency_id = 1013
    WHERE r.status = 1
      AND r.agent_name IS NOT NULL
      AND EXTRACT(YEAR FROM r.stay_date) IN (2025, 2026)
      AND r.sale_date <= CURRENT_DATE
          - make_interval(months => 12 * (2026 - EXTRACT(YEAR FROM r.stay_date)::int))
),
totals AS (
    SELECT agent_name, SUM(revenue) FILTER (WHERE year_num = 2026) AS rev
    FROM detail
    GROUP BY agent_name
),
ranked AS (
    SELECT agent_name, ROW_NUMBER() OVER (ORDER BY rev DESC NULLS LAST) AS rank
    FROM totals
),
top_20 AS (
    SELECT agent_name, rank FROM ranked WHERE rank <= 20
),
agg AS (
    SELECT d.agent_name AS segment,
           d.market,
           t.rank AS agent_order,
           ROUND(SUM(d.revenue) FILTER (WHERE d.year_num = 2026), 0) AS revenue_2026,
           ROUND(SUM(d.revenue) FILTER (WHERE d.year_num = 2025), 0) AS revenue_2025
    FROM detail d
    JOIN top_20 t ON d.agent_name = t.agent_name
    GROUP BY d.agent_name, d.market, t.rank
)
SELECT segment, market, revenue_2026, revenue_2025, agent_order
FROM agg
ORDER BY agent_order, revenue_2026 DESC
"#;

const MARKET_MAINMARKET_QUERY: &str = r#"
WITH detail AS (
    SELECT r.market,
           EXTRACT(YEAR FROM r.stay_date)::int AS year_num,
           CASE WHEN r.market = 'Local'
                THEN r.net_amount / NULLIF(ex_s.day_rate, 0)
                ELSE r.net_amount / NULLIF(ex_d.day_rate, 0) END AS revenue,
           1 AS room_nights
    FROM reservations r
    LEFT JOIN exchange_rates ex_s ON ex_s.rate_date = r.sale_date AND ex_s.currency_id = 1013
    LEFT JOIN exchange_rates ex_d ON ex_d.rate_date = r.stay_date AND ex_d.currency_id = 1013
    WHERE r.status = 1
      AND r.market IS NOT NULL
      AND EXTRACT(YEAR FROM r.stay_date) BETWEEN 2022 AND 2026
      AND r.sale_date <= CURRENT_DATE
          - make_interval(months => 12 * (2026 - EXTRACT(YEAR FROM r.stay_date)::int))
)
SELECT market AS segment,
       ROUND(SUM(revenue) FILTER (WHERE year_num = 2026), 0) AS revenue_2026,
       ROUND(SUM(revenue) FILTER (WHERE year_num = 2025), 0) AS revenue_2025,
       ROUND(SUM(revenue) FILTER (WHERE year_num = 2024), 0) AS revenue_2024,
       ROUND(SUM(revenue) FILTER (WHERE year_num = 2023), 0) AS revenue_2023,
       ROUND(SUM(revenue) FILTER (WHERE year_num = 2022), 0) AS revenue_2022,
       SUM(room_nights) FILTER (WHERE year_num = 2026) AS rn_2026,
       SUM(room_nights) FILTER (WHERE year_num = 2025) AS rn_2025,
       SUM(room_nights) FILTER (WHERE year_num = 2024) AS rn_2024,
       SUM(room_nights) FILTER (WHERE year_num = 2023) AS rn_2023,
       SUM(room_nights) FILTER (WHERE year_num = 2022) AS rn_2022
FROM detail
GROUP BY market
ORDER BY market
"#;

fn shape_today_metrics(row: &SourceRow) -> JsonValue {
    json!({
        "today_reservations": row.i64_or_zero("today_reservations"),
        "today_rn": row.i64_or_zero("today_rn"),
        "today_revenue": row.f64_or_zero("today_revenue"),
    })
}

fn shape_monthly(rows: &[SourceRow]) -> Vec<JsonValue> {
    rows.iter()
        .map(|r| {
            json!({
                "month_num": r.text_or_empty("month_num"),
                "month_label": r.text_or_empty("month_label"),
                "total_rn": r.i64_or_zero("total_rn"),
                "total_revenue": r.f64_or_zero("total_revenue"),
                "avg_rate": r.f64_or_zero("avg_rate"),
                "total_rn_2025": r.i64_or_zero("total_rn_2025"),
                "total_revenue_2025": r.f64_or_zero("total_revenue_2025"),
                "avg_rate_2025": r.f64_or_zero("avg_rate_2025"),
                "total_rn_2024": r.i64_or_zero("total_rn_2024"),
                "total_revenue_2024": r.f64_or_zero("total_revenue_2024"),
                "avg_rate_2024": r.f64_or_zero("avg_rate_2024"),
                "total_rn_2023": r.i64_or_zero("total_rn_2023"),
                "total_revenue_2023": r.f64_or_zero("total_revenue_2023"),
                "avg_rate_2023": r.f64_or_zero("avg_rate_2023"),
                "total_rn_2022": r.i64_or_zero("total_rn_2022"),
                "total_revenue_2022": r.f64_or_zero("total_revenue_2022"),
                "avg_rate_2022": r.f64_or_zero("avg_rate_2022"),
            })
        })
        .collect()
}

/// Rows must carry a month and a plausible year; a bare single-digit month
/// is zero-padded so sink keys sort lexicographically.
fn shape_bob(rows: &[SourceRow]) -> Vec<JsonValue> {
    rows.iter()
        .filter_map(|r| {
            let mut month_num = r.text_or_empty("month_num");
            if month_num.len() == 1 {
                month_num.insert(0, '0');
            }
            let year = r.i64_or_zero("year");
            if month_num.is_empty() || !(2022..=2026).contains(&year) {
                return None;
            }
            Some(json!({
                "month_num": month_num,
                "market": r.text_or_empty("market"),
                "year": year,
                "bob_revenue": r.f64_or_zero("bob_revenue"),
                "bob_pax": r.i64_or_zero("bob_pax"),
                "bob_rn": r.i64_or_zero("bob_rn"),
            }))
        })
        .collect()
}

fn shape_today_agent_rn(rows: &[SourceRow]) -> Vec<JsonValue> {
    rows.iter()
        .map(|r| {
            json!({
                "segment": r.text_or_empty("segment"),
                "rn_count": r.i64_or_zero("rn_count"),
                "revenue": r.f64_or_zero("revenue"),
            })
        })
        .collect()
}

fn shape_today_rn_by_month(rows: &[SourceRow]) -> Vec<JsonValue> {
    rows.iter()
        .map(|r| {
            json!({
                "month_num": r.text_or_empty("month_num"),
                "total_rn": r.i64_or_zero("total_rn"),
                "total_revenue": r.f64_or_zero("total_revenue"),
                "adb": r.f64_or_zero("adb"),
            })
        })
        .collect()
}

fn shape_today_rn_by_month_market(rows: &[SourceRow]) -> Vec<JsonValue> {
    rows.iter()
        .map(|r| {
            json!({
                "month_num": r.text_or_empty("month_num"),
                "market": r.text_or_empty("market"),
                "rn": r.i64_or_zero("rn"),
                "market_total": r.i64_or_zero("market_total"),
            })
        })
        .collect()
}

fn shape_daily_market_rn(rows: &[SourceRow]) -> Vec<JsonValue> {
    rows.iter()
        .map(|r| {
            json!({
                "date_str": r.text_or_empty("date_str"),
                "market": r.text_or_empty("market"),
                "rn_count": r.i64_or_zero("rn_count"),
                "market_total": r.i64_or_zero("market_total"),
            })
        })
        .collect()
}

fn shape_daily_market_rn_totals(rows: &[SourceRow]) -> Vec<JsonValue> {
    rows.iter()
        .map(|r| {
            json!({
                "year_num": r.i64_or_zero("year_num"),
                "month_day": r.text_or_empty("month_day"),
                "total_rn": r.i64_or_zero("total_rn"),
            })
        })
        .collect()
}

fn shape_booking_pace(rows: &[SourceRow]) -> Vec<JsonValue> {
    rows.iter()
        .map(|r| {
            json!({
                "month_num": r.text_or_empty("month_num"),
                "month_label": r.text_or_empty("month_label"),
                "last_30_days_rn": r.i64_or_zero("last_30_days_rn"),
                "last_15_days_rn": r.i64_or_zero("last_15_days_rn"),
                "last_30_days_2025_rn": r.i64_or_zero("last_30_days_2025_rn"),
                "last_15_days_2025_rn": r.i64_or_zero("last_15_days_2025_rn"),
            })
        })
        .collect()
}

fn shape_annual_target(row: &SourceRow) -> JsonValue {
    json!({ "total_revenue_2026": row.f64_or_zero("total_revenue_2026") })
}

fn shape_agent_performance(rows: &[SourceRow]) -> Vec<JsonValue> {
    rows.iter()
        .map(|r| {
            json!({
                "segment": r.text_or_empty("segment"),
                "market": r.text_or_empty("market"),
                "revenue_2026": r.f64_or_zero("revenue_2026"),
                "revenue_2025": r.f64_or_zero("revenue_2025"),
                "agent_order": r.i64_or_zero("agent_order"),
            })
        })
        .collect()
}

fn shape_market_mainmarket(rows: &[SourceRow]) -> Vec<JsonValue> {
    rows.iter()
        .map(|r| {
            json!({
                "segment": r.text_or_empty("segment"),
                "revenue_2026": r.f64_or_zero("revenue_2026"),
                "revenue_2025": r.f64_or_zero("revenue_2025"),
                "revenue_2024": r.f64_or_zero("revenue_2024"),
                "revenue_2023": r.f64_or_zero("revenue_2023"),
                "revenue_2022": r.f64_or_zero("revenue_2022"),
                "rn_2026": r.i64_or_zero("rn_2026"),
                "rn_2025": r.i64_or_zero("rn_2025"),
                "rn_2024": r.i64_or_zero("rn_2024"),
                "rn_2023": r.i64_or_zero("rn_2023"),
                "rn_2022": r.i64_or_zero("rn_2022"),
            })
        })
        .collect()
}

static JOBS: [SyncJob; 14] = [
    SyncJob {
        name: "today_metrics",
        query: TODAY_METRICS_QUERY,
        load: Load::SingleRow {
            table: "today_metrics",
            shape: shape_today_metrics,
        },
    },
    SyncJob {
        name: "monthly_data",
        query: MONTHLY_DATA_QUERY,
        load: Load::Table {
            table: "monthly_data",
            shape: shape_monthly,
        },
    },
    SyncJob {
        name: "rn_heatmap",
        query: RN_HEATMAP_QUERY,
        load: Load::Pivot {
            table: "rn_heatmap",
            meta_table: "rn_heatmap_meta",
            meta_key: "year_total_rn",
            spec: RN_HEATMAP_SPEC,
        },
    },
    SyncJob {
        name: "alos_adb_heatmap",
        query: ALOS_ADB_HEATMAP_QUERY,
        load: Load::Bundle {
            table: "alos_adb_heatmap",
        },
    },
    SyncJob {
        name: "bob_revenue_analysis",
        query: BOB_REVENUE_QUERY,
        load: Load::Table {
            table: "bob_revenue_analysis",
            shape: shape_bob,
        },
    },
    SyncJob {
        name: "today_agent_rn",
        query: TODAY_AGENT_RN_QUERY,
        load: Load::Table {
            table: "today_agent_rn",
            shape: shape_today_agent_rn,
        },
    },
    SyncJob {
        name: "today_rn_by_month",
        query: TODAY_RN_BY_MONTH_QUERY,
        load: Load::Table {
            table: "today_rn_by_month",
            shape: shape_today_rn_by_month,
        },
    },
    SyncJob {
        name: "today_rn_by_month_market",
        query: TODAY_RN_BY_MONTH_MARKET_QUERY,
        load: Load::Table {
            table: "today_rn_by_month_market",
            shape: shape_today_rn_by_month_market,
        },
    },
    SyncJob {
        name: "daily_market_rn",
        query: DAILY_MARKET_RN_QUERY,
        load: Load::Table {
            table: "daily_market_rn",
            shape: shape_daily_market_rn,
        },
    },
    SyncJob {
        name: "daily_market_rn_totals",
        query: DAILY_MARKET_RN_TOTALS_QUERY,
        load: Load::Table {
            table: "daily_market_rn_totals",
            shape: shape_daily_market_rn_totals,
        },
    },
    SyncJob {
        name: "booking_pace",
        query: BOOKING_PACE_QUERY,
        load: Load::Table {
            table: "booking_pace",
            shape: shape_booking_pace,
        },
    },
    SyncJob {
        name: "annual_target",
        query: ANNUAL_TARGET_QUERY,
        load: Load::SingleRow {
            table: "annual_target",
            shape: shape_annual_target,
        },
    },
    SyncJob {
        name: "agent_performance",
        query: AGENT_PERFORMANCE_QUERY,
        load: Load::Table {
            table: "agent_performance",
            shape: shape_agent_performance,
        },
    },
    SyncJob {
        name: "market_mainmarket",
        query: MARKET_MAINMARKET_QUERY,
        load: Load::Table {
            table: "market_mainmarket",
            shape: shape_market_mainmarket,
        },
    },
];

pub fn registry() -> &'static [SyncJob] {
    &JOBS
}

pub fn find(name: &str) -> Option<&'static SyncJob> {
    JOBS.iter().find(|job| job.name == name)
}
