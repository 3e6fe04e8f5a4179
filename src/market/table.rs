use crate::errors::{EngineError, EngineResult};
use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};

/// A single dated price column. `None` marks a missing trading day.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriceSeries {
    pub dates: Vec<NaiveDate>,
    pub prices: Vec<Option<f64>>,
}

impl PriceSeries {
    pub fn new(dates: Vec<NaiveDate>, prices: Vec<Option<f64>>) -> Self {
        Self { dates, prices }
    }

    pub fn is_empty(&self) -> bool {
        self.prices.iter().all(Option::is_none)
    }

    #[inline]
    fn price_on(&self, date: NaiveDate) -> Option<f64> {
        self.dates
            .binary_search(&date)
            .ok()
            .and_then(|idx| self.prices[idx])
    }
}

/// Simple period-over-period returns for one ticker, dated at the later observation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReturnSeries {
    pub dates: Vec<NaiveDate>,
    pub values: Vec<f64>,
}

impl ReturnSeries {
    /// Differences consecutive valid observations. Gaps are dropped before
    /// differencing, so a return may span a missing day. Returns off a zero
    /// price are not finite and are skipped.
    pub fn from_prices(dates: &[NaiveDate], prices: &[Option<f64>]) -> Self {
        let mut out = ReturnSeries::default();
        let mut prev: Option<f64> = None;

        for (date, price) in dates.iter().zip(prices) {
            let Some(price) = *price else { continue };
            if let Some(p0) = prev {
                let r = price / p0 - 1.0;
                if r.is_finite() {
                    out.dates.push(*date);
                    out.values.push(r);
                }
            }
            prev = Some(price);
        }

        out
    }

    pub fn from_series(series: &PriceSeries) -> Self {
        Self::from_prices(&series.dates, &series.prices)
    }

    #[inline]
    pub fn value_on(&self, date: NaiveDate) -> Option<f64> {
        self.dates
            .binary_search(&date)
            .ok()
            .map(|idx| self.values[idx])
    }
}

/// Returns of every column restricted to the dates where all columns have one.
/// `rows[i][j]` is the return of column `j` on `dates[i]`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AlignedReturns {
    pub dates: Vec<NaiveDate>,
    pub rows: Vec<Vec<f64>>,
}

impl AlignedReturns {
    /// Column-major copy, one vector per ticker.
    pub fn columns(&self, width: usize) -> Vec<Vec<f64>> {
        (0..width)
            .map(|j| self.rows.iter().map(|row| row[j]).collect())
            .collect()
    }
}

/// Date-indexed table of adjusted closes. Rows are strictly increasing dates,
/// columns are unique tickers. Read-only once built.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriceTable {
    dates: Vec<NaiveDate>,
    tickers: Vec<String>,
    columns: Vec<Vec<Option<f64>>>,
}

impl PriceTable {
    pub fn new(
        dates: Vec<NaiveDate>,
        tickers: Vec<String>,
        columns: Vec<Vec<Option<f64>>>,
    ) -> EngineResult<Self> {
        if tickers.len() != columns.len() {
            return Err(EngineError::InvalidTable(format!(
                "{} tickers but {} columns",
                tickers.len(),
                columns.len()
            )));
        }

        if dates.windows(2).any(|w| w[0] >= w[1]) {
            return Err(EngineError::InvalidTable(
                "dates must be strictly increasing".into(),
            ));
        }

        let mut seen = BTreeSet::new();
        for t in &tickers {
            if !seen.insert(t.as_str()) {
                return Err(EngineError::InvalidTable(format!("duplicate ticker {t}")));
            }
        }

        for (t, col) in tickers.iter().zip(&columns) {
            if col.len() != dates.len() {
                return Err(EngineError::InvalidTable(format!(
                    "column {t} has {} rows, expected {}",
                    col.len(),
                    dates.len()
                )));
            }
            if col.iter().flatten().any(|p| *p < 0.0 || !p.is_finite()) {
                return Err(EngineError::InvalidTable(format!(
                    "column {t} has a negative or non-finite price"
                )));
            }
        }

        Ok(Self {
            dates,
            tickers,
            columns,
        })
    }

    /// Outer-joins per-ticker series on date. Empty series contribute no
    /// column; rows where every column is missing are dropped.
    pub fn from_series(series: Vec<(String, PriceSeries)>) -> EngineResult<Self> {
        let series: Vec<(String, PriceSeries)> =
            series.into_iter().filter(|(_, s)| !s.is_empty()).collect();

        let all_dates: BTreeSet<NaiveDate> = series
            .iter()
            .flat_map(|(_, s)| {
                s.dates
                    .iter()
                    .zip(&s.prices)
                    .filter(|(_, p)| p.is_some())
                    .map(|(d, _)| *d)
            })
            .collect();
        let dates: Vec<NaiveDate> = all_dates.into_iter().collect();

        let tickers = series.iter().map(|(t, _)| t.clone()).collect();
        let columns = series
            .iter()
            .map(|(_, s)| dates.iter().map(|d| s.price_on(*d)).collect())
            .collect();

        Self::new(dates, tickers, columns)
    }

    /// No rows or no columns.
    pub fn is_empty(&self) -> bool {
        self.dates.is_empty() || self.tickers.is_empty()
    }

    pub fn tickers(&self) -> &[String] {
        &self.tickers
    }

    pub fn width(&self) -> usize {
        self.tickers.len()
    }

    pub fn start_date(&self) -> Option<NaiveDate> {
        self.dates.first().copied()
    }

    pub fn end_date(&self) -> Option<NaiveDate> {
        self.dates.last().copied()
    }

    /// Last known price per ticker after forward-filling gaps.
    /// Columns without a single observation are absent from the map.
    pub fn last_prices(&self) -> BTreeMap<String, f64> {
        self.tickers
            .iter()
            .zip(&self.columns)
            .filter_map(|(t, col)| col.iter().rev().flatten().next().map(|p| (t.clone(), *p)))
            .collect()
    }

    /// Own full return history of the column at `idx`.
    pub fn returns(&self, idx: usize) -> ReturnSeries {
        ReturnSeries::from_prices(&self.dates, &self.columns[idx])
    }

    pub fn column_returns(&self) -> Vec<ReturnSeries> {
        (0..self.width()).map(|idx| self.returns(idx)).collect()
    }

    /// Inner join of every column's return series on date.
    pub fn aligned_returns(&self) -> AlignedReturns {
        let series = self.column_returns();
        let Some((first, rest)) = series.split_first() else {
            return AlignedReturns::default();
        };

        let mut aligned = AlignedReturns::default();
        for (date, r0) in first.dates.iter().zip(&first.values) {
            let mut row = Vec::with_capacity(series.len());
            row.push(*r0);
            for s in rest {
                match s.value_on(*date) {
                    Some(r) => row.push(r),
                    None => break,
                }
            }
            if row.len() == series.len() {
                aligned.dates.push(*date);
                aligned.rows.push(row);
            }
        }

        aligned
    }
}
