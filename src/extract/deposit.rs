// =============================================================================
// extract/deposit.rs — DEPOSIT TABLES, PUT BACK TOGETHER
// =============================================================================
//
// Each bank's deposit page publishes its rates as two side-by-side tables
// tagged `deposit-interest-table__inner`. The left one usually carries the
// principal brackets ("Ana Para") and the shortest terms, the right one the
// longer terms. Rows correlate only by position.
//
// Headers are a mess. Some columns say "32 Gün", some say "46-91 Gün". A
// bare day count is only an upper bound; its lower bound is whatever comes
// right after the previous column's upper bound. So:
//
//   ["AnaPara", "15", "30", "45"]  ->  ["AnaPara", "1-15", "16-30", "31-45"]
//
// Cells come as "% 45,50", "-" (not offered) or empty (not published).
// =============================================================================

use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info};

use crate::config::Config;
use crate::error::{RateError, RateResult};
use crate::locale;
use crate::metrics::RunStats;
use crate::models::DepositRateRow;
use crate::render::PageFetcher;
use crate::retry::RetryPolicy;

/// CSS selector for the tables that carry deposit rates.
pub const DEPOSIT_TABLE_SELECTOR: &str = "table.deposit-interest-table__inner";

/// Header of the principal bracket column once spaces are removed.
pub const PRINCIPAL_LABEL: &str = "AnaPara";

const MAX_COLSPAN: usize = 64;

/// A table as it appears in the markup: header labels and text cells.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// One principal bracket with its rate per maturity bucket.
#[derive(Debug, Clone, PartialEq)]
pub struct DepositTableRow {
    pub principal_tier: u64,
    /// (maturity bucket, rate) in column order. Unpublished cells are absent.
    pub cells: Vec<(String, f64)>,
}

/// A bank's deposit table after header reconciliation and cell cleanup.
#[derive(Debug, Clone, PartialEq)]
pub struct DepositTable {
    pub bank: String,
    pub maturity_buckets: Vec<String>,
    pub rows: Vec<DepositTableRow>,
}

impl DepositTable {
    /// Build from a joined raw table, validating every maturity label.
    pub fn from_raw(bank: &str, raw: &RawTable) -> RateResult<Self> {
        let labels = reconcile_headers(&raw.headers)?;

        let principal_idx = labels
            .iter()
            .position(|l| l == PRINCIPAL_LABEL)
            .ok_or_else(|| RateError::parse(format!("{bank}: no {PRINCIPAL_LABEL} column")))?;

        for (idx, label) in labels.iter().enumerate() {
            if idx != principal_idx && parse_bucket(label).is_none() {
                return Err(RateError::parse(format!(
                    "{bank}: column {label:?} is not a maturity range"
                )));
            }
        }

        let mut rows = Vec::with_capacity(raw.rows.len());
        for (row_idx, cells) in raw.rows.iter().enumerate() {
            // Short rows are padded: missing trailing cells are unpublished.
            let cell = |idx: usize| cells.get(idx).map(String::as_str).unwrap_or("");

            let principal = cell(principal_idx);
            if principal.trim().is_empty() {
                debug!(bank = bank, row = row_idx, "Row without a principal bracket, skipped");
                continue;
            }
            let principal_tier = locale::upper_bound(principal)?;

            let mut rated = Vec::with_capacity(labels.len() - 1);
            for (idx, label) in labels.iter().enumerate() {
                if idx == principal_idx {
                    continue;
                }
                if let Some(rate) = normalize_cell(cell(idx))? {
                    rated.push((label.clone(), rate));
                }
            }
            rows.push(DepositTableRow { principal_tier, cells: rated });
        }

        let maturity_buckets = labels
            .into_iter()
            .enumerate()
            .filter(|(idx, _)| *idx != principal_idx)
            .map(|(_, label)| label)
            .collect();

        Ok(Self {
            bank: bank.to_string(),
            maturity_buckets,
            rows,
        })
    }

    /// Flatten to one row per (principal tier, maturity bucket), table order.
    pub fn into_rows(self) -> Vec<DepositRateRow> {
        let bank = self.bank;
        self.rows
            .into_iter()
            .flat_map(|row| {
                let bank = bank.clone();
                row.cells.into_iter().map(move |(bucket, rate)| DepositRateRow {
                    bank: bank.clone(),
                    principal_tier: row.principal_tier,
                    maturity_bucket: bucket,
                    rate,
                })
            })
            .collect()
    }
}

/// Pulls deposit rates for one bank at a time.
pub struct DepositExtractor<'a> {
    fetcher: &'a dyn PageFetcher,
    config: &'a Config,
    policy: RetryPolicy,
    stats: &'a RunStats,
}

impl<'a> DepositExtractor<'a> {
    pub fn new(
        fetcher: &'a dyn PageFetcher,
        config: &'a Config,
        policy: RetryPolicy,
        stats: &'a RunStats,
    ) -> Self {
        Self { fetcher, config, policy, stats }
    }

    /// All deposit rows for `short_name`, possibly none.
    pub async fn extract(&self, short_name: &str) -> RateResult<Vec<DepositRateRow>> {
        let url = self.config.deposit_url(short_name);
        let url = url.as_str();
        let label = format!("deposit {short_name}");

        let (result, retries) = self
            .policy
            .run(&label, move || self.attempt(short_name, url))
            .await;
        self.stats.add_retries(retries);

        let rows = result?;
        info!(bank = short_name, rows = rows.len(), "Scraped deposit rates");
        Ok(rows)
    }

    async fn attempt(&self, short_name: &str, url: &str) -> RateResult<Vec<DepositRateRow>> {
        let html = self.fetcher.fetch(url).await?;
        parse_deposit_page(short_name, &html)
    }
}

/// Parse a whole deposit page into rows. Fewer than two tables means the
/// bank publishes nothing usable, which is an empty result, not an error.
pub fn parse_deposit_page(bank: &str, html: &str) -> RateResult<Vec<DepositRateRow>> {
    let tables = parse_tables(html, DEPOSIT_TABLE_SELECTOR)?;
    let found = tables.len();
    let mut tables = tables.into_iter();
    let (Some(left), Some(right)) = (tables.next(), tables.next()) else {
        debug!(bank = bank, tables = found, "No usable deposit tables");
        return Ok(Vec::new());
    };

    let joined = join_by_position(left, right);
    Ok(DepositTable::from_raw(bank, &joined)?.into_rows())
}

/// Every table matching `css` as header labels plus text cells.
///
/// `<th>` and `<td>` cells are read in document order, so row-header layouts
/// keep their first column. A `colspan` cell fills every column it spans.
pub fn parse_tables(html: &str, css: &str) -> RateResult<Vec<RawTable>> {
    let document = Html::parse_document(html);
    let table_sel = selector(css)?;
    let row_sel = selector("tr")?;
    let cell_sel = selector("th, td")?;

    let mut tables = Vec::new();
    for table in document.select(&table_sel) {
        let mut headers: Vec<String> = Vec::new();
        let mut rows: Vec<Vec<String>> = Vec::new();

        for tr in table.select(&row_sel) {
            let mut cells: Vec<String> = Vec::new();
            let mut has_data = false;
            for el in tr.select(&cell_sel) {
                has_data |= el.value().name() == "td";
                let text = cell_text(el);
                cells.extend(std::iter::repeat(text).take(colspan(el)));
            }

            if cells.is_empty() {
                continue;
            }
            if !has_data {
                // Header-only row. The first one names the columns.
                if headers.is_empty() && rows.is_empty() {
                    headers = cells;
                }
            } else {
                rows.push(cells);
            }
        }

        if headers.is_empty() {
            // No header row: the first row doubles as the header, like pandas does.
            if rows.is_empty() {
                continue;
            }
            headers = rows.remove(0);
        }
        tables.push(RawTable { headers, rows });
    }
    Ok(tables)
}

/// Glue two tables side by side. Row count follows the shorter table and
/// columns of `right` whose label already exists in `left` are dropped.
pub fn join_by_position(left: RawTable, right: RawTable) -> RawTable {
    let keep: Vec<usize> = right
        .headers
        .iter()
        .enumerate()
        .filter(|(_, h)| !left.headers.iter().any(|l| clean_label(l) == clean_label(h)))
        .map(|(i, _)| i)
        .collect();

    let left_width = left.headers.len();
    let mut headers = left.headers;
    headers.extend(keep.iter().map(|&i| right.headers[i].clone()));

    // Pad short rows on both sides so right-hand cells land under their own header.
    let rows = left
        .rows
        .into_iter()
        .zip(right.rows)
        .map(|(mut l, r)| {
            l.resize(left_width, String::new());
            l.extend(keep.iter().map(|&i| r.get(i).cloned().unwrap_or_default()));
            l
        })
        .collect();

    RawTable { headers, rows }
}

/// Turn bare day counts into contiguous day ranges (see module header).
pub fn reconcile_headers(headers: &[String]) -> RateResult<Vec<String>> {
    let raw: Vec<String> = headers.iter().map(|h| clean_label(h)).collect();

    let mut fixed = Vec::with_capacity(raw.len());
    for (idx, label) in raw.iter().enumerate() {
        let upper: u64 = match label.parse() {
            Ok(n) if is_digits(label) => n,
            _ => {
                fixed.push(label.clone());
                continue;
            }
        };
        let previous_upper = match idx.checked_sub(1).map(|p| raw[p].as_str()) {
            Some(prev) if is_digits(prev) => prev.parse::<u64>().ok(),
            Some(prev) => parse_bucket(prev).map(|(_, hi)| hi),
            None => None,
        };
        let lower = match previous_upper {
            Some(prev) => prev
                .checked_add(1)
                .ok_or_else(|| RateError::parse(format!("day count {prev} has no successor")))?,
            None => 1,
        };
        fixed.push(format!("{lower}-{upper}"));
    }
    Ok(fixed)
}

/// Columns a cell spans, at most `MAX_COLSPAN`.
fn colspan(el: ElementRef<'_>) -> usize {
    el.value()
        .attr("colspan")
        .and_then(|v| v.trim().parse::<usize>().ok())
        .filter(|&n| n > 0)
        .unwrap_or(1)
        .min(MAX_COLSPAN)
}

/// Normalize one rate cell. `None` means the cell is empty (not published).
pub fn normalize_cell(raw: &str) -> RateResult<Option<f64>> {
    let compact: String = raw
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '\u{a0}')
        .collect();
    if compact.is_empty() {
        return Ok(None);
    }
    if compact == "-" {
        return Ok(Some(0.0));
    }
    let canonical = compact.replace(',', ".").replace('%', "");
    let value: f64 = canonical
        .parse()
        .map_err(|_| RateError::parse(format!("deposit cell {raw:?} is not a rate")))?;
    if !value.is_finite() || value < 0.0 {
        return Err(RateError::parse(format!("deposit cell {raw:?} is out of range")));
    }
    Ok(Some(value))
}

/// "33-45" -> (33, 45); anything else is not a bucket.
pub fn parse_bucket(label: &str) -> Option<(u64, u64)> {
    let (lo, hi) = label.split_once('-')?;
    if !is_digits(lo) || !is_digits(hi) {
        return None;
    }
    let (lo, hi) = (lo.parse().ok()?, hi.parse().ok()?);
    (lo <= hi).then_some((lo, hi))
}

fn clean_label(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace() && *c != '\u{a0}')
        .collect::<String>()
        .replace("Gün", "")
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

fn cell_text(el: ElementRef<'_>) -> String {
    el.text().collect::<Vec<_>>().join(" ").split_whitespace().collect::<Vec<_>>().join(" ")
}

fn selector(css: &str) -> RateResult<Selector> {
    Selector::parse(css).map_err(|e| RateError::parse(format!("bad selector {css:?}: {e}")))
}
