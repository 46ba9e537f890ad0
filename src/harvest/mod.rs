//! Paginated, rate-limited retrieval from a remote collection endpoint.
//!
//! The harvester pulls pages on demand and yields schema-validated records
//! one at a time, so downstream enrichment and export run record-by-record
//! without holding the whole result set unless the caller collects it.

pub mod rate;
pub mod schema;

use crate::api::ApiClient;
use crate::config::RateLimitConfig;
use crate::error::Result;
use chrono::{DateTime, Utc};
use self::rate::RateWindow;
use self::schema::{FieldValue, RawRecord, RecordSchema};
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Pull-based harvester over one collection endpoint.
///
/// Pagination advances by the number of items each page actually returned,
/// never by the requested page size, so short pages neither skip nor
/// duplicate records. Restartable only from offset 0: construct a new
/// harvester to re-harvest.
pub struct Harvester<'a> {
    client: &'a ApiClient,
    resource: String,
    schema: RecordSchema,
    page_size: usize,
    rate: RateWindow,
    published_after: Option<(String, DateTime<Utc>)>,
    offset: usize,
    total: Option<usize>,
    buffer: VecDeque<RawRecord>,
    exhausted: bool,
    pages_fetched: usize,
}

impl<'a> Harvester<'a> {
    pub fn new(
        client: &'a ApiClient,
        resource: impl Into<String>,
        schema: RecordSchema,
        page_size: usize,
        rate_limit: RateLimitConfig,
    ) -> Self {
        Self {
            client,
            resource: resource.into(),
            schema,
            page_size: page_size.max(1),
            rate: RateWindow::new(rate_limit.requests, Duration::from_secs(rate_limit.window_secs)),
            published_after: None,
            offset: 0,
            total: None,
            buffer: VecDeque::new(),
            exhausted: false,
            pages_fetched: 0,
        }
    }

    /// Drop records whose `field` timestamp is absent or not after `cutoff`.
    /// Filtering is per-record: a page may yield zero, some, or all of its
    /// records.
    pub fn published_after(mut self, field: impl Into<String>, cutoff: DateTime<Utc>) -> Self {
        self.published_after = Some((field.into(), cutoff));
        self
    }

    /// Total count as reported by the server, once the first page arrived
    pub fn total_count(&self) -> Option<usize> {
        self.total
    }

    pub fn pages_fetched(&self) -> usize {
        self.pages_fetched
    }

    /// Yield the next record, fetching further pages as needed.
    /// Returns `Ok(None)` once the collection is exhausted.
    pub async fn next(&mut self) -> Result<Option<RawRecord>> {
        loop {
            if let Some(record) = self.buffer.pop_front() {
                return Ok(Some(record));
            }
            if self.exhausted {
                return Ok(None);
            }
            self.fetch_page().await?;
        }
    }

    /// Drain the harvester into a vector
    pub async fn collect_all(&mut self) -> Result<Vec<RawRecord>> {
        let mut records = Vec::new();
        while let Some(record) = self.next().await? {
            records.push(record);
        }
        Ok(records)
    }

    async fn fetch_page(&mut self) -> Result<()> {
        if let Some(pause) = self.rate.before_request(Instant::now()) {
            tokio::time::sleep(pause).await;
        }

        let page = self
            .client
            .get_page(&self.resource, self.offset, self.page_size)
            .await?;
        self.pages_fetched += 1;
        self.total = Some(page.total_count);

        let returned = page.len();
        if returned == 0 {
            // Defensive exit: a zero-item page ends the harvest even when
            // the reported total claims more, so an inconsistent server
            // cannot loop us forever.
            self.exhausted = true;
            return Ok(());
        }

        self.offset += returned;
        if self.offset >= page.total_count {
            self.exhausted = true;
        }

        for item in &page.items {
            let record = self.schema.validate(item)?;
            if self.passes_date_filter(&record)? {
                self.buffer.push_back(record);
            }
        }

        Ok(())
    }

    fn passes_date_filter(&self, record: &RawRecord) -> Result<bool> {
        let Some((field, cutoff)) = &self.published_after else {
            return Ok(true);
        };
        match record.get(field)? {
            FieldValue::Timestamp(ts) => Ok(ts > cutoff),
            // A record without the timestamp cannot satisfy the predicate
            _ => Ok(false),
        }
    }
}

/// Fetch a per-item detail endpoint for each listed item, pausing a fixed
/// delay between calls to stay clear of server-side throttling.
///
/// A failed detail call is reported through `on_error` and skipped; it does
/// not abort the run. Returns `(item id, detail items)` pairs for the items
/// that succeeded.
pub async fn fetch_details(
    client: &ApiClient,
    resource: &str,
    sub_resource: &str,
    ids: &[String],
    delay: Duration,
    mut on_error: impl FnMut(&str, &crate::error::Rep365Error),
) -> Result<Vec<(String, Vec<serde_json::Value>)>> {
    let mut results = Vec::new();

    for (i, id) in ids.iter().enumerate() {
        if i > 0 && !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let endpoint = format!("{}/{}/{}", resource, id, sub_resource);
        match client.get::<DetailResponse>(&endpoint).await {
            Ok(detail) => results.push((id.clone(), detail.items)),
            Err(e) => on_error(id, &e),
        }
    }

    Ok(results)
}

#[derive(Debug, serde::Deserialize)]
struct DetailResponse {
    #[serde(default)]
    items: Vec<serde_json::Value>,
}
