//! Typed request helpers on top of [`Connection`].
//!
//! Each helper queues the requests for one logical step (RUN plus the first
//! PULL, BEGIN, COMMIT, a routing table fetch), syncs, and unpacks the
//! replies. Anything queued earlier (TELEMETRY) is answered first and
//! skipped.

use std::collections::HashMap;

use crate::bolt::protocol::{RouteParams, RouteRequest, TxParams};
use crate::bolt::{BoltRequest, PackStreamValue, RoutingInfo, SuccessMessage};
use crate::driver::error::{DriverError, DriverResult};

use super::connection::{Connection, Reply};

/// One fetched batch of a result stream.
#[derive(Debug, Clone, Default)]
pub struct StreamBatch {
    /// Records in arrival order
    pub records: Vec<Vec<PackStreamValue>>,
    /// Summary closing the batch
    pub summary: SuccessMessage,
}

impl StreamBatch {
    /// Whether the server holds more records.
    pub fn has_more(&self) -> bool {
        self.summary.has_more()
    }
}

/// Reply to RUN together with the first batch.
#[derive(Debug, Clone)]
pub struct RunResponse {
    /// Column names
    pub keys: Vec<String>,
    /// Statement id inside an explicit transaction
    pub qid: Option<i64>,
    /// Milliseconds until the first record was available
    pub t_first: Option<i64>,
    /// First batch
    pub batch: StreamBatch,
}

/// Pop the success reply of the latest request in a sync.
fn take_success(
    replies: &mut Vec<Reply>,
    request: &str,
) -> DriverResult<(Vec<Vec<PackStreamValue>>, SuccessMessage)> {
    replies
        .pop()
        .and_then(Reply::into_success)
        .ok_or_else(|| DriverError::protocol(format!("missing SUCCESS for {}", request)))
}

impl Connection {
    /// RUN followed by a PULL of `fetch_size` records (-1 for all).
    pub async fn run(&mut self, run: BoltRequest, fetch_size: i64) -> DriverResult<RunResponse> {
        let pull = self.protocol().pull(fetch_size, None);
        self.enqueue(run)?;
        self.enqueue(pull)?;

        let mut replies = self.sync().await?;
        let (records, summary) = take_success(&mut replies, "PULL")?;
        let (_, run_meta) = take_success(&mut replies, "RUN")?;

        Ok(RunResponse {
            keys: run_meta.fields().unwrap_or_default(),
            qid: run_meta.qid(),
            t_first: run_meta.t_first(),
            batch: StreamBatch { records, summary },
        })
    }

    /// Fetch the next batch of a stream.
    pub async fn pull(&mut self, n: i64, qid: Option<i64>) -> DriverResult<StreamBatch> {
        let pull = self.protocol().pull(n, qid);
        self.enqueue(pull)?;
        let mut replies = self.sync().await?;
        let (records, summary) = take_success(&mut replies, "PULL")?;
        Ok(StreamBatch { records, summary })
    }

    /// Throw away the rest of a stream and return its summary.
    pub async fn discard_all(&mut self, qid: Option<i64>) -> DriverResult<SuccessMessage> {
        let discard = self.protocol().discard(-1, qid);
        self.enqueue(discard)?;
        let mut replies = self.sync().await?;
        Ok(take_success(&mut replies, "DISCARD")?.1)
    }

    /// BEGIN an explicit transaction.
    pub async fn begin(&mut self, tx: &TxParams) -> DriverResult<()> {
        let begin = self.protocol().begin(tx).map_err(|e| self.bolt_error(e))?;
        self.enqueue(begin)?;
        let mut replies = self.sync().await?;
        take_success(&mut replies, "BEGIN")?;
        self.set_database(tx.database.clone());
        Ok(())
    }

    /// COMMIT; returns the new bookmark.
    pub async fn commit(&mut self) -> DriverResult<Option<String>> {
        self.enqueue(BoltRequest::Commit)?;
        let mut replies = self.sync().await?;
        let (_, summary) = take_success(&mut replies, "COMMIT")?;
        Ok(summary.bookmark().map(str::to_string))
    }

    /// ROLLBACK.
    pub async fn rollback(&mut self) -> DriverResult<()> {
        self.enqueue(BoltRequest::Rollback)?;
        let mut replies = self.sync().await?;
        take_success(&mut replies, "ROLLBACK")?;
        Ok(())
    }

    /// Fetch a routing table in whatever form this version supports.
    pub async fn fetch_routing_table(&mut self, params: &RouteParams) -> DriverResult<RoutingInfo> {
        let request = self.protocol().route(params).map_err(|e| self.bolt_error(e))?;
        let address = self.address().to_string();
        let invalid = |e: crate::bolt::PackStreamError| {
            DriverError::protocol(format!("invalid routing table from {}: {}", address, e))
        };

        match request {
            RouteRequest::Message(route) => {
                self.enqueue(route)?;
                let mut replies = self.sync().await?;
                let (_, summary) = take_success(&mut replies, "ROUTE")?;
                summary.routing_table().map_err(invalid)
            }
            RouteRequest::Procedure { run, pull } => {
                self.enqueue(run)?;
                self.enqueue(pull)?;
                let mut replies = self.sync().await?;
                let (records, _) = take_success(&mut replies, "PULL")?;
                let (_, run_meta) = take_success(&mut replies, "RUN")?;

                let keys = run_meta.fields().unwrap_or_default();
                let record = records.into_iter().next().ok_or_else(|| {
                    DriverError::protocol(format!("routing procedure on {} returned no record", address))
                })?;
                let table: HashMap<String, PackStreamValue> = keys.into_iter().zip(record).collect();
                RoutingInfo::from_map(&table).map_err(invalid)
            }
        }
    }
}
