//! Record - 쿼리 결과 레코드
//!
//! 레코드, 결과 요약, 결과 커서
//!
//! 결과는 `fetch_size`개씩 PULL로 가져오며, 서버가 `has_more`를 보내는 동안
//! 다음 배치를 요청합니다. [`QueryResult`]는 모두 받아 둔 결과,
//! [`RecordStream`]은 소비하는 만큼만 가져오는 자동 커밋 결과입니다.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, Stream};

use crate::bolt::packstream::StructDialect;
use crate::bolt::{Notification, PackStreamValue, SuccessMessage};

use super::bolt::{Connection, RunResponse, StreamBatch};
use super::driver::ServerInfo;
use super::error::{DriverError, DriverResult};
use super::pool::PooledConnection;
use super::session::{Query, SessionShared};
use super::types::{Node, Path, Relationship, Value};

/// 쿼리 통계
pub use crate::bolt::QueryStats as Counters;

// ============================================================================
// Record - 단일 레코드
// ============================================================================

/// 쿼리 결과 레코드
#[derive(Debug, Clone)]
pub struct Record {
    /// 컬럼 키
    keys: Vec<String>,
    /// 값들
    values: Vec<Value>,
    /// 키-인덱스 매핑
    key_index: HashMap<String, usize>,
}

impl Record {
    /// 새 레코드 생성
    pub fn new(keys: Vec<String>, values: Vec<Value>) -> Self {
        let key_index = keys
            .iter()
            .enumerate()
            .map(|(i, k)| (k.clone(), i))
            .collect();

        Self {
            keys,
            values,
            key_index,
        }
    }

    /// 서버 필드를 해석해 레코드 생성
    pub(crate) fn hydrate(
        keys: Vec<String>,
        fields: Vec<PackStreamValue>,
        dialect: StructDialect,
    ) -> DriverResult<Self> {
        if fields.len() != keys.len() {
            return Err(DriverError::protocol(format!(
                "Record has {} fields but the result has {} keys",
                fields.len(),
                keys.len()
            )));
        }
        let values = fields
            .into_iter()
            .map(|v| Value::hydrate(v, dialect))
            .collect::<DriverResult<Vec<_>>>()?;
        Ok(Self::new(keys, values))
    }

    /// 키 목록
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    /// 값 목록
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// 레코드 길이
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// 빈 레코드 여부
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// 키로 값 가져오기
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.key_index.get(key).and_then(|&i| self.values.get(i))
    }

    /// 인덱스로 값 가져오기
    pub fn get_by_index(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// 키로 타입 변환된 값 가져오기
    pub fn get_as<T>(&self, key: &str) -> DriverResult<T>
    where
        T: TryFrom<Value, Error = DriverError>,
    {
        self.get(key)
            .cloned()
            .ok_or_else(|| DriverError::type_conversion(format!("Key '{}' not found", key)))
            .and_then(|v| T::try_from(v))
    }

    /// Integer 값 가져오기
    pub fn get_int(&self, key: &str) -> DriverResult<i64> {
        self.get_as::<i64>(key)
    }

    /// String 값 가져오기
    pub fn get_string(&self, key: &str) -> DriverResult<String> {
        self.get_as::<String>(key)
    }

    /// Node 값 가져오기
    pub fn get_node(&self, key: &str) -> DriverResult<Node> {
        self.get_as::<Node>(key)
    }

    /// Relationship 값 가져오기
    pub fn get_relationship(&self, key: &str) -> DriverResult<Relationship> {
        self.get_as::<Relationship>(key)
    }

    /// Path 값 가져오기
    pub fn get_path(&self, key: &str) -> DriverResult<Path> {
        self.get_as::<Path>(key)
    }

    /// Optional 값 가져오기 (None은 Null)
    pub fn get_optional<T>(&self, key: &str) -> DriverResult<Option<T>>
    where
        T: TryFrom<Value, Error = DriverError>,
    {
        match self.get(key) {
            Some(Value::Null) | None => Ok(None),
            Some(v) => T::try_from(v.clone()).map(Some),
        }
    }

    /// Map으로 변환
    pub fn to_map(&self) -> HashMap<String, Value> {
        self.keys
            .iter()
            .cloned()
            .zip(self.values.iter().cloned())
            .collect()
    }

    /// 키 존재 여부
    pub fn contains_key(&self, key: &str) -> bool {
        self.key_index.contains_key(key)
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pairs: Vec<String> = self
            .keys
            .iter()
            .zip(self.values.iter())
            .map(|(k, v)| format!("{}: {}", k, v))
            .collect();
        write!(f, "{{{}}}", pairs.join(", "))
    }
}

impl IntoIterator for Record {
    type Item = (String, Value);
    type IntoIter = std::iter::Zip<std::vec::IntoIter<String>, std::vec::IntoIter<Value>>;

    fn into_iter(self) -> Self::IntoIter {
        self.keys.into_iter().zip(self.values)
    }
}

// ============================================================================
// ResultSummary - 결과 요약
// ============================================================================

/// 쿼리 타입
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueryType {
    /// 읽기 전용
    #[default]
    ReadOnly,
    /// 읽기/쓰기
    ReadWrite,
    /// 쓰기 전용
    WriteOnly,
    /// 스키마 변경
    SchemaWrite,
}

impl QueryType {
    /// 서버 표기 ("r", "rw", "w", "s") 해석
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "r" => Some(Self::ReadOnly),
            "rw" => Some(Self::ReadWrite),
            "w" => Some(Self::WriteOnly),
            "s" => Some(Self::SchemaWrite),
            _ => None,
        }
    }
}

/// 결과 요약
#[derive(Debug, Clone)]
pub struct ResultSummary {
    /// 쿼리
    pub query: Query,
    /// 쿼리 타입
    pub query_type: QueryType,
    /// 카운터
    pub counters: Counters,
    /// 첫 레코드까지 걸린 시간
    pub result_available_after: Option<Duration>,
    /// 마지막 레코드까지 걸린 시간
    pub result_consumed_after: Option<Duration>,
    /// 쿼리가 실행된 데이터베이스
    pub database: Option<String>,
    /// 서버 정보
    pub server: ServerInfo,
    /// 알림
    pub notifications: Vec<Notification>,
    /// 자동 커밋이 남긴 북마크
    pub bookmark: Option<String>,
}

/// 요약을 만드는 데 필요한, 스트림 시작 시점의 정보
#[derive(Debug, Clone)]
pub(crate) struct SummaryContext {
    pub query: Query,
    pub t_first: Option<i64>,
    pub server: ServerInfo,
    pub database: Option<String>,
}

impl SummaryContext {
    pub(crate) fn for_connection(query: Query, t_first: Option<i64>, conn: &Connection) -> Self {
        Self {
            query,
            t_first,
            server: ServerInfo::of(conn),
            database: conn.database().map(str::to_string),
        }
    }

    fn summarize(&self, metadata: &SuccessMessage) -> ResultSummary {
        let millis = |ms: i64| Duration::from_millis(ms.max(0) as u64);
        ResultSummary {
            query: self.query.clone(),
            query_type: metadata.query_type().and_then(QueryType::parse).unwrap_or_default(),
            counters: metadata.stats().unwrap_or_default(),
            result_available_after: self.t_first.map(millis),
            result_consumed_after: metadata.t_last().map(millis),
            database: metadata.db().map(str::to_string).or_else(|| self.database.clone()),
            server: self.server.clone(),
            notifications: metadata.notifications(),
            bookmark: metadata.bookmark().map(str::to_string),
        }
    }
}

// ============================================================================
// Cursor - 배치 단위 결과 진행
// ============================================================================

/// 연결과 분리된 결과 진행 상태
///
/// 레코드를 다 소비하거나 버리면 요약이 확정됩니다.
#[derive(Debug)]
pub(crate) struct Cursor {
    keys: Vec<String>,
    qid: Option<i64>,
    fetch_size: i64,
    dialect: StructDialect,
    pending: VecDeque<Vec<PackStreamValue>>,
    has_more: bool,
    context: SummaryContext,
    summary: Option<ResultSummary>,
}

impl Cursor {
    pub(crate) fn new(response: RunResponse, fetch_size: i64, dialect: StructDialect, context: SummaryContext) -> Self {
        let mut cursor = Self {
            keys: response.keys,
            qid: response.qid,
            fetch_size,
            dialect,
            pending: VecDeque::new(),
            has_more: true,
            context,
            summary: None,
        };
        cursor.absorb(response.batch);
        cursor
    }

    fn absorb(&mut self, batch: StreamBatch) {
        self.has_more = batch.has_more();
        self.pending.extend(batch.records);
        if !self.has_more {
            self.summary = Some(self.context.summarize(&batch.summary));
        }
    }

    pub(crate) fn keys(&self) -> &[String] {
        &self.keys
    }

    pub(crate) fn summary(&self) -> Option<&ResultSummary> {
        self.summary.as_ref()
    }

    /// 다음 레코드; 버퍼가 비었으면 다음 배치를 PULL
    pub(crate) async fn next(&mut self, conn: &mut Connection) -> DriverResult<Option<Record>> {
        loop {
            if let Some(fields) = self.pending.pop_front() {
                return Record::hydrate(self.keys.clone(), fields, self.dialect).map(Some);
            }
            if !self.has_more {
                return Ok(None);
            }
            let batch = conn.pull(self.fetch_size, self.qid).await?;
            self.absorb(batch);
        }
    }

    /// 남은 레코드를 모두 받아 반환
    pub(crate) async fn drain(&mut self, conn: &mut Connection) -> DriverResult<Vec<Record>> {
        let mut records = Vec::with_capacity(self.pending.len());
        while let Some(record) = self.next(conn).await? {
            records.push(record);
        }
        Ok(records)
    }

    /// 남은 레코드를 버리고 요약 반환
    pub(crate) async fn discard(&mut self, conn: &mut Connection) -> DriverResult<ResultSummary> {
        self.pending.clear();
        if self.has_more {
            let metadata = conn.discard_all(self.qid).await?;
            self.has_more = false;
            self.summary = Some(self.context.summarize(&metadata));
        }
        self.summary
            .clone()
            .ok_or_else(|| DriverError::protocol("Result finished without a summary"))
    }
}

// ============================================================================
// QueryResult - 모두 받은 결과
// ============================================================================

/// 쿼리 결과
#[derive(Debug)]
pub struct QueryResult {
    /// 레코드들
    records: VecDeque<Record>,
    /// 컬럼 키
    keys: Vec<String>,
    /// 결과 요약
    summary: ResultSummary,
}

impl QueryResult {
    /// 새 결과 생성
    pub fn new(records: Vec<Record>, keys: Vec<String>, summary: ResultSummary) -> Self {
        Self {
            records: records.into(),
            keys,
            summary,
        }
    }

    /// 컬럼 키
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    /// 결과 요약
    pub fn summary(&self) -> &ResultSummary {
        &self.summary
    }

    /// 남은 레코드 수
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// 레코드가 없는지 여부
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// 정확히 하나의 레코드
    pub fn single(mut self) -> DriverResult<Record> {
        match (self.records.pop_front(), self.records.is_empty()) {
            (Some(record), true) => Ok(record),
            (None, _) => Err(DriverError::type_conversion("Expected exactly one record, got none")),
            (Some(_), false) => Err(DriverError::type_conversion(format!(
                "Expected exactly one record, got {}",
                self.records.len() + 1
            ))),
        }
    }

    /// 첫 번째 레코드
    pub fn first(mut self) -> Option<Record> {
        self.records.pop_front()
    }

    /// 레코드와 요약으로 분리
    pub fn into_parts(self) -> (Vec<Record>, ResultSummary) {
        (self.records.into(), self.summary)
    }
}

impl Iterator for QueryResult {
    type Item = Record;

    fn next(&mut self) -> Option<Self::Item> {
        self.records.pop_front()
    }
}

// ============================================================================
// RecordStream - 자동 커밋 결과 스트림
// ============================================================================

/// 소비하는 만큼 가져오는 자동 커밋 결과
///
/// 연결을 점유하며, 끝까지 읽거나 [`RecordStream::consume`]하면 연결을
/// 반환하고 세션 북마크를 갱신합니다.
pub struct RecordStream {
    connection: Option<PooledConnection>,
    cursor: Cursor,
    session: Arc<SessionShared>,
}

impl RecordStream {
    pub(crate) fn new(connection: PooledConnection, cursor: Cursor, session: Arc<SessionShared>) -> Self {
        Self {
            connection: Some(connection),
            cursor,
            session,
        }
    }

    /// 컬럼 키
    pub fn keys(&self) -> &[String] {
        self.cursor.keys()
    }

    /// 다음 레코드 (끝이면 `None`)
    pub async fn next(&mut self) -> DriverResult<Option<Record>> {
        let Some(conn) = self.connection.as_mut() else {
            return Ok(None);
        };
        match self.cursor.next(conn).await {
            Ok(Some(record)) => Ok(Some(record)),
            Ok(None) => {
                self.finish().await;
                Ok(None)
            }
            Err(e) => {
                self.fail(&e).await;
                Err(e)
            }
        }
    }

    /// 남은 레코드를 버리고 요약 반환
    pub async fn consume(mut self) -> DriverResult<ResultSummary> {
        if let Some(conn) = self.connection.as_mut() {
            if let Err(e) = self.cursor.discard(conn).await {
                self.fail(&e).await;
                return Err(e);
            }
            self.finish().await;
        }
        self.cursor
            .summary()
            .cloned()
            .ok_or(DriverError::ResultConsumed)
    }

    /// 모든 레코드를 받아 [`QueryResult`]로 변환
    pub async fn collect(mut self) -> DriverResult<QueryResult> {
        let mut records = Vec::new();
        while let Some(record) = self.next().await? {
            records.push(record);
        }
        let keys = self.cursor.keys().to_vec();
        let summary = self
            .cursor
            .summary()
            .cloned()
            .ok_or(DriverError::ResultConsumed)?;
        Ok(QueryResult::new(records, keys, summary))
    }

    /// `futures::Stream`으로 변환
    pub fn into_stream(self) -> impl Stream<Item = DriverResult<Record>> + Send {
        stream::unfold(self, |mut records| async move {
            match records.next().await {
                Ok(Some(record)) => Some((Ok(record), records)),
                Ok(None) => None,
                Err(e) => Some((Err(e), records)),
            }
        })
    }

    async fn finish(&mut self) {
        if let Some(conn) = self.connection.take() {
            let bookmark = self.cursor.summary().and_then(|s| s.bookmark.clone());
            self.session.update_bookmark(bookmark);
            conn.release().await;
        }
    }

    async fn fail(&mut self, error: &DriverError) {
        if let Some(conn) = self.connection.take() {
            let address = conn.address().clone();
            let database = conn.database().map(str::to_string);
            conn.release().await;
            self.session.on_error(error, &address, database.as_deref()).await;
        }
    }
}

impl fmt::Debug for RecordStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordStream")
            .field("keys", &self.cursor.keys())
            .field("open", &self.connection.is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
