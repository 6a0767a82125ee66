//! Session Management
//!
//! 세션은 연결 제공자에서 연결을 빌려 자동 커밋 쿼리, 명시적 트랜잭션,
//! 재시도되는 관리형 트랜잭션을 실행합니다. 커밋마다 받은 북마크를 다음
//! 작업에 넘겨 인과적 일관성을 유지합니다.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::bolt::packstream::StructDialect;
use crate::bolt::protocol::TxParams;
use crate::bolt::{AccessMode, NotificationConfig, TelemetryApi};

use super::bolt::Connection;
use super::error::{DriverError, DriverResult};
use super::provider::{AcquiredConnection, ConnectionProvider};
use super::record::{Cursor, QueryResult, RecordStream, SummaryContext};
use super::retry::RetryPolicy;
use super::routing::DiscoveryRequest;
use super::transaction::{ManagedTransaction, Transaction, TransactionConfig};
use super::types::{dehydrate_params, Value};
use super::uri::ServerAddress;

// ============================================================================
// Bookmarks - 북마크
// ============================================================================

/// 인과적 일관성 북마크 집합
///
/// 순서를 유지하며 중복과 빈 문자열은 제거됩니다. 비어 있으면 제약이
/// 없다는 뜻입니다.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bookmarks {
    values: Vec<String>,
}

impl Bookmarks {
    /// 빈 북마크 집합
    pub fn new() -> Self {
        Self::default()
    }

    /// 문자열들에서 생성
    pub fn from_values<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut bookmarks = Self::new();
        for value in values {
            bookmarks.insert(value.into());
        }
        bookmarks
    }

    fn insert(&mut self, value: String) {
        if !value.is_empty() && !self.values.contains(&value) {
            self.values.push(value);
        }
    }

    /// 비어 있는지 여부
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// 북마크 수
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// 북마크 반복자
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.values.iter().map(String::as_str)
    }

    /// 문자열 목록으로 복사
    pub fn to_vec(&self) -> Vec<String> {
        self.values.clone()
    }

    /// 두 집합의 합집합
    pub fn merge(&self, other: &Bookmarks) -> Bookmarks {
        let mut merged = self.clone();
        for value in &other.values {
            merged.insert(value.clone());
        }
        merged
    }
}

impl fmt::Display for Bookmarks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.values.join(", "))
    }
}

impl<S: Into<String>> FromIterator<S> for Bookmarks {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::from_values(iter)
    }
}

// ============================================================================
// SessionConfig - 세션 설정
// ============================================================================

/// 세션 설정
#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    /// 데이터베이스 이름 (`None`은 홈 데이터베이스)
    pub database: Option<String>,
    /// Fetch Size (`None`이면 드라이버 설정, -1은 전부)
    pub fetch_size: Option<i64>,
    /// 기본 접근 모드
    pub default_access_mode: AccessMode,
    /// 초기 북마크
    pub bookmarks: Bookmarks,
    /// 대리 사용자
    pub impersonated_user: Option<String>,
    /// 세션 단위 알림 필터
    pub notifications: NotificationConfig,
}

impl SessionConfig {
    /// 새 설정 생성
    pub fn new() -> Self {
        Self::default()
    }

    /// 빌더 시작
    pub fn builder() -> SessionConfigBuilder {
        SessionConfigBuilder::new()
    }

    /// 데이터베이스 설정
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    /// 접근 모드 설정
    pub fn with_access_mode(mut self, mode: AccessMode) -> Self {
        self.default_access_mode = mode;
        self
    }
}

// ============================================================================
// SessionConfigBuilder - 세션 설정 빌더
// ============================================================================

/// 세션 설정 빌더
#[derive(Debug, Default)]
pub struct SessionConfigBuilder {
    config: SessionConfig,
}

impl SessionConfigBuilder {
    /// 새 빌더 생성
    pub fn new() -> Self {
        Self::default()
    }

    /// 데이터베이스 설정
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.config.database = Some(database.into());
        self
    }

    /// Fetch Size 설정
    pub fn with_fetch_size(mut self, size: i64) -> Self {
        self.config.fetch_size = Some(size);
        self
    }

    /// 기본 접근 모드 설정
    pub fn with_default_access_mode(mut self, mode: AccessMode) -> Self {
        self.config.default_access_mode = mode;
        self
    }

    /// 읽기 모드로 설정
    pub fn with_read_access(self) -> Self {
        self.with_default_access_mode(AccessMode::Read)
    }

    /// 쓰기 모드로 설정
    pub fn with_write_access(self) -> Self {
        self.with_default_access_mode(AccessMode::Write)
    }

    /// 북마크 설정
    pub fn with_bookmarks(mut self, bookmarks: Bookmarks) -> Self {
        self.config.bookmarks = bookmarks;
        self
    }

    /// 대리 사용자 설정
    pub fn with_impersonated_user(mut self, user: impl Into<String>) -> Self {
        self.config.impersonated_user = Some(user.into());
        self
    }

    /// 알림 필터 설정
    pub fn with_notifications(mut self, notifications: NotificationConfig) -> Self {
        self.config.notifications = notifications;
        self
    }

    /// 빌드
    pub fn build(self) -> SessionConfig {
        self.config
    }
}

// ============================================================================
// Query - 쿼리
// ============================================================================

/// 쿼리
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    /// 쿼리 텍스트
    pub text: String,
    /// 파라미터
    pub parameters: HashMap<String, Value>,
}

impl Query {
    /// 새 쿼리 생성
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            parameters: HashMap::new(),
        }
    }

    /// 파라미터 추가
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    /// 파라미터들 추가
    pub fn with_params(mut self, params: HashMap<String, Value>) -> Self {
        self.parameters.extend(params);
        self
    }
}

impl From<&str> for Query {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Query {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

// ============================================================================
// SessionShared - 결과/트랜잭션과 공유하는 세션 상태
// ============================================================================

/// 세션과 그 세션이 만든 결과, 트랜잭션이 함께 쓰는 상태
pub(crate) struct SessionShared {
    provider: Arc<dyn ConnectionProvider>,
    bookmarks: RwLock<Bookmarks>,
    resolved_database: RwLock<Option<String>>,
}

impl SessionShared {
    /// 새 북마크로 교체
    pub(crate) fn update_bookmark(&self, bookmark: Option<String>) {
        if let Some(bookmark) = bookmark.filter(|b| !b.is_empty()) {
            *self.bookmarks.write() = Bookmarks::from_values([bookmark]);
        }
    }

    /// 연결 에러를 라우팅/풀에 반영
    pub(crate) async fn on_error(&self, error: &DriverError, address: &ServerAddress, database: Option<&str>) {
        self.provider.on_error(error, address, database).await;
    }
}

// ============================================================================
// Session - 세션
// ============================================================================

/// 데이터베이스 세션
pub struct Session {
    /// 공유 상태
    shared: Arc<SessionShared>,
    /// 세션 설정
    config: SessionConfig,
    /// 확정된 Fetch Size
    fetch_size: i64,
    /// 관리형 트랜잭션 재시도 정책
    retry: RetryPolicy,
    /// 열린 상태
    open: RwLock<bool>,
}

impl Session {
    /// 새 세션 생성
    pub(crate) fn new(
        provider: Arc<dyn ConnectionProvider>,
        config: SessionConfig,
        default_fetch_size: i64,
        retry: RetryPolicy,
    ) -> Self {
        let fetch_size = config.fetch_size.unwrap_or(default_fetch_size);
        Self {
            shared: Arc::new(SessionShared {
                provider,
                bookmarks: RwLock::new(config.bookmarks.clone()),
                resolved_database: RwLock::new(None),
            }),
            config,
            fetch_size,
            retry,
            open: RwLock::new(true),
        }
    }

    /// 쿼리 실행 (auto-commit), 결과를 모두 받아 반환
    pub async fn run(
        &self,
        query: impl Into<Query>,
        params: Option<HashMap<String, Value>>,
    ) -> DriverResult<QueryResult> {
        self.run_with_config(query, params, TransactionConfig::default()).await
    }

    /// 트랜잭션 설정을 지정한 auto-commit 쿼리
    pub async fn run_with_config(
        &self,
        query: impl Into<Query>,
        params: Option<HashMap<String, Value>>,
        config: TransactionConfig,
    ) -> DriverResult<QueryResult> {
        self.stream_with_config(query, params, config).await?.collect().await
    }

    /// 쿼리 실행 (auto-commit), 소비하는 만큼 가져오는 스트림 반환
    pub async fn stream(
        &self,
        query: impl Into<Query>,
        params: Option<HashMap<String, Value>>,
    ) -> DriverResult<RecordStream> {
        self.stream_with_config(query, params, TransactionConfig::default()).await
    }

    async fn stream_with_config(
        &self,
        query: impl Into<Query>,
        params: Option<HashMap<String, Value>>,
        config: TransactionConfig,
    ) -> DriverResult<RecordStream> {
        self.ensure_open()?;

        let mut query = query.into();
        if let Some(p) = params {
            query = query.with_params(p);
        }

        let mode = self.config.default_access_mode;
        let AcquiredConnection { mut connection, database } = self.acquire(mode).await?;
        match self.start_auto_commit(&mut connection, query, mode, database.clone(), &config).await {
            Ok(cursor) => Ok(RecordStream::new(connection, cursor, self.shared.clone())),
            Err(e) => {
                let address = connection.address().clone();
                connection.release().await;
                self.shared.on_error(&e, &address, database.as_deref()).await;
                Err(e)
            }
        }
    }

    async fn start_auto_commit(
        &self,
        conn: &mut Connection,
        query: Query,
        mode: AccessMode,
        database: Option<String>,
        config: &TransactionConfig,
    ) -> DriverResult<Cursor> {
        let dialect = conn.protocol().dialect;
        let tx = self.tx_params(mode, database.clone(), config, dialect)?;
        let parameters = dehydrate_params(query.parameters.clone(), dialect)?;
        let run = conn
            .protocol()
            .run_auto_commit(&query.text, parameters, &tx)
            .map_err(|e| conn.bolt_error(e))?;

        conn.enqueue_telemetry(TelemetryApi::AutoCommit)?;
        conn.set_database(database);
        let response = conn.run(run, self.fetch_size).await?;
        let context = SummaryContext::for_connection(query, response.t_first, conn);
        Ok(Cursor::new(response, self.fetch_size, dialect, context))
    }

    /// 명시적 트랜잭션 시작
    pub async fn begin_transaction(&self, config: Option<TransactionConfig>) -> DriverResult<Transaction> {
        self.ensure_open()?;
        self.open_transaction(
            self.config.default_access_mode,
            config.unwrap_or_default(),
            TelemetryApi::UnmanagedTransaction,
        )
        .await
    }

    /// 읽기 트랜잭션 함수 (재시도 포함)
    pub async fn execute_read<F, Fut, T>(&self, work: F) -> DriverResult<T>
    where
        F: Fn(ManagedTransaction) -> Fut,
        Fut: Future<Output = DriverResult<T>>,
    {
        self.execute(AccessMode::Read, TransactionConfig::default(), work).await
    }

    /// 쓰기 트랜잭션 함수 (재시도 포함)
    pub async fn execute_write<F, Fut, T>(&self, work: F) -> DriverResult<T>
    where
        F: Fn(ManagedTransaction) -> Fut,
        Fut: Future<Output = DriverResult<T>>,
    {
        self.execute(AccessMode::Write, TransactionConfig::default(), work).await
    }

    /// 트랜잭션 설정을 지정한 트랜잭션 함수
    pub async fn execute_with_config<F, Fut, T>(
        &self,
        mode: AccessMode,
        config: TransactionConfig,
        work: F,
    ) -> DriverResult<T>
    where
        F: Fn(ManagedTransaction) -> Fut,
        Fut: Future<Output = DriverResult<T>>,
    {
        self.execute(mode, config, work).await
    }

    async fn execute<F, Fut, T>(&self, mode: AccessMode, config: TransactionConfig, work: F) -> DriverResult<T>
    where
        F: Fn(ManagedTransaction) -> Fut,
        Fut: Future<Output = DriverResult<T>>,
    {
        self.ensure_open()?;
        let (config, work) = (&config, &work);

        self.retry
            .run(|attempt| async move {
                tracing::debug!(attempt, mode = mode.as_str(), "running transaction function");
                let tx = self
                    .open_transaction(mode, config.clone(), TelemetryApi::ManagedTransaction)
                    .await?;
                let managed = ManagedTransaction::new(tx);
                let outcome = work(managed.clone()).await;
                managed.finish(outcome).await
            })
            .await
    }

    async fn open_transaction(
        &self,
        mode: AccessMode,
        config: TransactionConfig,
        api: TelemetryApi,
    ) -> DriverResult<Transaction> {
        let AcquiredConnection { connection, database } = self.acquire(mode).await?;
        let dialect = connection.protocol().dialect;
        let params = match self.tx_params(mode, database, &config, dialect) {
            Ok(params) => params,
            Err(e) => {
                connection.release().await;
                return Err(e);
            }
        };
        Transaction::begin(connection, params, self.shared.clone(), self.fetch_size, api).await
    }

    /// 모드와 데이터베이스에 맞는 연결 획득; 홈 데이터베이스를 기억
    async fn acquire(&self, mode: AccessMode) -> DriverResult<AcquiredConnection> {
        let request = DiscoveryRequest::new(mode, self.database())
            .with_bookmarks(self.shared.bookmarks.read().to_vec())
            .with_impersonated_user(self.config.impersonated_user.clone());
        let acquired = self.shared.provider.acquire(&request).await?;

        if self.config.database.is_none() && self.shared.provider.is_routing() {
            if let Some(ref db) = acquired.database {
                let mut resolved = self.shared.resolved_database.write();
                if resolved.is_none() {
                    tracing::debug!(db = %db, "resolved home database");
                    *resolved = Some(db.clone());
                }
            }
        }
        Ok(acquired)
    }

    fn tx_params(
        &self,
        mode: AccessMode,
        database: Option<String>,
        config: &TransactionConfig,
        dialect: StructDialect,
    ) -> DriverResult<TxParams> {
        Ok(TxParams {
            bookmarks: self.shared.bookmarks.read().to_vec(),
            timeout: config.timeout,
            metadata: dehydrate_params(config.metadata.clone(), dialect)?,
            mode,
            database,
            imp_user: self.config.impersonated_user.clone(),
            notifications: self.config.notifications.clone(),
        })
    }

    /// 세션이 사용하는 데이터베이스 (설정값 또는 확인된 홈 데이터베이스)
    pub fn database(&self) -> Option<String> {
        self.config
            .database
            .clone()
            .or_else(|| self.shared.resolved_database.read().clone())
    }

    /// 마지막 북마크들
    pub fn last_bookmarks(&self) -> Bookmarks {
        self.shared.bookmarks.read().clone()
    }

    /// 세션 닫기
    pub async fn close(&self) -> DriverResult<()> {
        *self.open.write() = false;
        Ok(())
    }

    /// 열린 상태 확인
    fn ensure_open(&self) -> DriverResult<()> {
        if *self.open.read() {
            Ok(())
        } else {
            Err(DriverError::session_closed())
        }
    }

    /// 세션 설정
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("database", &self.database())
            .field("mode", &self.config.default_access_mode)
            .field("open", &*self.open.read())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
