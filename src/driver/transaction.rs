//! Transaction Management
//!
//! 명시적 트랜잭션과 관리형 트랜잭션.
//!
//! 트랜잭션은 시작부터 커밋/롤백까지 한 연결을 붙잡고 있으며, 어떤 요청이
//! 실패하면 `Failed` 상태가 되어 연결을 풀에 돌려줍니다.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::bolt::protocol::TxParams;
use crate::bolt::TelemetryApi;

use super::bolt::Connection;
use super::error::{DriverError, DriverResult};
use super::pool::PooledConnection;
use super::record::{Cursor, QueryResult, SummaryContext};
use super::session::{Query, SessionShared};
use super::types::{dehydrate_params, Value};

// ============================================================================
// TransactionConfig - 트랜잭션 설정
// ============================================================================

/// 트랜잭션 설정
#[derive(Debug, Clone, Default)]
pub struct TransactionConfig {
    /// 서버 측 타임아웃
    pub timeout: Option<Duration>,
    /// 트랜잭션 메타데이터
    pub metadata: HashMap<String, Value>,
}

impl TransactionConfig {
    /// 새 설정 생성
    pub fn new() -> Self {
        Self::default()
    }

    /// 타임아웃 설정
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// 메타데이터 추가
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

// ============================================================================
// TransactionState - 트랜잭션 상태
// ============================================================================

/// 트랜잭션 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    /// 활성
    Active,
    /// 커밋됨
    Committed,
    /// 롤백됨
    RolledBack,
    /// 요청 실패
    Failed,
    /// 닫힘
    Closed,
}

impl TransactionState {
    /// 더 이상 쿼리를 받을 수 없는 상태인지
    pub fn is_terminated(&self) -> bool {
        !matches!(self, TransactionState::Active)
    }
}

// ============================================================================
// Transaction - 명시적 트랜잭션
// ============================================================================

/// 명시적 트랜잭션
pub struct Transaction {
    /// 붙잡고 있는 연결 (종료되면 `None`)
    connection: Option<PooledConnection>,
    /// 세션 공유 상태
    session: Arc<SessionShared>,
    /// 대상 데이터베이스
    database: Option<String>,
    /// Fetch Size
    fetch_size: i64,
    /// 상태
    state: TransactionState,
}

impl Transaction {
    /// BEGIN을 보내고 트랜잭션 시작
    pub(crate) async fn begin(
        mut connection: PooledConnection,
        params: TxParams,
        session: Arc<SessionShared>,
        fetch_size: i64,
        api: TelemetryApi,
    ) -> DriverResult<Self> {
        let begun = match connection.enqueue_telemetry(api) {
            Ok(()) => connection.begin(&params).await,
            Err(e) => Err(e),
        };

        if let Err(e) = begun {
            let address = connection.address().clone();
            connection.release().await;
            session.on_error(&e, &address, params.database.as_deref()).await;
            return Err(e);
        }

        Ok(Self {
            connection: Some(connection),
            session,
            database: params.database,
            fetch_size,
            state: TransactionState::Active,
        })
    }

    /// 쿼리 실행; 결과는 fetch size 단위로 모두 받아옵니다
    pub async fn run(
        &mut self,
        query: impl Into<Query>,
        params: Option<HashMap<String, Value>>,
    ) -> DriverResult<QueryResult> {
        self.ensure_active()?;

        let mut query = query.into();
        if let Some(p) = params {
            query = query.with_params(p);
        }

        let fetch_size = self.fetch_size;
        let conn = self.connection_mut()?;
        let dialect = conn.protocol().dialect;
        // 보내기 전의 변환 실패는 트랜잭션을 깨뜨리지 않음
        let parameters = dehydrate_params(query.parameters.clone(), dialect)?;

        let result = Self::execute(conn, query, parameters, fetch_size).await;
        if let Err(ref e) = result {
            self.fail(e).await;
        }
        result
    }

    async fn execute(
        conn: &mut Connection,
        query: Query,
        parameters: HashMap<String, crate::bolt::PackStreamValue>,
        fetch_size: i64,
    ) -> DriverResult<QueryResult> {
        let dialect = conn.protocol().dialect;
        let run = conn.protocol().run_in_transaction(&query.text, parameters);
        let response = conn.run(run, fetch_size).await?;
        let context = SummaryContext::for_connection(query, response.t_first, conn);

        let mut cursor = Cursor::new(response, fetch_size, dialect, context);
        let records = cursor.drain(conn).await?;
        let keys = cursor.keys().to_vec();
        let summary = cursor
            .summary()
            .cloned()
            .ok_or_else(|| DriverError::protocol("Result stream ended without a summary"))?;
        Ok(QueryResult::new(records, keys, summary))
    }

    /// 커밋; 받은 북마크를 세션에 반영
    pub async fn commit(&mut self) -> DriverResult<()> {
        self.ensure_active()?;

        let committed = self.connection_mut()?.commit().await;
        match committed {
            Ok(bookmark) => {
                self.state = TransactionState::Committed;
                self.session.update_bookmark(bookmark);
                self.release().await;
                Ok(())
            }
            Err(e) => {
                self.fail(&e).await;
                Err(e)
            }
        }
    }

    /// 롤백
    ///
    /// 실패했거나 이미 롤백/종료된 트랜잭션에서는 아무 것도 보내지 않습니다.
    pub async fn rollback(&mut self) -> DriverResult<()> {
        match self.state {
            TransactionState::Active => {}
            TransactionState::Committed => {
                return Err(DriverError::transaction("Cannot roll back a committed transaction"));
            }
            TransactionState::Failed | TransactionState::RolledBack | TransactionState::Closed => {
                return Ok(());
            }
        }

        let rolled_back = self.connection_mut()?.rollback().await;
        match rolled_back {
            Ok(()) => {
                self.state = TransactionState::RolledBack;
                self.release().await;
                Ok(())
            }
            Err(e) => {
                self.fail(&e).await;
                Err(e)
            }
        }
    }

    /// 닫기; 활성 상태면 롤백
    pub async fn close(&mut self) -> DriverResult<()> {
        let result = if self.state == TransactionState::Active {
            self.rollback().await
        } else {
            Ok(())
        };
        self.state = TransactionState::Closed;
        self.release().await;
        result
    }

    /// 현재 상태
    pub fn state(&self) -> TransactionState {
        self.state
    }

    /// 활성 상태인지
    pub fn is_open(&self) -> bool {
        self.state == TransactionState::Active
    }

    /// 대상 데이터베이스
    pub fn database(&self) -> Option<&str> {
        self.database.as_deref()
    }

    fn ensure_active(&self) -> DriverResult<()> {
        match self.state {
            TransactionState::Active => Ok(()),
            TransactionState::Committed => Err(DriverError::transaction("Transaction has been committed")),
            TransactionState::RolledBack => Err(DriverError::transaction("Transaction has been rolled back")),
            TransactionState::Failed => Err(DriverError::transaction(
                "Transaction has failed; it can only be rolled back or closed",
            )),
            TransactionState::Closed => Err(DriverError::transaction("Transaction has been closed")),
        }
    }

    fn connection_mut(&mut self) -> DriverResult<&mut PooledConnection> {
        self.connection
            .as_mut()
            .ok_or_else(|| DriverError::transaction("Transaction has no connection"))
    }

    async fn release(&mut self) {
        if let Some(connection) = self.connection.take() {
            connection.release().await;
        }
    }

    /// 실패 처리: 상태 전환, 연결 반납, 라우팅에 통보
    async fn fail(&mut self, error: &DriverError) {
        self.state = TransactionState::Failed;
        if let Some(connection) = self.connection.take() {
            let address = connection.address().clone();
            connection.release().await;
            self.session.on_error(error, &address, self.database.as_deref()).await;
        }
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if self.state == TransactionState::Active {
            if let Some(ref connection) = self.connection {
                tracing::warn!(
                    address = %connection.address(),
                    "transaction dropped while active; discarding its connection"
                );
            }
        }
    }
}

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("database", &self.database)
            .field("state", &self.state)
            .finish()
    }
}

// ============================================================================
// ManagedTransaction - 트랜잭션 함수용 핸들
// ============================================================================

/// `execute_read` / `execute_write`에 넘겨지는 트랜잭션 핸들
///
/// 커밋과 롤백은 세션이 작업 결과에 따라 수행합니다.
#[derive(Clone)]
pub struct ManagedTransaction {
    inner: Arc<tokio::sync::Mutex<Transaction>>,
}

impl ManagedTransaction {
    pub(crate) fn new(transaction: Transaction) -> Self {
        Self {
            inner: Arc::new(tokio::sync::Mutex::new(transaction)),
        }
    }

    /// 쿼리 실행
    pub async fn run(
        &self,
        query: impl Into<Query>,
        params: Option<HashMap<String, Value>>,
    ) -> DriverResult<QueryResult> {
        self.inner.lock().await.run(query, params).await
    }

    /// 작업 결과에 따라 커밋 또는 롤백
    pub(crate) async fn finish<T>(self, outcome: DriverResult<T>) -> DriverResult<T> {
        let mut tx = self.inner.lock().await;
        match outcome {
            Ok(value) => match tx.state() {
                TransactionState::Active => {
                    tx.commit().await?;
                    Ok(value)
                }
                state => Err(DriverError::transaction(format!(
                    "Transaction function returned successfully but the transaction is {:?}",
                    state
                ))),
            },
            Err(e) => {
                if let Err(rollback_error) = tx.rollback().await {
                    tracing::debug!(error = %rollback_error, "rollback after failed transaction function");
                }
                Err(e)
            }
        }
    }
}

impl fmt::Debug for ManagedTransaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagedTransaction").finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
