//! Connection Pool
//!
//! 주소별 연결 풀과 클러스터 전체 풀 레지스트리.
//!
//! 풀은 유휴 연결 덱(가장 최근 사용이 뒤쪽)과 `max_size`개의 퍼밋을 가진
//! 세마포어로 구성됩니다. 퍼밋은 [`PooledConnection`]이 살아 있는 동안
//! 유지되므로 유휴 + 사용 중 연결 수는 항상 `max_size` 이하입니다.

use std::collections::{HashMap, HashSet, VecDeque};
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use super::bolt::{Connection, ConnectionSettings};
use super::error::{DriverError, DriverResult};
use super::uri::ServerAddress;

// ============================================================================
// PoolConfig - 풀 설정
// ============================================================================

/// 연결 풀 설정
///
/// | 필드 | 기본값 | 설명 |
/// |------|--------|------|
/// | `max_size` | 100 | 주소당 최대 연결 수 |
/// | `max_idle` | 100 | 주소당 최대 유휴 연결 수 |
/// | `acquisition_timeout` | 60초 | 연결 획득 타임아웃 |
/// | `max_lifetime` | 1시간 | 연결 최대 수명 |
/// | `idle_timeout` | 없음 | 유휴 연결 폐기 기준 |
/// | `liveness_check_timeout` | 없음 | 이보다 오래 유휴였으면 RESET으로 확인 |
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// 최대 연결 수
    pub max_size: usize,
    /// 최대 유휴 연결 수
    pub max_idle: usize,
    /// 연결 획득 타임아웃
    pub acquisition_timeout: Duration,
    /// 연결 최대 수명
    pub max_lifetime: Option<Duration>,
    /// 유휴 타임아웃
    pub idle_timeout: Option<Duration>,
    /// 활성 확인 기준 유휴 시간
    pub liveness_check_timeout: Option<Duration>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_size: 100,
            max_idle: 100,
            acquisition_timeout: Duration::from_secs(60),
            max_lifetime: Some(Duration::from_secs(3600)),
            idle_timeout: None,
            liveness_check_timeout: None,
        }
    }
}

impl PoolConfig {
    /// 빌더 패턴으로 풀 설정 생성
    pub fn builder() -> PoolConfigBuilder {
        PoolConfigBuilder::default()
    }
}

/// 풀 설정 빌더
#[derive(Debug, Clone, Default)]
pub struct PoolConfigBuilder {
    config: PoolConfig,
}

impl PoolConfigBuilder {
    /// 최대 연결 수 설정 (유휴 상한도 함께 낮춤)
    pub fn max_size(mut self, size: usize) -> Self {
        self.config.max_size = size;
        self.config.max_idle = self.config.max_idle.min(size);
        self
    }

    /// 최대 유휴 연결 수 설정
    pub fn max_idle(mut self, size: usize) -> Self {
        self.config.max_idle = size;
        self
    }

    /// 연결 획득 타임아웃 설정
    pub fn acquisition_timeout(mut self, timeout: Duration) -> Self {
        self.config.acquisition_timeout = timeout;
        self
    }

    /// 연결 최대 수명 설정
    pub fn max_lifetime(mut self, lifetime: Option<Duration>) -> Self {
        self.config.max_lifetime = lifetime;
        self
    }

    /// 유휴 타임아웃 설정
    pub fn idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.idle_timeout = timeout;
        self
    }

    /// 활성 확인 기준 설정
    pub fn liveness_check_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.liveness_check_timeout = timeout;
        self
    }

    /// 설정 빌드
    pub fn build(self) -> PoolConfig {
        self.config
    }
}

// ============================================================================
// Connector - 연결 생성기
// ============================================================================

/// 새 연결을 여는 방법
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// `address`에 연결하고 인증까지 마친 연결 반환
    async fn connect(&self, address: &ServerAddress) -> DriverResult<Connection>;
}

/// TCP 연결 생성기
#[derive(Debug, Clone)]
pub struct TcpConnector {
    settings: ConnectionSettings,
}

impl TcpConnector {
    /// 새 연결 생성기
    pub fn new(settings: ConnectionSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl Connector for TcpConnector {
    async fn connect(&self, address: &ServerAddress) -> DriverResult<Connection> {
        Connection::connect(address, &self.settings).await
    }
}

// ============================================================================
// PooledConnection - 풀링된 연결
// ============================================================================

/// 풀 퍼밋과 반환 여부
struct Lease {
    pool: Arc<ConnectionPool>,
    _permit: OwnedSemaphorePermit,
    released: bool,
}

impl Drop for Lease {
    fn drop(&mut self) {
        self.pool.in_use.fetch_sub(1, Ordering::SeqCst);
        if !self.released {
            // release() 없이 버려진 연결은 재사용하지 않음
            self.pool.total_closed.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(address = %self.pool.address, "connection dropped without release; discarded");
        }
    }
}

/// 풀에서 빌린 연결
///
/// 정확히 하나의 소유자만 가집니다. [`PooledConnection::release`]로 반환하지
/// 않고 드롭하면 연결은 폐기됩니다.
pub struct PooledConnection {
    conn: Connection,
    lease: Lease,
}

impl PooledConnection {
    /// 풀로 반환
    ///
    /// 깨진 연결은 닫고, 필요하면 RESET 후 유휴 목록에 넣습니다.
    pub async fn release(self) {
        let PooledConnection { mut conn, mut lease } = self;
        lease.released = true;
        let pool = lease.pool.clone();

        if conn.is_broken() || pool.is_closed() {
            pool.discard(conn).await;
            return;
        }
        if conn.needs_reset() {
            if let Err(e) = conn.reset().await {
                tracing::debug!(address = %pool.address, error = %e, "reset on release failed");
                pool.discard(conn).await;
                return;
            }
        }
        if !pool.is_reusable(&conn) {
            pool.discard(conn).await;
            return;
        }

        pool.push_idle(conn).await;
        // lease가 여기서 드롭되며 퍼밋 반환
    }

    /// 연결이 속한 풀
    pub fn pool(&self) -> &Arc<ConnectionPool> {
        &self.lease.pool
    }
}

impl Deref for PooledConnection {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        &self.conn
    }
}

impl DerefMut for PooledConnection {
    fn deref_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }
}

impl std::fmt::Debug for PooledConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledConnection")
            .field("connection", &self.conn)
            .field("age", &self.conn.created_at().elapsed())
            .finish()
    }
}

// ============================================================================
// PoolMetrics - 풀 메트릭
// ============================================================================

/// 풀 메트릭
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolMetrics {
    /// 유휴 연결 수
    pub idle: usize,
    /// 사용 중인 연결 수
    pub in_use: usize,
    /// 총 획득 횟수
    pub total_acquisitions: u64,
    /// 총 생성 횟수
    pub total_created: u64,
    /// 총 닫힌 연결 수
    pub total_closed: u64,
    /// 총 타임아웃 횟수
    pub total_timeouts: u64,
}

// ============================================================================
// ConnectionPool - 연결 풀
// ============================================================================

/// 주소별 연결 풀
pub struct ConnectionPool {
    /// 서버 주소
    address: ServerAddress,
    /// 풀 설정
    config: PoolConfig,
    /// 연결 생성기
    connector: Arc<dyn Connector>,
    /// 유휴 연결들 (뒤쪽이 최근 사용)
    idle_connections: Mutex<VecDeque<Connection>>,
    /// 세마포어 (연결 수 제한)
    semaphore: Arc<Semaphore>,
    /// 인증 세대; 이보다 오래된 연결은 폐기
    auth_generation: AtomicU64,
    /// 사용 중인 연결 수
    in_use: AtomicUsize,
    /// 총 생성 횟수
    total_created: AtomicU64,
    /// 총 획득 횟수
    total_acquisitions: AtomicU64,
    /// 총 닫힌 횟수
    total_closed: AtomicU64,
    /// 총 타임아웃 횟수
    total_timeouts: AtomicU64,
    /// 닫힘 상태
    closed: AtomicBool,
}

impl ConnectionPool {
    /// 새 연결 풀 생성
    pub fn new(address: ServerAddress, config: PoolConfig, connector: Arc<dyn Connector>) -> Arc<Self> {
        let semaphore = Arc::new(Semaphore::new(config.max_size));
        Arc::new(Self {
            address,
            config,
            connector,
            idle_connections: Mutex::new(VecDeque::new()),
            semaphore,
            auth_generation: AtomicU64::new(0),
            in_use: AtomicUsize::new(0),
            total_created: AtomicU64::new(0),
            total_acquisitions: AtomicU64::new(0),
            total_closed: AtomicU64::new(0),
            total_timeouts: AtomicU64::new(0),
            closed: AtomicBool::new(false),
        })
    }

    /// 연결 획득
    ///
    /// 퍼밋 대기, 유휴 연결 검증, 새 연결 생성을 합쳐 `timeout` 안에 끝내지
    /// 못하면 [`DriverError::PoolTimeout`].
    pub async fn acquire(self: &Arc<Self>, timeout: Duration) -> DriverResult<PooledConnection> {
        if self.is_closed() {
            return Err(DriverError::PoolClosed(self.address.to_string()));
        }

        let acquisition = async {
            let permit = self
                .semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|_| DriverError::PoolClosed(self.address.to_string()))?;
            let conn = match self.take_idle().await {
                Some(conn) => conn,
                None => self.create_connection().await?,
            };
            Ok::<_, DriverError>((permit, conn))
        };

        let (permit, conn) = match tokio::time::timeout(timeout, acquisition).await {
            Ok(result) => result?,
            Err(_) => {
                self.total_timeouts.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(address = %self.address, ?timeout, "connection acquisition timed out");
                return Err(DriverError::PoolTimeout {
                    address: self.address.to_string(),
                    timeout,
                });
            }
        };

        self.in_use.fetch_add(1, Ordering::SeqCst);
        self.total_acquisitions.fetch_add(1, Ordering::Relaxed);
        Ok(PooledConnection {
            conn,
            lease: Lease {
                pool: self.clone(),
                _permit: permit,
                released: false,
            },
        })
    }

    /// 재사용 가능한 유휴 연결 꺼내기 (최근 사용부터)
    async fn take_idle(&self) -> Option<Connection> {
        loop {
            let mut conn = self.idle_connections.lock().pop_back()?;

            if !self.is_reusable(&conn) {
                self.discard(conn).await;
                continue;
            }

            if let Some(threshold) = self.config.liveness_check_timeout {
                if conn.idle_for() > threshold {
                    if let Err(e) = conn.reset().await {
                        tracing::debug!(address = %self.address, error = %e, "liveness check failed");
                        self.discard(conn).await;
                        continue;
                    }
                }
            }
            return Some(conn);
        }
    }

    /// 새 연결 생성
    async fn create_connection(&self) -> DriverResult<Connection> {
        let mut conn = self.connector.connect(&self.address).await?;
        conn.set_auth_generation(self.auth_generation.load(Ordering::SeqCst));
        let created = self.total_created.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::debug!(address = %self.address, created, "pool created connection");
        Ok(conn)
    }

    fn is_reusable(&self, conn: &Connection) -> bool {
        if conn.is_broken() {
            return false;
        }
        if conn.auth_generation() != self.auth_generation.load(Ordering::SeqCst) {
            return false;
        }
        if matches!(self.config.max_lifetime, Some(max) if conn.created_at().elapsed() > max) {
            return false;
        }
        !matches!(self.config.idle_timeout, Some(max) if conn.idle_for() > max)
    }

    async fn push_idle(&self, conn: Connection) {
        let evicted: Vec<Connection> = {
            let mut idle = self.idle_connections.lock();
            idle.push_back(conn);
            let excess = idle.len().saturating_sub(self.config.max_idle);
            idle.drain(..excess).collect()
        };
        for conn in evicted {
            tracing::debug!(address = %self.address, "evicting idle connection above cap");
            self.discard(conn).await;
        }

        // close()와 경쟁한 경우 방금 넣은 연결도 정리
        if self.is_closed() {
            self.drain_idle().await;
        }
    }

    async fn discard(&self, conn: Connection) {
        self.total_closed.fetch_add(1, Ordering::Relaxed);
        conn.close().await;
    }

    async fn drain_idle(&self) {
        let drained: Vec<Connection> = self.idle_connections.lock().drain(..).collect();
        for conn in drained {
            self.discard(conn).await;
        }
    }

    /// 인증 만료 후 기존 연결을 모두 오래된 것으로 표시
    pub fn mark_stale_auth(&self) {
        let generation = self.auth_generation.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::debug!(address = %self.address, generation, "pool auth marked stale");
    }

    /// 풀 닫기
    ///
    /// 대기 중인 획득은 실패하고, 사용 중인 연결은 반환 시 닫힙니다.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.semaphore.close();
        self.drain_idle().await;
        tracing::debug!(address = %self.address, "pool closed");
    }

    /// 닫힘 여부
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// 서버 주소
    pub fn address(&self) -> &ServerAddress {
        &self.address
    }

    /// 메트릭 조회
    pub fn metrics(&self) -> PoolMetrics {
        PoolMetrics {
            idle: self.idle_count(),
            in_use: self.in_use_count(),
            total_acquisitions: self.total_acquisitions.load(Ordering::Relaxed),
            total_created: self.total_created.load(Ordering::Relaxed),
            total_closed: self.total_closed.load(Ordering::Relaxed),
            total_timeouts: self.total_timeouts.load(Ordering::Relaxed),
        }
    }

    /// 유휴 연결 수
    pub fn idle_count(&self) -> usize {
        self.idle_connections.lock().len()
    }

    /// 사용 중인 연결 수
    pub fn in_use_count(&self) -> usize {
        self.in_use.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("address", &self.address)
            .field("idle", &self.idle_count())
            .field("in_use", &self.in_use_count())
            .field("closed", &self.is_closed())
            .finish()
    }
}

// ============================================================================
// ClusterPool - 클러스터 풀 레지스트리
// ============================================================================

/// 주소 → 풀 레지스트리
pub struct ClusterPool {
    config: PoolConfig,
    connector: Arc<dyn Connector>,
    pools: RwLock<HashMap<ServerAddress, Arc<ConnectionPool>>>,
    closed: AtomicBool,
}

impl ClusterPool {
    /// 새 레지스트리 생성
    pub fn new(config: PoolConfig, connector: Arc<dyn Connector>) -> Self {
        Self {
            config,
            connector,
            pools: RwLock::new(HashMap::new()),
            closed: AtomicBool::new(false),
        }
    }

    /// 풀 설정
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// 주소의 풀 (없으면 생성)
    pub fn pool_for(&self, address: &ServerAddress) -> DriverResult<Arc<ConnectionPool>> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(DriverError::PoolClosed(address.to_string()));
        }
        if let Some(pool) = self.pools.read().get(address) {
            return Ok(pool.clone());
        }
        let mut pools = self.pools.write();
        let pool = pools
            .entry(address.clone())
            .or_insert_with(|| {
                ConnectionPool::new(address.clone(), self.config.clone(), self.connector.clone())
            })
            .clone();
        Ok(pool)
    }

    /// `address`에서 연결 획득
    pub async fn acquire(&self, address: &ServerAddress, timeout: Duration) -> DriverResult<PooledConnection> {
        self.pool_for(address)?.acquire(timeout).await
    }

    /// 주소들의 풀을 미리 등록
    pub fn add<'a>(&self, addresses: impl IntoIterator<Item = &'a ServerAddress>) -> DriverResult<()> {
        for address in addresses {
            self.pool_for(address)?;
        }
        Ok(())
    }

    /// `keep`에 없는 주소의 풀 제거 및 닫기
    pub async fn retain(&self, keep: &HashSet<ServerAddress>) {
        let removed: Vec<Arc<ConnectionPool>> = {
            let mut pools = self.pools.write();
            let stale: Vec<ServerAddress> = pools.keys().filter(|a| !keep.contains(*a)).cloned().collect();
            stale.iter().filter_map(|a| pools.remove(a)).collect()
        };
        for pool in removed {
            tracing::debug!(address = %pool.address(), "removing pool no longer referenced by routing");
            pool.close().await;
        }
    }

    /// 주소의 풀 비활성화 (제거 후 닫기)
    pub async fn deactivate(&self, address: &ServerAddress) {
        let removed = self.pools.write().remove(address);
        if let Some(pool) = removed {
            pool.close().await;
        }
    }

    /// 주소의 인증 세대 갱신
    pub fn mark_stale_auth(&self, address: &ServerAddress) {
        if let Some(pool) = self.pools.read().get(address) {
            pool.mark_stale_auth();
        }
    }

    /// 등록된 주소들
    pub fn addresses(&self) -> Vec<ServerAddress> {
        let mut addresses: Vec<ServerAddress> = self.pools.read().keys().cloned().collect();
        addresses.sort();
        addresses
    }

    /// 주소별 메트릭
    pub fn metrics(&self) -> HashMap<ServerAddress, PoolMetrics> {
        self.pools
            .read()
            .iter()
            .map(|(address, pool)| (address.clone(), pool.metrics()))
            .collect()
    }

    /// 모든 풀 닫기
    pub async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        let pools: Vec<Arc<ConnectionPool>> = self.pools.write().drain().map(|(_, p)| p).collect();
        for pool in pools {
            pool.close().await;
        }
    }
}

impl std::fmt::Debug for ClusterPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClusterPool")
            .field("addresses", &self.addresses())
            .field("closed", &self.closed.load(Ordering::SeqCst))
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bolt::message::tag;
    use crate::bolt::{BoltErrorCode, BoltRequest, BoltVersion};
    use crate::driver::testing::{Script, StubConnector, StubServer};

    const WAIT: Duration = Duration::from_secs(5);

    fn create_test_pool(server: &StubServer, config: PoolConfig) -> Arc<ConnectionPool> {
        let connector = StubConnector::with_servers(ConnectionSettings::default(), &[server]);
        ConnectionPool::new(server.address().clone(), config, Arc::new(connector))
    }

    #[test]
    fn test_pool_config_default() {
        let config = PoolConfig::default();
        assert_eq!(config.max_size, 100);
        assert_eq!(config.max_idle, 100);
        assert_eq!(config.acquisition_timeout, Duration::from_secs(60));
        assert!(config.liveness_check_timeout.is_none());
    }

    #[test]
    fn test_pool_config_builder() {
        let config = PoolConfig::builder()
            .max_size(10)
            .acquisition_timeout(Duration::from_secs(3))
            .idle_timeout(Some(Duration::from_secs(30)))
            .build();

        assert_eq!(config.max_size, 10);
        assert_eq!(config.max_idle, 10);
        assert_eq!(config.acquisition_timeout, Duration::from_secs(3));
        assert_eq!(config.idle_timeout, Some(Duration::from_secs(30)));
    }

    #[tokio::test]
    async fn test_pool_reuse_connection() {
        let server = StubServer::new(BoltVersion::V4_4);
        let pool = create_test_pool(&server, PoolConfig::default());

        let conn = pool.acquire(WAIT).await.unwrap();
        let id = conn.connection_id().map(str::to_string);
        assert_eq!(pool.in_use_count(), 1);
        conn.release().await;

        let conn = pool.acquire(WAIT).await.unwrap();
        assert_eq!(conn.connection_id().map(str::to_string), id);
        assert_eq!(server.connections(), 1);
        conn.release().await;

        let metrics = pool.metrics();
        assert_eq!(metrics.idle, 1);
        assert_eq!(metrics.in_use, 0);
        assert_eq!(metrics.total_created, 1);
        assert_eq!(metrics.total_acquisitions, 2);
    }

    #[tokio::test]
    async fn test_pool_bound_and_timeout() {
        let server = StubServer::new(BoltVersion::V4_4);
        let pool = create_test_pool(&server, PoolConfig::builder().max_size(2).build());

        let a = pool.acquire(WAIT).await.unwrap();
        let b = pool.acquire(WAIT).await.unwrap();
        let err = pool.acquire(Duration::from_millis(20)).await.unwrap_err();

        assert!(matches!(err, DriverError::PoolTimeout { .. }));
        assert_eq!(pool.metrics().total_timeouts, 1);
        assert_eq!(server.connections(), 2);

        a.release().await;
        b.release().await;
        assert_eq!(pool.idle_count(), 2);
    }

    #[tokio::test]
    async fn test_leases_are_exclusive_under_contention() {
        let server = StubServer::new(BoltVersion::V4_4);
        let pool = create_test_pool(&server, PoolConfig::builder().max_size(3).build());
        let held = Arc::new(Mutex::new(HashSet::new()));
        let peak = Arc::new(AtomicUsize::new(0));

        let workers: Vec<_> = (0..12)
            .map(|_| {
                let pool = pool.clone();
                let held = held.clone();
                let peak = peak.clone();
                tokio::spawn(async move {
                    for _ in 0..5 {
                        let conn = pool.acquire(WAIT).await.unwrap();
                        let id = conn.connection_id().map(str::to_string).unwrap();
                        {
                            let mut held = held.lock();
                            assert!(held.insert(id.clone()), "connection {} leased twice", id);
                            peak.fetch_max(held.len(), Ordering::SeqCst);
                        }
                        tokio::task::yield_now().await;
                        tokio::time::sleep(Duration::from_millis(1)).await;
                        held.lock().remove(&id);
                        conn.release().await;
                    }
                })
            })
            .collect();

        for worker in workers {
            worker.await.unwrap();
        }

        assert!(peak.load(Ordering::SeqCst) <= 3);
        assert!(server.connections() <= 3);
        assert_eq!(pool.in_use_count(), 0);
        assert_eq!(pool.metrics().total_acquisitions, 60);
    }

    #[tokio::test]
    async fn test_timeout_covers_liveness_check() {
        let server = StubServer::new(BoltVersion::V4_4);
        let pool = create_test_pool(
            &server,
            PoolConfig::builder()
                .max_size(1)
                .liveness_check_timeout(Some(Duration::ZERO))
                .build(),
        );
        pool.acquire(WAIT).await.unwrap().release().await;
        tokio::time::sleep(Duration::from_millis(5)).await;

        // RESET에 응답하지 않는 서버
        server.push(Script::Stall);
        let result = tokio::time::timeout(Duration::from_secs(2), pool.acquire(Duration::from_millis(50)))
            .await
            .expect("acquire must honour its own timeout");

        assert!(matches!(result, Err(DriverError::PoolTimeout { .. })));
        assert_eq!(pool.metrics().total_timeouts, 1);
        assert_eq!(pool.in_use_count(), 0);

        // 퍼밋이 반환되어 새 연결로 획득 가능
        pool.acquire(WAIT).await.unwrap().release().await;
        assert_eq!(server.connections(), 2);
    }

    #[tokio::test]
    async fn test_waiter_receives_released_connection() {
        let server = StubServer::new(BoltVersion::V4_4);
        let pool = create_test_pool(&server, PoolConfig::builder().max_size(1).build());

        let held = pool.acquire(WAIT).await.unwrap();
        let waiter = {
            let pool = pool.clone();
            tokio::spawn(async move { pool.acquire(WAIT).await.map(|c| c.connection_id().map(str::to_string)) })
        };
        tokio::task::yield_now().await;
        let id = held.connection_id().map(str::to_string);
        held.release().await;

        assert_eq!(waiter.await.unwrap().unwrap(), id);
        assert_eq!(server.connections(), 1);
    }

    #[tokio::test]
    async fn test_broken_connection_not_reused() {
        let server = StubServer::new(BoltVersion::V4_4);
        let pool = create_test_pool(&server, PoolConfig::default());

        let mut conn = pool.acquire(WAIT).await.unwrap();
        server.push(Script::Hangup);
        assert!(conn.reset().await.is_err());
        assert!(conn.is_broken());
        conn.release().await;

        assert_eq!(pool.idle_count(), 0);
        let conn = pool.acquire(WAIT).await.unwrap();
        assert!(!conn.is_broken());
        assert_eq!(server.connections(), 2);
    }

    #[tokio::test]
    async fn test_drop_without_release_discards() {
        let server = StubServer::new(BoltVersion::V4_4);
        let pool = create_test_pool(&server, PoolConfig::builder().max_size(1).build());

        drop(pool.acquire(WAIT).await.unwrap());
        let metrics = pool.metrics();
        assert_eq!(metrics.idle, 0);
        assert_eq!(metrics.in_use, 0);
        assert_eq!(metrics.total_closed, 1);

        // 퍼밋이 반환되어 다시 획득 가능
        pool.acquire(Duration::from_millis(100)).await.unwrap().release().await;
        assert_eq!(server.connections(), 2);
    }

    #[tokio::test]
    async fn test_release_resets_failed_connection() {
        let server = StubServer::new(BoltVersion::V4_4);
        let pool = create_test_pool(&server, PoolConfig::default());

        let mut conn = pool.acquire(WAIT).await.unwrap();
        server.push(Script::failure(BoltErrorCode::SYNTAX_ERROR, "oops"));
        conn.enqueue(BoltRequest::Commit).unwrap();
        assert!(conn.sync().await.is_err());
        conn.release().await;

        assert_eq!(server.count(tag::RESET), 1);
        assert_eq!(pool.idle_count(), 1);
    }

    #[tokio::test]
    async fn test_idle_cap_evicts_least_recently_used() {
        let server = StubServer::new(BoltVersion::V4_4);
        let pool = create_test_pool(&server, PoolConfig::builder().max_size(3).max_idle(1).build());

        let first = pool.acquire(WAIT).await.unwrap();
        let second = pool.acquire(WAIT).await.unwrap();
        let kept = second.connection_id().map(str::to_string);
        first.release().await;
        second.release().await;

        assert_eq!(pool.idle_count(), 1);
        assert_eq!(pool.metrics().total_closed, 1);
        let conn = pool.acquire(WAIT).await.unwrap();
        assert_eq!(conn.connection_id().map(str::to_string), kept);
    }

    #[tokio::test]
    async fn test_stale_auth_generation_discards_idle() {
        let server = StubServer::new(BoltVersion::V4_4);
        let pool = create_test_pool(&server, PoolConfig::default());

        pool.acquire(WAIT).await.unwrap().release().await;
        pool.mark_stale_auth();
        pool.acquire(WAIT).await.unwrap().release().await;

        assert_eq!(server.connections(), 2);
        assert_eq!(pool.idle_count(), 1);
    }

    #[tokio::test]
    async fn test_max_lifetime_and_idle_timeout() {
        let server = StubServer::new(BoltVersion::V4_4);
        let pool = create_test_pool(
            &server,
            PoolConfig::builder()
                .max_lifetime(Some(Duration::from_millis(1)))
                .build(),
        );
        pool.acquire(WAIT).await.unwrap().release().await;
        tokio::time::sleep(Duration::from_millis(10)).await;
        pool.acquire(WAIT).await.unwrap().release().await;
        assert_eq!(server.connections(), 2);

        let server = StubServer::new(BoltVersion::V4_4);
        let pool = create_test_pool(
            &server,
            PoolConfig::builder()
                .idle_timeout(Some(Duration::from_millis(1)))
                .build(),
        );
        pool.acquire(WAIT).await.unwrap().release().await;
        tokio::time::sleep(Duration::from_millis(10)).await;
        pool.acquire(WAIT).await.unwrap().release().await;
        assert_eq!(server.connections(), 2);
    }

    #[tokio::test]
    async fn test_liveness_check_replaces_dead_connection() {
        let server = StubServer::new(BoltVersion::V4_4);
        let pool = create_test_pool(
            &server,
            PoolConfig::builder()
                .liveness_check_timeout(Some(Duration::ZERO))
                .build(),
        );
        pool.acquire(WAIT).await.unwrap().release().await;
        tokio::time::sleep(Duration::from_millis(5)).await;

        server.push(Script::Hangup);
        let conn = pool.acquire(WAIT).await.unwrap();
        assert!(!conn.is_broken());
        assert_eq!(server.connections(), 2);
        assert_eq!(server.count(tag::RESET), 1);
    }

    #[tokio::test]
    async fn test_pool_close() {
        let server = StubServer::new(BoltVersion::V4_4);
        let pool = create_test_pool(&server, PoolConfig::builder().max_size(1).build());

        let held = pool.acquire(WAIT).await.unwrap();
        let waiter = {
            let pool = pool.clone();
            tokio::spawn(async move { pool.acquire(WAIT).await.map(|_| ()) })
        };
        tokio::task::yield_now().await;
        pool.close().await;

        assert!(matches!(waiter.await.unwrap(), Err(DriverError::PoolClosed(_))));
        held.release().await;
        assert_eq!(pool.idle_count(), 0);
        assert!(matches!(pool.acquire(WAIT).await, Err(DriverError::PoolClosed(_))));
    }

    #[tokio::test]
    async fn test_cluster_pool_retain_and_deactivate() {
        let a = StubServer::at("a:7687", BoltVersion::V5_0);
        let b = StubServer::at("b:7687", BoltVersion::V5_0);
        let connector = StubConnector::with_servers(ConnectionSettings::default(), &[&a, &b]);
        let cluster = ClusterPool::new(PoolConfig::default(), Arc::new(connector));

        cluster.add([a.address(), b.address()]).unwrap();
        assert_eq!(cluster.addresses(), vec![a.address().clone(), b.address().clone()]);

        let conn = cluster.acquire(a.address(), WAIT).await.unwrap();
        cluster.retain(&HashSet::from([b.address().clone()])).await;
        assert_eq!(cluster.addresses(), vec![b.address().clone()]);

        // 제거된 풀의 연결은 반환 시 닫힘
        let old_pool = conn.pool().clone();
        conn.release().await;
        assert!(old_pool.is_closed());
        assert_eq!(old_pool.idle_count(), 0);

        cluster.deactivate(b.address()).await;
        assert!(cluster.addresses().is_empty());

        cluster.close().await;
        assert!(cluster.acquire(a.address(), WAIT).await.is_err());
    }
}
