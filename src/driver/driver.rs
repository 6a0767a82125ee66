//! Driver
//!
//! 드라이버는 URI와 설정으로 연결 제공자(직접 또는 라우팅)와 주소별 풀을
//! 만들고, 세션을 발급합니다.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;

use crate::bolt::codec::DEFAULT_MAX_MESSAGE_SIZE;
use crate::bolt::{AccessMode, AuthToken, BoltVersion, NotificationConfig, PackStreamValue};

use super::bolt::{Connection, ConnectionSettings, TransportSecurity, DEFAULT_USER_AGENT};
use super::error::{DriverError, DriverResult};
use super::pool::{ClusterPool, Connector, PoolConfig, PoolMetrics, TcpConnector};
use super::provider::{ConnectionProvider, DirectProvider};
use super::retry::RetryPolicy;
use super::routing::{DiscoveryRequest, Rediscovery, RoutingProvider, RoutingTableManager};
use super::session::{Session, SessionConfig};
use super::uri::{BoltUri, ServerAddress, UriEncryption};

// ============================================================================
// TrustStrategy - TLS 신뢰 전략
// ============================================================================

/// TLS 신뢰 전략
///
/// 실제 TLS 처리는 애플리케이션이 넘기는 [`TransportSecurity`]가 맡고,
/// 드라이버는 URI와 설정에서 결정된 전략을 [`DriverConfig::trust`]로 알려줍니다.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TrustStrategy {
    /// 시스템 인증서 사용
    #[default]
    TrustSystemCas,
    /// 모든 인증서 신뢰 (개발용)
    TrustAllCertificates,
    /// 특정 인증서만 신뢰
    TrustCustomCas {
        /// DER 인코딩 인증서들
        certificates: Vec<Vec<u8>>,
    },
}

// ============================================================================
// DriverConfig - 드라이버 설정
// ============================================================================

/// 드라이버 설정
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// 파싱된 URI
    pub uri: BoltUri,
    /// 인증 토큰
    pub auth: AuthToken,
    /// 명시적 암호화 설정 (URI 접미사와 함께 쓸 수 없음)
    pub encrypted: Option<bool>,
    /// 명시적 신뢰 전략 (URI 접미사와 함께 쓸 수 없음)
    pub trust_strategy: Option<TrustStrategy>,
    /// 암호화 계층
    pub security: Option<Arc<dyn TransportSecurity>>,
    /// 주소당 최대 연결 수
    pub max_connection_pool_size: usize,
    /// 주소당 최대 유휴 연결 수 (`None`이면 풀 크기)
    pub max_idle_connections: Option<usize>,
    /// 연결 획득 타임아웃
    pub connection_acquisition_timeout: Duration,
    /// 연결 타임아웃 (TCP, 핸드셰이크, HELLO 포함)
    pub connection_timeout: Duration,
    /// 연결 최대 수명
    pub max_connection_lifetime: Option<Duration>,
    /// 유휴 연결 폐기 기준
    pub connection_idle_timeout: Option<Duration>,
    /// 활성 확인 기준 유휴 시간
    pub liveness_check_timeout: Option<Duration>,
    /// 최대 트랜잭션 재시도 시간
    pub max_transaction_retry_time: Duration,
    /// 사용자 에이전트
    pub user_agent: String,
    /// 기본 Fetch Size
    pub fetch_size: i64,
    /// 만료된 라우팅 테이블을 보관하는 시간
    pub routing_table_purge_delay: Duration,
    /// 드라이버 단위 알림 필터
    pub notifications: NotificationConfig,
    /// 텔레메트리 비활성화
    pub telemetry_disabled: bool,
    /// 수신 메시지 최대 크기
    pub max_message_size: usize,
}

impl DriverConfig {
    /// 새 설정 생성
    pub fn new(uri: &str, auth: AuthToken) -> DriverResult<Self> {
        Ok(Self {
            uri: BoltUri::parse(uri)?,
            auth,
            encrypted: None,
            trust_strategy: None,
            security: None,
            max_connection_pool_size: 100,
            max_idle_connections: None,
            connection_acquisition_timeout: Duration::from_secs(60),
            connection_timeout: Duration::from_secs(30),
            max_connection_lifetime: Some(Duration::from_secs(3600)),
            connection_idle_timeout: None,
            liveness_check_timeout: None,
            max_transaction_retry_time: Duration::from_secs(30),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            fetch_size: 1000,
            routing_table_purge_delay: Duration::from_secs(30),
            notifications: NotificationConfig::default(),
            telemetry_disabled: false,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
        })
    }

    /// 빌더 생성
    pub fn builder(uri: &str, auth: AuthToken) -> DriverResult<DriverConfigBuilder> {
        Ok(DriverConfigBuilder {
            config: Self::new(uri, auth)?,
        })
    }

    /// 초기 주소
    pub fn address(&self) -> &ServerAddress {
        &self.uri.address
    }

    /// 암호화 여부 (URI 접미사 또는 명시적 설정)
    pub fn is_encrypted(&self) -> bool {
        self.uri.encryption.is_specified() || self.encrypted.unwrap_or(false)
    }

    /// 적용될 신뢰 전략; 암호화하지 않으면 `None`
    pub fn trust(&self) -> Option<TrustStrategy> {
        match self.uri.encryption {
            UriEncryption::SystemCas => Some(TrustStrategy::TrustSystemCas),
            UriEncryption::AnyCertificate => Some(TrustStrategy::TrustAllCertificates),
            UriEncryption::Unspecified if self.encrypted.unwrap_or(false) => {
                Some(self.trust_strategy.clone().unwrap_or_default())
            }
            UriEncryption::Unspecified => None,
        }
    }

    /// 설정 검증
    pub fn validate(&self) -> DriverResult<()> {
        if self.uri.encryption.is_specified() && (self.encrypted.is_some() || self.trust_strategy.is_some()) {
            return Err(DriverError::configuration(
                "Encryption and trust settings cannot be combined with a +s or +ssc URI scheme",
            ));
        }
        if self.is_encrypted() && self.security.is_none() {
            return Err(DriverError::configuration(
                "Encryption requested but no TransportSecurity was supplied",
            ));
        }
        if self.max_connection_pool_size == 0 {
            return Err(DriverError::configuration("Connection pool size must be at least 1"));
        }
        if self.fetch_size == 0 || self.fetch_size < -1 {
            return Err(DriverError::configuration(format!(
                "Fetch size must be positive or -1, got {}",
                self.fetch_size
            )));
        }
        Ok(())
    }

    /// 풀 설정 도출
    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig::builder()
            .max_size(self.max_connection_pool_size)
            .max_idle(self.max_idle_connections.unwrap_or(self.max_connection_pool_size))
            .acquisition_timeout(self.connection_acquisition_timeout)
            .max_lifetime(self.max_connection_lifetime)
            .idle_timeout(self.connection_idle_timeout)
            .liveness_check_timeout(self.liveness_check_timeout)
            .build()
    }

    /// 연결 설정 도출
    pub fn connection_settings(&self) -> ConnectionSettings {
        let routing_context = self.uri.routing.then(|| self.routing_context());
        ConnectionSettings {
            auth: self.auth.clone(),
            user_agent: self.user_agent.clone(),
            routing_context,
            notifications: self.notifications.clone(),
            connection_timeout: self.connection_timeout,
            max_message_size: self.max_message_size,
            telemetry: !self.telemetry_disabled,
            security: if self.is_encrypted() { self.security.clone() } else { None },
            ..ConnectionSettings::default()
        }
    }

    fn routing_context(&self) -> HashMap<String, PackStreamValue> {
        self.uri
            .routing_context
            .iter()
            .map(|(k, v)| (k.clone(), PackStreamValue::from(v.as_str())))
            .collect()
    }
}

// ============================================================================
// DriverConfigBuilder - 드라이버 설정 빌더
// ============================================================================

/// 드라이버 설정 빌더
#[derive(Debug)]
pub struct DriverConfigBuilder {
    config: DriverConfig,
}

impl DriverConfigBuilder {
    /// 암호화 설정
    pub fn with_encrypted(mut self, encrypted: bool) -> Self {
        self.config.encrypted = Some(encrypted);
        self
    }

    /// 신뢰 전략 설정
    pub fn with_trust_strategy(mut self, strategy: TrustStrategy) -> Self {
        self.config.trust_strategy = Some(strategy);
        self
    }

    /// 암호화 계층 설정
    pub fn with_security(mut self, security: Arc<dyn TransportSecurity>) -> Self {
        self.config.security = Some(security);
        self
    }

    /// 최대 풀 크기 설정
    pub fn with_max_connection_pool_size(mut self, size: usize) -> Self {
        self.config.max_connection_pool_size = size;
        self
    }

    /// 최대 유휴 연결 수 설정
    pub fn with_max_idle_connections(mut self, size: usize) -> Self {
        self.config.max_idle_connections = Some(size);
        self
    }

    /// 연결 획득 타임아웃 설정
    pub fn with_connection_acquisition_timeout(mut self, timeout: Duration) -> Self {
        self.config.connection_acquisition_timeout = timeout;
        self
    }

    /// 연결 타임아웃 설정
    pub fn with_connection_timeout(mut self, timeout: Duration) -> Self {
        self.config.connection_timeout = timeout;
        self
    }

    /// 연결 최대 수명 설정 (`None`이면 무제한)
    pub fn with_max_connection_lifetime(mut self, lifetime: Option<Duration>) -> Self {
        self.config.max_connection_lifetime = lifetime;
        self
    }

    /// 유휴 타임아웃 설정
    pub fn with_connection_idle_timeout(mut self, timeout: Duration) -> Self {
        self.config.connection_idle_timeout = Some(timeout);
        self
    }

    /// 활성 확인 기준 설정
    pub fn with_liveness_check_timeout(mut self, timeout: Duration) -> Self {
        self.config.liveness_check_timeout = Some(timeout);
        self
    }

    /// 최대 재시도 시간 설정
    pub fn with_max_transaction_retry_time(mut self, time: Duration) -> Self {
        self.config.max_transaction_retry_time = time;
        self
    }

    /// 사용자 에이전트 설정
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    /// Fetch Size 설정 (-1은 전부)
    pub fn with_fetch_size(mut self, size: i64) -> Self {
        self.config.fetch_size = size;
        self
    }

    /// 라우팅 테이블 보관 시간 설정
    pub fn with_routing_table_purge_delay(mut self, delay: Duration) -> Self {
        self.config.routing_table_purge_delay = delay;
        self
    }

    /// 알림 필터 설정
    pub fn with_notifications(mut self, notifications: NotificationConfig) -> Self {
        self.config.notifications = notifications;
        self
    }

    /// 텔레메트리 비활성화
    pub fn with_telemetry_disabled(mut self, disabled: bool) -> Self {
        self.config.telemetry_disabled = disabled;
        self
    }

    /// 수신 메시지 최대 크기 설정
    pub fn with_max_message_size(mut self, size: usize) -> Self {
        self.config.max_message_size = size;
        self
    }

    /// 빌드
    pub fn build(self) -> DriverConfig {
        self.config
    }
}

// ============================================================================
// Driver - 드라이버
// ============================================================================

/// 그래프 데이터베이스 드라이버
pub struct Driver {
    /// 설정
    config: DriverConfig,
    /// 연결 제공자
    provider: Arc<dyn ConnectionProvider>,
    /// 열린 상태
    open: RwLock<bool>,
}

impl Driver {
    /// 새 드라이버 생성
    pub fn new(uri: &str, auth: AuthToken) -> DriverResult<Self> {
        Self::with_config(DriverConfig::new(uri, auth)?)
    }

    /// 설정으로 드라이버 생성
    ///
    /// 연결은 세션이 처음 필요로 할 때 만들어집니다.
    pub fn with_config(config: DriverConfig) -> DriverResult<Self> {
        config.validate()?;
        let connector = Arc::new(TcpConnector::new(config.connection_settings()));
        Self::with_connector(config, connector)
    }

    /// 연결 생성기를 지정해 드라이버 생성
    pub(crate) fn with_connector(config: DriverConfig, connector: Arc<dyn Connector>) -> DriverResult<Self> {
        let pools = Arc::new(ClusterPool::new(config.pool_config(), connector));
        let timeout = config.connection_acquisition_timeout;

        let provider: Arc<dyn ConnectionProvider> = if config.uri.routing {
            let discovery = Rediscovery::new(
                config.address().clone(),
                pools.clone(),
                config.routing_context(),
                timeout,
            );
            let manager = RoutingTableManager::new(discovery, pools.clone(), config.routing_table_purge_delay);
            Arc::new(RoutingProvider::new(manager, pools, timeout))
        } else {
            Arc::new(DirectProvider::new(config.address().clone(), pools, timeout))
        };

        tracing::debug!(
            address = %config.address(),
            routing = config.uri.routing,
            encrypted = config.is_encrypted(),
            "driver created"
        );

        Ok(Self {
            config,
            provider,
            open: RwLock::new(true),
        })
    }

    /// 세션 생성
    pub fn session(&self, config: SessionConfig) -> DriverResult<Session> {
        self.ensure_open()?;
        Ok(Session::new(
            self.provider.clone(),
            config,
            self.config.fetch_size,
            RetryPolicy::new(self.config.max_transaction_retry_time),
        ))
    }

    /// 기본 설정으로 세션 생성
    pub fn default_session(&self) -> DriverResult<Session> {
        self.session(SessionConfig::default())
    }

    /// 드라이버 설정
    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// 서버에 연결해 인증까지 되는지 확인
    pub async fn verify_connectivity(&self) -> DriverResult<()> {
        self.server_info().await.map(|_| ())
    }

    /// 서버 정보 조회 (연결 하나를 빌려 확인)
    pub async fn server_info(&self) -> DriverResult<ServerInfo> {
        self.ensure_open()?;
        let request = DiscoveryRequest::new(AccessMode::Read, None);
        let acquired = self.provider.acquire(&request).await?;
        let info = ServerInfo::of(&acquired.connection);
        acquired.connection.release().await;
        Ok(info)
    }

    /// 다중 데이터베이스 지원 여부 (Bolt 4.0 이상)
    pub async fn supports_multi_db(&self) -> DriverResult<bool> {
        Ok(self.server_info().await?.protocol_version >= BoltVersion::V4_0)
    }

    /// 드라이버 종료; 모든 풀을 닫습니다
    pub async fn close(&self) -> DriverResult<()> {
        {
            let mut open = self.open.write();
            if !*open {
                return Ok(());
            }
            *open = false;
        }
        self.provider.close().await;
        tracing::debug!(address = %self.config.address(), "driver closed");
        Ok(())
    }

    /// 열린 상태 확인
    fn ensure_open(&self) -> DriverResult<()> {
        if *self.open.read() {
            Ok(())
        } else {
            Err(DriverError::PoolClosed("Driver is closed".to_string()))
        }
    }

    /// 메트릭 조회
    pub fn metrics(&self) -> DriverMetrics {
        DriverMetrics::from_pools(self.provider.pools().metrics())
    }
}

impl fmt::Debug for Driver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Driver")
            .field("address", self.config.address())
            .field("routing", &self.config.uri.routing)
            .field("open", &*self.open.read())
            .finish()
    }
}

// ============================================================================
// ServerInfo - 서버 정보
// ============================================================================

/// 서버 정보
#[derive(Debug, Clone, PartialEq)]
pub struct ServerInfo {
    /// 서버 주소
    pub address: ServerAddress,
    /// 서버 에이전트
    pub agent: String,
    /// 협상된 프로토콜 버전
    pub protocol_version: BoltVersion,
}

impl ServerInfo {
    pub(crate) fn of(connection: &Connection) -> Self {
        Self {
            address: connection.address().clone(),
            agent: connection.server_agent().to_string(),
            protocol_version: connection.version(),
        }
    }
}

impl fmt::Display for ServerInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Server @ {} (Agent: {}, Protocol: {})",
            self.address, self.agent, self.protocol_version
        )
    }
}

// ============================================================================
// DriverMetrics - 드라이버 메트릭
// ============================================================================

/// 드라이버 메트릭
#[derive(Debug, Clone, Default)]
pub struct DriverMetrics {
    /// 전체 연결 수 (유휴 + 사용 중)
    pub pool_size: usize,
    /// 유휴 연결 수
    pub idle_connections: usize,
    /// 사용 중인 연결 수
    pub in_use_connections: usize,
    /// 총 연결 획득 횟수
    pub total_acquisitions: u64,
    /// 총 생성된 연결 수
    pub total_connections_created: u64,
    /// 총 닫힌 연결 수
    pub total_connections_closed: u64,
    /// 총 획득 타임아웃 횟수
    pub total_acquisition_timeouts: u64,
    /// 주소별 풀 메트릭
    pub per_address: HashMap<ServerAddress, PoolMetrics>,
}

impl DriverMetrics {
    fn from_pools(per_address: HashMap<ServerAddress, PoolMetrics>) -> Self {
        let mut metrics = Self::default();
        for pool in per_address.values() {
            metrics.idle_connections += pool.idle;
            metrics.in_use_connections += pool.in_use;
            metrics.total_acquisitions += pool.total_acquisitions;
            metrics.total_connections_created += pool.total_created;
            metrics.total_connections_closed += pool.total_closed;
            metrics.total_acquisition_timeouts += pool.total_timeouts;
        }
        metrics.pool_size = metrics.idle_connections + metrics.in_use_connections;
        metrics.per_address = per_address;
        metrics
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bolt::message::tag;
    use crate::bolt::SuccessMessage;
    use crate::driver::bolt::BoxedStream;
    use crate::driver::testing::{routing_table, Script, StubConnector, StubServer, STUB_AGENT};
    use async_trait::async_trait;
    use tokio::net::TcpStream;

    #[derive(Debug)]
    struct NoopSecurity;

    #[async_trait]
    impl TransportSecurity for NoopSecurity {
        async fn secure(&self, _address: &ServerAddress, stream: TcpStream) -> std::io::Result<BoxedStream> {
            Ok(Box::new(stream))
        }
    }

    fn stub_driver(uri: &str, servers: &[&StubServer]) -> Driver {
        let config = DriverConfig::new(uri, AuthToken::basic("neo4j", "pass")).unwrap();
        let connector = StubConnector::with_servers(config.connection_settings(), servers);
        Driver::with_connector(config, Arc::new(connector)).unwrap()
    }

    #[test]
    fn test_driver_config_defaults() {
        let config = DriverConfig::new("bolt://localhost:7687", AuthToken::basic("neo4j", "test")).unwrap();

        assert_eq!(config.address().host, "localhost");
        assert_eq!(config.address().port, 7687);
        assert_eq!(config.max_connection_pool_size, 100);
        assert_eq!(config.connection_acquisition_timeout, Duration::from_secs(60));
        assert_eq!(config.max_transaction_retry_time, Duration::from_secs(30));
        assert_eq!(config.fetch_size, 1000);
        assert!(!config.is_encrypted());
        assert_eq!(config.trust(), None);

        let pool = config.pool_config();
        assert_eq!(pool.max_size, 100);
        assert_eq!(pool.max_idle, 100);
        assert_eq!(pool.max_lifetime, Some(Duration::from_secs(3600)));
        assert_eq!(pool.idle_timeout, None);
    }

    #[test]
    fn test_driver_config_builder() {
        let config = DriverConfig::builder("neo4j://core1:7688?region=eu", AuthToken::none())
            .unwrap()
            .with_max_connection_pool_size(50)
            .with_max_idle_connections(10)
            .with_connection_timeout(Duration::from_secs(10))
            .with_connection_idle_timeout(Duration::from_secs(120))
            .with_fetch_size(500)
            .with_user_agent("my-app/1.0")
            .with_telemetry_disabled(true)
            .build();

        assert_eq!(config.pool_config().max_idle, 10);
        assert_eq!(config.pool_config().idle_timeout, Some(Duration::from_secs(120)));

        let settings = config.connection_settings();
        assert_eq!(settings.user_agent, "my-app/1.0");
        assert_eq!(settings.connection_timeout, Duration::from_secs(10));
        assert!(!settings.telemetry);
        let context = settings.routing_context.unwrap();
        assert_eq!(context["region"], PackStreamValue::from("eu"));
        assert_eq!(context["address"], PackStreamValue::from("core1:7688"));
    }

    #[test]
    fn test_direct_uri_has_no_routing_context() {
        let config = DriverConfig::new("bolt://localhost", AuthToken::none()).unwrap();
        assert!(config.connection_settings().routing_context.is_none());
    }

    #[test]
    fn test_encryption_validation() {
        // 접미사 + 명시적 설정
        let config = DriverConfig::builder("bolt+s://secure:7687", AuthToken::none())
            .unwrap()
            .with_encrypted(true)
            .with_security(Arc::new(NoopSecurity))
            .build();
        assert!(matches!(config.validate(), Err(DriverError::Configuration(_))));

        // 암호화 계층 없음
        let config = DriverConfig::new("neo4j+ssc://secure:7687", AuthToken::none()).unwrap();
        assert!(matches!(Driver::with_config(config), Err(DriverError::Configuration(_))));

        let config = DriverConfig::builder("bolt+ssc://secure:7687", AuthToken::none())
            .unwrap()
            .with_security(Arc::new(NoopSecurity))
            .build();
        assert!(config.validate().is_ok());
        assert_eq!(config.trust(), Some(TrustStrategy::TrustAllCertificates));
        assert!(config.connection_settings().security.is_some());

        let config = DriverConfig::builder("bolt://plain:7687", AuthToken::none())
            .unwrap()
            .with_encrypted(true)
            .with_security(Arc::new(NoopSecurity))
            .build();
        assert_eq!(config.trust(), Some(TrustStrategy::TrustSystemCas));
    }

    #[test]
    fn test_invalid_config_values() {
        let config = DriverConfig::builder("bolt://localhost", AuthToken::none())
            .unwrap()
            .with_fetch_size(0)
            .build();
        assert!(config.validate().is_err());

        let config = DriverConfig::builder("bolt://localhost", AuthToken::none())
            .unwrap()
            .with_max_connection_pool_size(0)
            .build();
        assert!(config.validate().is_err());

        assert!(DriverConfig::new("http://localhost", AuthToken::none()).is_err());
    }

    #[test]
    fn test_server_info_display() {
        let info = ServerInfo {
            address: ServerAddress::new("localhost", 7687),
            agent: "Neo4j/5.13.0".to_string(),
            protocol_version: BoltVersion::V5_4,
        };
        assert_eq!(info.to_string(), "Server @ localhost:7687 (Agent: Neo4j/5.13.0, Protocol: 5.4)");
    }

    #[tokio::test]
    async fn test_verify_connectivity_and_server_info() {
        let server = StubServer::at("localhost:7687", BoltVersion::V5_4);
        let driver = stub_driver("bolt://localhost:7687", &[&server]);

        driver.verify_connectivity().await.unwrap();
        let info = driver.server_info().await.unwrap();
        assert_eq!(info.agent, STUB_AGENT);
        assert_eq!(info.protocol_version, BoltVersion::V5_4);
        assert!(driver.supports_multi_db().await.unwrap());

        // 같은 연결을 재사용
        assert_eq!(server.connections(), 1);
        let metrics = driver.metrics();
        assert_eq!(metrics.idle_connections, 1);
        assert_eq!(metrics.in_use_connections, 0);
        assert_eq!(metrics.total_connections_created, 1);
        assert_eq!(metrics.total_acquisitions, 3);
    }

    #[tokio::test]
    async fn test_routing_driver_sends_routing_context() {
        let seed = StubServer::at("router:7687", BoltVersion::V5_0);
        seed.push(Script::success(SuccessMessage::new().with(
            "rt",
            routing_table(300, &["router:7687"], &["router:7687"], &["router:7687"]),
        )));
        let driver = stub_driver("neo4j://router:7687?policy=fast", &[&seed]);

        driver.verify_connectivity().await.unwrap();

        let hello = seed.received().into_iter().find(|s| s.tag == tag::HELLO).unwrap();
        let routing = hello.fields[0].as_map().unwrap()["routing"].clone();
        let routing = routing.as_map().unwrap();
        assert_eq!(routing["policy"], PackStreamValue::from("fast"));
        assert_eq!(seed.count(tag::ROUTE), 1);
    }

    #[tokio::test]
    async fn test_closed_driver_rejects_sessions() {
        let server = StubServer::at("localhost:7687", BoltVersion::V5_0);
        let driver = stub_driver("bolt://localhost:7687", &[&server]);
        let session = driver.default_session().unwrap();
        session.run("RETURN 1", None).await.unwrap();

        driver.close().await.unwrap();
        driver.close().await.unwrap();
        assert!(driver.session(SessionConfig::default()).is_err());
        assert!(driver.verify_connectivity().await.is_err());
    }

    #[tokio::test]
    async fn test_unreachable_server_fails_connectivity() {
        let server = StubServer::at("localhost:7687", BoltVersion::V5_0);
        let driver = stub_driver("bolt://elsewhere:7687", &[&server]);
        assert!(driver.verify_connectivity().await.is_err());
    }
}
