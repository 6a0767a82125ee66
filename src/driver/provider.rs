//! Connection Provider
//!
//! 세션이 연결을 얻는 경로. 직접 연결은 한 주소의 풀을, 라우팅 연결은
//! 라우팅 테이블로 주소를 고른 뒤 그 주소의 풀을 사용합니다.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::error::{DriverError, DriverResult, SecurityKind};
use super::pool::{ClusterPool, PooledConnection};
use super::routing::DiscoveryRequest;
use super::uri::ServerAddress;

/// 획득한 연결과 그 연결이 속한 데이터베이스
#[derive(Debug)]
pub struct AcquiredConnection {
    /// 풀링된 연결
    pub connection: PooledConnection,
    /// 확정된 데이터베이스 (홈 데이터베이스가 해석되었으면 그 이름)
    pub database: Option<String>,
}

/// 연결 제공자
#[async_trait]
pub trait ConnectionProvider: Send + Sync + std::fmt::Debug {
    /// 요청 조건에 맞는 연결 획득
    async fn acquire(&self, request: &DiscoveryRequest) -> DriverResult<AcquiredConnection>;

    /// 연결에서 발생한 에러를 라우팅/풀 상태에 반영
    async fn on_error(&self, error: &DriverError, address: &ServerAddress, database: Option<&str>);

    /// 주소별 풀 레지스트리
    fn pools(&self) -> &ClusterPool;

    /// 라우팅 여부
    fn is_routing(&self) -> bool;

    /// 제공자 종료
    async fn close(&self);
}

/// 권한 만료 시 해당 주소의 기존 연결을 오래된 것으로 표시
pub(crate) fn mark_stale_auth_on(error: &DriverError, pools: &ClusterPool, address: &ServerAddress) -> bool {
    if error.security_kind() == Some(SecurityKind::AuthorizationExpired) {
        tracing::debug!(address = %address, "authorization expired; marking pooled connections stale");
        pools.mark_stale_auth(address);
        return true;
    }
    false
}

// ============================================================================
// DirectProvider - 직접 연결
// ============================================================================

/// 단일 서버 연결 제공자
#[derive(Debug)]
pub struct DirectProvider {
    address: ServerAddress,
    pools: Arc<ClusterPool>,
    acquisition_timeout: Duration,
}

impl DirectProvider {
    /// 새 직접 연결 제공자
    pub fn new(address: ServerAddress, pools: Arc<ClusterPool>, acquisition_timeout: Duration) -> Self {
        Self {
            address,
            pools,
            acquisition_timeout,
        }
    }

    /// 서버 주소
    pub fn address(&self) -> &ServerAddress {
        &self.address
    }
}

#[async_trait]
impl ConnectionProvider for DirectProvider {
    async fn acquire(&self, request: &DiscoveryRequest) -> DriverResult<AcquiredConnection> {
        let connection = self.pools.acquire(&self.address, self.acquisition_timeout).await?;
        Ok(AcquiredConnection {
            connection,
            database: request.database.clone(),
        })
    }

    async fn on_error(&self, error: &DriverError, address: &ServerAddress, _database: Option<&str>) {
        mark_stale_auth_on(error, &self.pools, address);
    }

    fn pools(&self) -> &ClusterPool {
        &self.pools
    }

    fn is_routing(&self) -> bool {
        false
    }

    async fn close(&self) {
        self.pools.close().await;
    }
}
