//! 라우팅 연결 제공자
//!
//! 라우팅 테이블을 확보하고, 접근 모드에 맞는 서버를 골라 그 서버의 풀에서
//! 연결을 얻습니다. 연결할 수 없는 서버는 잊고 다음 후보로 넘어갑니다.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::super::error::{DriverError, DriverResult};
use super::super::pool::ClusterPool;
use super::super::provider::{mark_stale_auth_on, AcquiredConnection, ConnectionProvider};
use super::super::uri::ServerAddress;
use super::discovery::DiscoveryRequest;
use super::manager::RoutingTableManager;

/// 라우팅 연결 제공자
#[derive(Debug)]
pub struct RoutingProvider {
    manager: Arc<RoutingTableManager>,
    pools: Arc<ClusterPool>,
    acquisition_timeout: Duration,
}

impl RoutingProvider {
    /// 새 라우팅 제공자
    pub fn new(manager: Arc<RoutingTableManager>, pools: Arc<ClusterPool>, acquisition_timeout: Duration) -> Self {
        Self {
            manager,
            pools,
            acquisition_timeout,
        }
    }

    /// 라우팅 테이블 관리자
    pub fn manager(&self) -> &Arc<RoutingTableManager> {
        &self.manager
    }
}

#[async_trait]
impl ConnectionProvider for RoutingProvider {
    async fn acquire(&self, request: &DiscoveryRequest) -> DriverResult<AcquiredConnection> {
        let mut table = self.manager.ensure_table(request.clone()).await?;

        loop {
            let address = self.manager.balancer().select(&table, request.mode)?;
            match self.pools.acquire(&address, self.acquisition_timeout).await {
                Ok(connection) => {
                    return Ok(AcquiredConnection {
                        connection,
                        database: table.database.clone(),
                    })
                }
                Err(e) if e.invalidates_routing() => {
                    tracing::warn!(address = %address, error = %e, "server unreachable; trying another");
                    self.manager.forget(&address).await;
                    table = Arc::new(table.without(&address));
                }
                Err(e) => {
                    mark_stale_auth_on(&e, &self.pools, &address);
                    return Err(e);
                }
            }
        }
    }

    async fn on_error(&self, error: &DriverError, address: &ServerAddress, database: Option<&str>) {
        if mark_stale_auth_on(error, &self.pools, address) {
            return;
        }
        match error {
            DriverError::SessionExpired { lost_writer: true, .. } => {
                self.manager.forget_writer(address, database);
            }
            e if e.invalidates_routing() => {
                self.manager.forget(address).await;
                // 남은 라우터나 리더가 없으면 다음 요청에서 바로 다시 조회
                let exhausted = self
                    .manager
                    .routing_table(database)
                    .is_some_and(|table| table.routers.is_empty() || table.readers.is_empty());
                if exhausted {
                    tracing::debug!(db = ?database, "no usable servers left; invalidating routing table");
                    self.manager.invalidate(database);
                }
            }
            _ => {}
        }
    }

    fn pools(&self) -> &ClusterPool {
        &self.pools
    }

    fn is_routing(&self) -> bool {
        true
    }

    async fn close(&self) {
        self.manager.clear();
        self.pools.close().await;
    }
}
