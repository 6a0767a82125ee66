//! 라우팅 테이블 관리자
//!
//! 데이터베이스별 테이블 스냅샷을 `RwLock<Arc<_>>` 형태로 보관하고 통째로
//! 교체합니다. 같은 데이터베이스의 동시 갱신 요청은 하나의 진행 중인
//! 디스커버리를 공유하되, 결과가 자기 요청에 맞지 않으면 다시 갱신합니다.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::{Mutex, RwLock};

use super::super::error::DriverResult;
use super::super::pool::ClusterPool;
use super::super::uri::ServerAddress;
use super::discovery::{DiscoveryRequest, Rediscovery};
use super::policy::LoadBalancer;
use super::table::RoutingTable;

type TableKey = Option<String>;
type SharedRefresh = Shared<BoxFuture<'static, DriverResult<Arc<RoutingTable>>>>;

/// 진행 중인 갱신과 그 갱신을 시작한 요청
struct InFlight {
    request: DiscoveryRequest,
    refresh: SharedRefresh,
}

/// 라우팅 테이블 관리자
pub struct RoutingTableManager {
    discovery: Rediscovery,
    pools: Arc<ClusterPool>,
    balancer: LoadBalancer,
    tables: RwLock<HashMap<TableKey, Arc<RoutingTable>>>,
    refreshes: Mutex<HashMap<TableKey, InFlight>>,
    purge_delay: Duration,
}

impl RoutingTableManager {
    /// 새 관리자 생성
    pub fn new(discovery: Rediscovery, pools: Arc<ClusterPool>, purge_delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            discovery,
            pools,
            balancer: LoadBalancer::new(),
            tables: RwLock::new(HashMap::new()),
            refreshes: Mutex::new(HashMap::new()),
            purge_delay,
        })
    }

    /// 로드 밸런서
    pub fn balancer(&self) -> &LoadBalancer {
        &self.balancer
    }

    /// 시드 라우터 주소
    pub fn seed(&self) -> &ServerAddress {
        self.discovery.seed()
    }

    /// 현재 스냅샷
    pub fn routing_table(&self, database: Option<&str>) -> Option<Arc<RoutingTable>> {
        self.tables.read().get(&database.map(str::to_string)).cloned()
    }

    fn fresh_table(&self, request: &DiscoveryRequest) -> Option<Arc<RoutingTable>> {
        self.tables
            .read()
            .get(&request.database)
            .filter(|table| !table.is_stale_for(request.mode))
            .cloned()
    }

    /// `request.mode`에 쓸 수 있는 테이블 반환 (필요하면 갱신)
    ///
    /// 진행 중인 갱신이 있으면 그 결과를 기다립니다. 그 갱신이 다른 북마크나
    /// 대리 사용자로 시작되었거나, 결과에 `request.mode` 역할의 서버가 없으면
    /// 자기 요청으로 다시 갱신합니다.
    pub async fn ensure_table(self: &Arc<Self>, request: DiscoveryRequest) -> DriverResult<Arc<RoutingTable>> {
        let mut use_cache = true;

        loop {
            if use_cache {
                if let Some(table) = self.fresh_table(&request) {
                    return Ok(table);
                }
            }

            let (refresh, started_by) = {
                let mut refreshes = self.refreshes.lock();
                match refreshes.get(&request.database) {
                    Some(in_flight) => (in_flight.refresh.clone(), Some(in_flight.request.clone())),
                    None => {
                        // 락을 잡은 뒤 다시 확인 (직전에 끝난 갱신)
                        if use_cache {
                            if let Some(table) = self.fresh_table(&request) {
                                return Ok(table);
                            }
                        }
                        let refresh = self.clone().refresh(request.clone()).boxed().shared();
                        refreshes.insert(
                            request.database.clone(),
                            InFlight {
                                request: request.clone(),
                                refresh: refresh.clone(),
                            },
                        );
                        (refresh, None)
                    }
                }
            };

            let result = refresh.await;
            let Some(started_by) = started_by else {
                return result;
            };

            if !same_context(&started_by, &request) {
                tracing::debug!(db = ?request.database, "joined refresh used other bookmarks or user; refreshing again");
                use_cache = false;
                continue;
            }
            match result {
                Ok(table) if !table.is_stale_for(request.mode) => return Ok(table),
                Err(e) if started_by.mode == request.mode => return Err(e),
                _ => {
                    tracing::debug!(db = ?request.database, mode = ?request.mode, "joined refresh unusable for this mode; refreshing again");
                }
            }
        }
    }

    async fn refresh(self: Arc<Self>, request: DiscoveryRequest) -> DriverResult<Arc<RoutingTable>> {
        let current = self
            .tables
            .read()
            .get(&request.database)
            .cloned()
            .unwrap_or_else(|| Arc::new(RoutingTable::initial(request.database.clone(), self.seed().clone())));

        tracing::debug!(db = ?request.database, mode = ?request.mode, "refreshing routing table");
        let mut unreachable = Vec::new();
        let result = self.discovery.lookup_with(&current, &request, &mut unreachable).await;
        for router in &unreachable {
            self.forget(router).await;
        }

        let outcome = match result {
            Ok(table) => {
                let table = Arc::new(table);
                self.publish(&request.database, table.clone()).await;
                Ok(table)
            }
            Err(e) => {
                // 이전 스냅샷은 그대로 유지
                tracing::warn!(db = ?request.database, error = %e, "routing table refresh failed");
                Err(e)
            }
        };

        self.refreshes.lock().remove(&request.database);
        outcome
    }

    async fn publish(&self, requested: &TableKey, table: Arc<RoutingTable>) {
        let referenced = {
            let mut tables = self.tables.write();
            tables.retain(|_, t| !t.is_purgeable(self.purge_delay));
            tables.insert(table.database.clone(), table.clone());
            // 홈 데이터베이스 요청은 해석된 이름으로도 찾을 수 있게
            if requested != &table.database {
                tables.insert(requested.clone(), table.clone());
            }

            let mut referenced: HashSet<ServerAddress> =
                tables.values().flat_map(|t| t.all_servers()).collect();
            referenced.insert(self.seed().clone());
            referenced
        };

        self.balancer.new_epoch();
        if let Err(e) = self.pools.add(&referenced) {
            tracing::debug!(error = %e, "skipping pool reconciliation");
            return;
        }
        self.pools.retain(&referenced).await;
        tracing::info!(table = %table, "routing table updated");
    }

    /// 서버를 모든 테이블에서 제거하고 풀을 비활성화
    pub async fn forget(&self, address: &ServerAddress) {
        {
            let mut tables = self.tables.write();
            for table in tables.values_mut() {
                if table.contains(address) {
                    *table = Arc::new(table.without(address));
                }
            }
        }
        self.balancer.mark_unreachable(address);
        self.pools.deactivate(address).await;
        tracing::info!(address = %address, "server forgotten");
    }

    /// 데이터베이스 테이블의 라이터에서만 제거
    pub fn forget_writer(&self, address: &ServerAddress, database: Option<&str>) {
        let mut tables = self.tables.write();
        for (key, table) in tables.iter_mut() {
            if key.as_deref() == database || table.database.as_deref() == database {
                *table = Arc::new(table.without_writer(address));
            }
        }
        tracing::info!(address = %address, db = ?database, "writer forgotten");
    }

    /// 다음 요청에서 갱신하도록 테이블 무효화
    pub fn invalidate(&self, database: Option<&str>) {
        let mut tables = self.tables.write();
        if let Some(table) = tables.get_mut(&database.map(str::to_string)) {
            *table = Arc::new(table.invalidated());
        }
    }

    /// 모든 테이블 제거
    pub fn clear(&self) {
        self.tables.write().clear();
    }
}

fn same_context(a: &DiscoveryRequest, b: &DiscoveryRequest) -> bool {
    a.bookmarks == b.bookmarks && a.impersonated_user == b.impersonated_user
}

impl std::fmt::Debug for RoutingTableManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoutingTableManager")
            .field("seed", self.seed())
            .field("tables", &self.tables.read().len())
            .field("purge_delay", &self.purge_delay)
            .finish()
    }
}
