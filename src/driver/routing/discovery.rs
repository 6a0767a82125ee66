//! 라우팅 테이블 디스커버리
//!
//! 알려진 라우터에 차례로 라우팅 테이블을 요청합니다. 보안 에러와
//! 데이터베이스 부재 같은 치명적 에러는 즉시 전파하고, 나머지 실패는
//! 기록한 뒤 다음 라우터로 넘어갑니다.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use crate::bolt::protocol::RouteParams;
use crate::bolt::{AccessMode, PackStreamValue};

use super::super::error::{DriverError, DriverResult};
use super::super::pool::ClusterPool;
use super::super::uri::ServerAddress;
use super::table::RoutingTable;

/// 라우팅 테이블 요청 조건
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveryRequest {
    /// 접근 모드
    pub mode: AccessMode,
    /// 데이터베이스 (`None`은 홈 데이터베이스)
    pub database: Option<String>,
    /// 테이블이 반영해야 할 북마크
    pub bookmarks: Vec<String>,
    /// 대리 사용자
    pub impersonated_user: Option<String>,
}

impl DiscoveryRequest {
    /// 모드와 데이터베이스로 요청 생성
    pub fn new(mode: AccessMode, database: Option<String>) -> Self {
        Self {
            mode,
            database,
            ..Self::default()
        }
    }

    /// 북마크 설정
    pub fn with_bookmarks(mut self, bookmarks: Vec<String>) -> Self {
        self.bookmarks = bookmarks;
        self
    }

    /// 대리 사용자 설정
    pub fn with_impersonated_user(mut self, user: Option<String>) -> Self {
        self.impersonated_user = user;
        self
    }
}

/// 라우터 순회기
#[derive(Debug)]
pub struct Rediscovery {
    seed: ServerAddress,
    pools: Arc<ClusterPool>,
    routing_context: HashMap<String, PackStreamValue>,
    acquisition_timeout: Duration,
}

impl Rediscovery {
    /// 새 디스커버리 생성
    pub fn new(
        seed: ServerAddress,
        pools: Arc<ClusterPool>,
        routing_context: HashMap<String, PackStreamValue>,
        acquisition_timeout: Duration,
    ) -> Self {
        Self {
            seed,
            pools,
            routing_context,
            acquisition_timeout,
        }
    }

    /// 시드 라우터 주소
    pub fn seed(&self) -> &ServerAddress {
        &self.seed
    }

    /// `current`의 라우터들로부터 새 테이블 조회
    pub async fn lookup(&self, current: &RoutingTable, request: &DiscoveryRequest) -> DriverResult<RoutingTable> {
        self.lookup_with(current, request, &mut Vec::new()).await
    }

    /// [`lookup`](Self::lookup)과 같지만 연결할 수 없었던 라우터를 `unreachable`에 기록
    pub async fn lookup_with(
        &self,
        current: &RoutingTable,
        request: &DiscoveryRequest,
        unreachable: &mut Vec<ServerAddress>,
    ) -> DriverResult<RoutingTable> {
        let mut tried = HashSet::new();
        let seed = std::slice::from_ref(&self.seed);

        let prepended = current.is_reading_in_absence_of_writer(request.mode);
        let routers = if prepended {
            tracing::debug!(db = ?request.database, "no writers known; asking the seed router first");
            current.with_prepended_routers(seed).routers
        } else {
            current.routers.clone()
        };

        if let Some(table) = self.lookup_on(&routers, request, &mut tried, unreachable).await? {
            return Ok(table);
        }

        if !prepended && !tried.contains(&self.seed) {
            tracing::debug!(seed = %self.seed, "known routers failed; falling back to the seed router");
            if let Some(table) = self.lookup_on(seed, request, &mut tried, unreachable).await? {
                return Ok(table);
            }
        }

        Err(DriverError::service_unavailable(format!(
            "Failed to connect to any routing server (tried {}). \
             Please make sure that the cluster is up and can be accessed by the driver and retry.",
            tried.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
        )))
    }

    async fn lookup_on(
        &self,
        routers: &[ServerAddress],
        request: &DiscoveryRequest,
        tried: &mut HashSet<ServerAddress>,
        unreachable: &mut Vec<ServerAddress>,
    ) -> DriverResult<Option<RoutingTable>> {
        for router in routers {
            if !tried.insert(router.clone()) {
                continue;
            }

            match self.fetch(router, request).await {
                Ok(table) if table.routers.is_empty() => {
                    tracing::error!(router = %router, db = ?request.database, "routing table has no routers");
                    return Err(DriverError::protocol(format!(
                        "Routing table from {} contains no routers",
                        router
                    )));
                }
                Ok(table) if table.is_stale_for(request.mode) => {
                    tracing::debug!(router = %router, db = ?request.database, "skipping stale routing table");
                }
                Ok(table) => return Ok(Some(table)),
                Err(e) if e.is_fatal_for_discovery() => {
                    tracing::error!(router = %router, db = ?request.database, error = %e, "routing table fetch failed fatally");
                    return Err(e);
                }
                Err(e) if e.invalidates_routing() => {
                    tracing::warn!(router = %router, db = ?request.database, error = %e, "router unreachable");
                    unreachable.push(router.clone());
                }
                Err(e) => {
                    tracing::warn!(router = %router, db = ?request.database, error = %e, "failed to update routing table");
                }
            }
        }
        Ok(None)
    }

    async fn fetch(&self, router: &ServerAddress, request: &DiscoveryRequest) -> DriverResult<RoutingTable> {
        let params = RouteParams {
            routing: self.routing_context.clone(),
            bookmarks: request.bookmarks.clone(),
            database: request.database.clone(),
            imp_user: request.impersonated_user.clone(),
        };

        let mut conn = self.pools.acquire(router, self.acquisition_timeout).await?;
        let result = conn.fetch_routing_table(&params).await;
        conn.release().await;

        RoutingTable::from_info(&result?, request.database.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bolt::message::tag;
    use crate::bolt::{BoltErrorCode, BoltVersion, SuccessMessage};
    use crate::driver::bolt::ConnectionSettings;
    use crate::driver::pool::PoolConfig;
    use crate::driver::testing::{routing_table, routing_table_for, Script, StubConnector, StubServer};

    fn route_reply(table: PackStreamValue) -> Script {
        Script::success(SuccessMessage::new().with("rt", table))
    }

    fn rediscovery(seed: &StubServer, others: &[&StubServer]) -> Rediscovery {
        let connector = StubConnector::new(ConnectionSettings::default());
        connector.add(seed);
        for server in others {
            connector.add(server);
        }
        let pools = Arc::new(ClusterPool::new(PoolConfig::default(), Arc::new(connector)));
        Rediscovery::new(seed.address().clone(), pools, HashMap::new(), Duration::from_secs(5))
    }

    fn initial(seed: &StubServer) -> RoutingTable {
        RoutingTable::initial(None, seed.address().clone())
    }

    #[tokio::test]
    async fn test_lookup_from_seed() {
        let seed = StubServer::at("seed:7687", BoltVersion::V5_0);
        seed.push(route_reply(routing_table_for(
            "neo4j",
            300,
            &["seed:7687"],
            &["r1:7687"],
            &["w1:7687"],
        )));

        let discovery = rediscovery(&seed, &[]);
        let table = discovery
            .lookup(&initial(&seed), &DiscoveryRequest::new(AccessMode::Write, None))
            .await
            .unwrap();

        assert_eq!(table.database.as_deref(), Some("neo4j"));
        assert_eq!(table.writers, vec![ServerAddress::new("w1", 7687)]);
        assert_eq!(seed.count(tag::ROUTE), 1);
    }

    #[tokio::test]
    async fn test_failed_router_is_skipped() {
        let seed = StubServer::at("seed:7687", BoltVersion::V5_0);
        let good = StubServer::at("good:7687", BoltVersion::V5_0);
        good.push(route_reply(routing_table(300, &["good:7687"], &["good:7687"], &["good:7687"])));

        let discovery = rediscovery(&seed, &[&good]);
        let current = RoutingTable::initial(None, ServerAddress::new("gone", 7687))
            .with_prepended_routers(&[ServerAddress::new("good", 7687)]);
        let current = current.with_prepended_routers(&[ServerAddress::new("gone", 7687)]);

        let table = discovery
            .lookup(&current, &DiscoveryRequest::new(AccessMode::Read, None))
            .await
            .unwrap();
        assert_eq!(table.routers, vec![ServerAddress::new("good", 7687)]);
        assert_eq!(seed.count(tag::ROUTE), 0);
    }

    #[tokio::test]
    async fn test_unreachable_routers_are_reported() {
        let seed = StubServer::at("seed:7687", BoltVersion::V5_0);
        let good = StubServer::at("good:7687", BoltVersion::V5_0);
        let flaky = StubServer::at("flaky:7687", BoltVersion::V5_0);
        flaky.push(Script::failure("Neo.DatabaseError.General.UnknownError", "boom"));
        good.push(route_reply(routing_table(300, &["good:7687"], &["good:7687"], &["good:7687"])));

        let discovery = rediscovery(&seed, &[&good, &flaky]);
        let current = RoutingTable::initial(None, ServerAddress::new("good", 7687))
            .with_prepended_routers(&[ServerAddress::new("gone", 7687), ServerAddress::new("flaky", 7687)]);

        let mut unreachable = Vec::new();
        let table = discovery
            .lookup_with(&current, &DiscoveryRequest::new(AccessMode::Read, None), &mut unreachable)
            .await
            .unwrap();

        assert_eq!(table.routers, vec![ServerAddress::new("good", 7687)]);
        // 응답한 라우터의 실패는 연결 불가가 아님
        assert_eq!(unreachable, vec![ServerAddress::new("gone", 7687)]);
        assert_eq!(flaky.count(tag::ROUTE), 1);
    }

    #[tokio::test]
    async fn test_stale_reply_is_skipped() {
        let seed = StubServer::at("seed:7687", BoltVersion::V5_0);
        let other = StubServer::at("other:7687", BoltVersion::V5_0);
        other.push(route_reply(routing_table(300, &["other:7687"], &["other:7687"], &[])));
        seed.push(route_reply(routing_table(300, &["seed:7687"], &["seed:7687"], &["seed:7687"])));

        let discovery = rediscovery(&seed, &[&other]);
        let current = RoutingTable::initial(None, other.address().clone());
        let table = discovery
            .lookup(&current, &DiscoveryRequest::new(AccessMode::Write, None))
            .await
            .unwrap();

        assert_eq!(table.writers, vec![seed.address().clone()]);
        assert_eq!(other.count(tag::ROUTE), 1);
        assert_eq!(seed.count(tag::ROUTE), 1);
    }

    #[tokio::test]
    async fn test_security_error_is_fatal() {
        let seed = StubServer::at("seed:7687", BoltVersion::V5_0);
        let other = StubServer::at("other:7687", BoltVersion::V5_0);
        other.push(Script::failure(BoltErrorCode::UNAUTHORIZED, "no"));

        let discovery = rediscovery(&seed, &[&other]);
        let current = RoutingTable::initial(None, other.address().clone());
        let err = discovery
            .lookup(&current, &DiscoveryRequest::new(AccessMode::Read, None))
            .await
            .unwrap_err();

        assert!(matches!(err, DriverError::Security { .. }));
        assert_eq!(seed.count(tag::ROUTE), 0);
    }

    #[tokio::test]
    async fn test_database_not_found_is_fatal() {
        let seed = StubServer::at("seed:7687", BoltVersion::V5_0);
        seed.push(Script::failure(BoltErrorCode::DATABASE_NOT_FOUND, "no such db"));

        let discovery = rediscovery(&seed, &[]);
        let err = discovery
            .lookup(&initial(&seed), &DiscoveryRequest::new(AccessMode::Read, Some("nope".into())))
            .await
            .unwrap_err();
        assert!(matches!(err, DriverError::FatalDiscovery { .. }));
    }

    #[tokio::test]
    async fn test_empty_router_list_is_fatal() {
        let seed = StubServer::at("seed:7687", BoltVersion::V5_0);
        seed.push(route_reply(routing_table(300, &[], &["r:7687"], &["w:7687"])));

        let discovery = rediscovery(&seed, &[]);
        let err = discovery
            .lookup(&initial(&seed), &DiscoveryRequest::new(AccessMode::Read, None))
            .await
            .unwrap_err();
        assert!(matches!(err, DriverError::Protocol(_)));
    }

    #[tokio::test]
    async fn test_everything_failing_is_service_unavailable() {
        let seed = StubServer::at("seed:7687", BoltVersion::V5_0);
        seed.push(Script::failure("Neo.DatabaseError.General.UnknownError", "boom"));

        let discovery = rediscovery(&seed, &[]);
        let current = RoutingTable::initial(None, ServerAddress::new("gone", 7687));
        let err = discovery
            .lookup(&current, &DiscoveryRequest::new(AccessMode::Read, None))
            .await
            .unwrap_err();

        assert!(matches!(err, DriverError::ServiceUnavailable(_)));
        // 알려진 라우터가 모두 실패하면 시드를 시도
        assert_eq!(seed.count(tag::ROUTE), 1);
    }

    #[tokio::test]
    async fn test_seed_first_when_reading_without_writers() {
        let seed = StubServer::at("seed:7687", BoltVersion::V5_0);
        let reader = StubServer::at("reader:7687", BoltVersion::V5_0);
        seed.push(route_reply(routing_table(
            300,
            &["seed:7687", "reader:7687"],
            &["reader:7687"],
            &["seed:7687"],
        )));

        let discovery = rediscovery(&seed, &[&reader]);
        let info = crate::bolt::RoutingInfo {
            ttl: 300,
            db: None,
            routers: vec!["reader:7687".into()],
            readers: vec!["reader:7687".into()],
            writers: Vec::new(),
        };
        let current = RoutingTable::from_info(&info, None).unwrap();
        let table = discovery
            .lookup(&current, &DiscoveryRequest::new(AccessMode::Read, None))
            .await
            .unwrap();

        assert_eq!(table.writers, vec![seed.address().clone()]);
        assert_eq!(seed.count(tag::ROUTE), 1);
        assert_eq!(reader.count(tag::ROUTE), 0);
    }

    #[tokio::test]
    async fn test_route_request_carries_context_and_bookmarks() {
        let seed = StubServer::at("seed:7687", BoltVersion::V5_0);
        seed.push(route_reply(routing_table(300, &["seed:7687"], &["seed:7687"], &["seed:7687"])));

        let connector = StubConnector::with_servers(ConnectionSettings::default(), &[&seed]);
        let pools = Arc::new(ClusterPool::new(PoolConfig::default(), Arc::new(connector)));
        let context = HashMap::from([("address".to_string(), PackStreamValue::from("seed:7687"))]);
        let discovery = Rediscovery::new(seed.address().clone(), pools, context, Duration::from_secs(5));

        let request = DiscoveryRequest::new(AccessMode::Read, Some("movies".into()))
            .with_bookmarks(vec!["bm:1".into()]);
        discovery.lookup(&initial(&seed), &request).await.unwrap();

        let route = seed
            .received()
            .into_iter()
            .find(|s| s.tag == tag::ROUTE)
            .unwrap();
        let routing = route.fields[0].as_map().unwrap();
        assert_eq!(routing["address"].as_str(), Some("seed:7687"));
        assert_eq!(route.fields[1].as_list().unwrap().len(), 1);
    }
}
