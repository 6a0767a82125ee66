//! 라우팅 정책
//!
//! 역할별 라운드 로빈 서버 선택. 현재 에포크에서 연결에 실패한 서버는
//! 다른 후보가 남아 있는 동안 건너뜁니다.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::RwLock;

use crate::bolt::AccessMode;

use super::super::error::{DriverError, DriverResult};
use super::super::uri::ServerAddress;
use super::table::{RoutingTable, ServerRole};

/// 로드 밸런서
#[derive(Debug, Default)]
pub struct LoadBalancer {
    /// 리더 라운드 로빈 인덱스
    readers_index: AtomicUsize,
    /// 라이터 라운드 로빈 인덱스
    writers_index: AtomicUsize,
    /// 라우터 라운드 로빈 인덱스
    routers_index: AtomicUsize,
    /// 현재 에포크에서 도달 불가로 표시된 서버
    unreachable: RwLock<HashSet<ServerAddress>>,
}

impl LoadBalancer {
    /// 새 로드 밸런서 생성
    pub fn new() -> Self {
        Self::default()
    }

    /// `mode`에 맞는 서버 선택
    ///
    /// 후보가 없으면 [`DriverError::SessionExpired`].
    pub fn select(&self, table: &RoutingTable, mode: AccessMode) -> DriverResult<ServerAddress> {
        let role = ServerRole::for_mode(mode);
        self.select_from(role, table.servers(role)).ok_or_else(|| {
            DriverError::session_expired(format!(
                "Failed to obtain a connection towards {} server. Known routing table is: {}",
                role.as_str().to_lowercase(),
                table
            ))
        })
    }

    /// 주어진 목록에서 라운드 로빈으로 선택
    pub fn select_from(&self, role: ServerRole, servers: &[ServerAddress]) -> Option<ServerAddress> {
        if servers.is_empty() {
            return None;
        }

        let start = self.index(role).fetch_add(1, Ordering::Relaxed);
        let unreachable = self.unreachable.read();
        (0..servers.len())
            .map(|i| &servers[(start + i) % servers.len()])
            .find(|address| !unreachable.contains(*address))
            // 모두 표시되어 있으면 일반 라운드 로빈
            .or_else(|| servers.get(start % servers.len()))
            .cloned()
    }

    fn index(&self, role: ServerRole) -> &AtomicUsize {
        match role {
            ServerRole::Read => &self.readers_index,
            ServerRole::Write => &self.writers_index,
            ServerRole::Route => &self.routers_index,
        }
    }

    /// 서버를 현재 에포크 동안 도달 불가로 표시
    pub fn mark_unreachable(&self, address: &ServerAddress) {
        self.unreachable.write().insert(address.clone());
    }

    /// 도달 불가 여부
    pub fn is_unreachable(&self, address: &ServerAddress) -> bool {
        self.unreachable.read().contains(address)
    }

    /// 새 에포크 시작 (라우팅 갱신 성공 시)
    pub fn new_epoch(&self) {
        self.unreachable.write().clear();
    }
}
