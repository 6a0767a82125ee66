//! 라우팅 테이블
//!
//! 클러스터의 서버 역할별 목록 스냅샷. 테이블은 불변이며, 변경은 항상
//! 새 테이블을 만들어 통째로 교체합니다.

use std::collections::HashSet;
use std::fmt;
use std::time::Duration;

use tokio::time::Instant;

use crate::bolt::{AccessMode, RoutingInfo};

use super::super::error::{DriverError, DriverResult};
use super::super::uri::ServerAddress;

/// 서버 역할
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServerRole {
    /// 라우팅 테이블 제공자
    Route,
    /// 쓰기 트랜잭션 처리 (리더)
    Write,
    /// 읽기 트랜잭션 처리 (팔로워)
    Read,
}

impl ServerRole {
    /// 문자열에서 역할 파싱
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "ROUTE" => Some(Self::Route),
            "WRITE" => Some(Self::Write),
            "READ" => Some(Self::Read),
            _ => None,
        }
    }

    /// 역할을 문자열로 변환
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Route => "ROUTE",
            Self::Write => "WRITE",
            Self::Read => "READ",
        }
    }

    /// 접근 모드가 사용하는 역할
    pub fn for_mode(mode: AccessMode) -> Self {
        match mode {
            AccessMode::Read => Self::Read,
            AccessMode::Write => Self::Write,
        }
    }
}

/// 라우팅 테이블
#[derive(Debug, Clone)]
pub struct RoutingTable {
    /// 데이터베이스 이름 (`None`은 홈 데이터베이스)
    pub database: Option<String>,
    /// 라우터 목록 (라우팅 테이블 조회용)
    pub routers: Vec<ServerAddress>,
    /// 리더 목록 (읽기 트랜잭션용)
    pub readers: Vec<ServerAddress>,
    /// 라이터 목록 (쓰기 트랜잭션용)
    pub writers: Vec<ServerAddress>,
    /// 유효 기간
    pub ttl: Duration,
    /// 생성 시간
    pub updated_at: Instant,
}

impl RoutingTable {
    /// 시드 라우터만 아는 초기 테이블 (즉시 갱신 필요)
    pub fn initial(database: Option<String>, seed: ServerAddress) -> Self {
        Self {
            database,
            routers: vec![seed],
            readers: Vec::new(),
            writers: Vec::new(),
            ttl: Duration::ZERO,
            updated_at: Instant::now(),
        }
    }

    /// 서버 응답으로 테이블 생성
    ///
    /// 응답에 `db`가 있으면 그 이름을, 없으면 요청한 이름을 씁니다.
    pub fn from_info(info: &RoutingInfo, requested: Option<&str>) -> DriverResult<Self> {
        let parse = |addresses: &[String]| -> DriverResult<Vec<ServerAddress>> {
            let mut parsed: Vec<ServerAddress> = Vec::with_capacity(addresses.len());
            for address in addresses {
                let address = ServerAddress::parse(address).map_err(|e| {
                    DriverError::protocol(format!("invalid address in routing table: {}", e))
                })?;
                if !parsed.contains(&address) {
                    parsed.push(address);
                }
            }
            Ok(parsed)
        };

        Ok(Self {
            database: info.db.clone().or_else(|| requested.map(str::to_string)),
            routers: parse(&info.routers)?,
            readers: parse(&info.readers)?,
            writers: parse(&info.writers)?,
            ttl: Duration::from_secs(info.ttl.max(0) as u64),
            updated_at: Instant::now(),
        })
    }

    /// 역할별 서버 목록
    pub fn servers(&self, role: ServerRole) -> &[ServerAddress] {
        match role {
            ServerRole::Route => &self.routers,
            ServerRole::Read => &self.readers,
            ServerRole::Write => &self.writers,
        }
    }

    /// TTL 만료 여부
    pub fn is_expired(&self) -> bool {
        self.updated_at.elapsed() >= self.ttl
    }

    /// `mode`로 쓰기에 부적합한지 (만료, 라우터 없음, 해당 역할 없음)
    pub fn is_stale_for(&self, mode: AccessMode) -> bool {
        self.routers.is_empty()
            || self.servers(ServerRole::for_mode(mode)).is_empty()
            || self.is_expired()
    }

    /// 만료 후 `delay`가 더 지났는지
    pub fn is_purgeable(&self, delay: Duration) -> bool {
        self.updated_at.elapsed() >= self.ttl.saturating_add(delay)
    }

    /// 읽기용으로는 유효하지만 라이터가 없는 상태
    pub fn is_reading_in_absence_of_writer(&self, mode: AccessMode) -> bool {
        mode == AccessMode::Read
            && !self.is_stale_for(AccessMode::Read)
            && self.is_stale_for(AccessMode::Write)
    }

    /// 테이블이 언급하는 모든 서버
    pub fn all_servers(&self) -> HashSet<ServerAddress> {
        self.routers
            .iter()
            .chain(&self.readers)
            .chain(&self.writers)
            .cloned()
            .collect()
    }

    /// 서버 포함 여부
    pub fn contains(&self, address: &ServerAddress) -> bool {
        self.routers.contains(address) || self.readers.contains(address) || self.writers.contains(address)
    }

    /// 주어진 라우터를 앞에 붙인 사본
    pub fn with_prepended_routers(&self, routers: &[ServerAddress]) -> Self {
        let mut table = self.clone();
        table.routers = routers
            .iter()
            .cloned()
            .chain(self.routers.iter().filter(|r| !routers.contains(r)).cloned())
            .collect();
        table
    }

    /// 모든 역할에서 서버를 뺀 사본
    pub fn without(&self, address: &ServerAddress) -> Self {
        let mut table = self.clone();
        table.routers.retain(|a| a != address);
        table.readers.retain(|a| a != address);
        table.writers.retain(|a| a != address);
        table
    }

    /// 라이터에서만 서버를 뺀 사본
    pub fn without_writer(&self, address: &ServerAddress) -> Self {
        let mut table = self.clone();
        table.writers.retain(|a| a != address);
        table
    }

    /// 즉시 만료된 사본
    pub fn invalidated(&self) -> Self {
        let mut table = self.clone();
        table.ttl = Duration::ZERO;
        table
    }
}

impl fmt::Display for RoutingTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let list = |addresses: &[ServerAddress]| {
            addresses.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
        };
        write!(
            f,
            "RoutingTable[db={}, ttl={:?}, routers=[{}], readers=[{}], writers=[{}]]",
            self.database.as_deref().unwrap_or("<home>"),
            self.ttl,
            list(&self.routers),
            list(&self.readers),
            list(&self.writers),
        )
    }
}
