//! 라우팅 모듈
//!
//! 클러스터 환경에서 자동 라우팅을 지원합니다.
//!
//! # 개요
//!
//! `neo4j://` 스킴의 드라이버는 시드 라우터에서 라우팅 테이블을 받아
//! 읽기는 리더로, 쓰기는 라이터로 보냅니다.
//!
//! ```text
//! RoutingProvider
//!   ├── RoutingTableManager  (데이터베이스별 스냅샷, 단일 진행 갱신)
//!   │     ├── Rediscovery    (라우터 순회, ROUTE 요청)
//!   │     └── LoadBalancer   (역할별 라운드 로빈)
//!   └── ClusterPool          (주소별 연결 풀)
//! ```
//!
//! # 예시
//!
//! ```ignore
//! use graphbolt::driver::{AccessMode, AuthToken, Driver, SessionConfig};
//!
//! let driver = Driver::new("neo4j://server1:7687", AuthToken::basic("neo4j", "password"))?;
//!
//! // 읽기 세션 (리더로 라우팅)
//! let session = driver.session(
//!     SessionConfig::builder()
//!         .with_default_access_mode(AccessMode::Read)
//!         .build(),
//! )?;
//! ```

mod discovery;
mod manager;
mod policy;
mod provider;
mod table;

pub use discovery::{DiscoveryRequest, Rediscovery};
pub use manager::RoutingTableManager;
pub use policy::LoadBalancer;
pub use provider::RoutingProvider;
pub use table::{RoutingTable, ServerRole};
