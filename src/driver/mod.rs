//! Driver Module
//!
//! Bolt 프로토콜 위의 클라이언트 SDK.
//!
//! # 구성
//!
//! - [`Driver`], [`DriverConfig`]: URI 해석, 풀과 연결 제공자 구성
//! - [`Session`]: auto-commit 쿼리, 명시적 트랜잭션, 재시도되는 트랜잭션 함수
//! - [`Transaction`]: 상태 기계 (Active, Committed, RolledBack, Failed, Closed)
//! - [`ClusterPool`]: 주소별 제한 연결 풀
//! - [`routing`]: 라우팅 테이블, 디스커버리, 로드 밸런싱
//! - [`bolt`]: 청크 프레이밍 연결과 요청 파이프라인
//!
//! # Example
//!
//! ```ignore
//! use graphbolt::driver::{AuthToken, Driver, SessionConfig};
//! use graphbolt::params;
//!
//! // 단일 서버 드라이버 (bolt://)
//! let driver = Driver::new("bolt://localhost:7687", AuthToken::basic("neo4j", "password"))?;
//! let session = driver.session(SessionConfig::default())?;
//!
//! // 쿼리 실행
//! let result = session.run("MATCH (n) RETURN n LIMIT 10", None).await?;
//! for record in result {
//!     println!("{:?}", record);
//! }
//!
//! // 트랜잭션
//! let mut tx = session.begin_transaction(None).await?;
//! tx.run("CREATE (n:Person {name: $name})", Some(params! {"name" => "Alice"})).await?;
//! tx.commit().await?;
//!
//! // 재시도되는 트랜잭션 함수
//! let count = session
//!     .execute_read(|tx| async move {
//!         let result = tx.run("MATCH (n) RETURN count(n) AS c", None).await?;
//!         result.single()?.get_int("c")
//!     })
//!     .await?;
//!
//! session.close().await?;
//! driver.close().await?;
//! ```
//!
//! # Routing Example
//!
//! ```ignore
//! use graphbolt::driver::{AccessMode, AuthToken, Driver, SessionConfig};
//!
//! // 라우팅 드라이버 (neo4j://) - 클러스터용
//! let driver = Driver::new("neo4j://server1:7687?region=eu", AuthToken::basic("neo4j", "password"))?;
//!
//! // 읽기 세션 (리더로 라우팅)
//! let session = driver.session(
//!     SessionConfig::builder()
//!         .with_default_access_mode(AccessMode::Read)
//!         .build(),
//! )?;
//! ```

pub mod bolt;
pub mod routing;
mod driver;
mod error;
mod pool;
mod provider;
mod record;
mod retry;
mod session;
mod transaction;
mod types;
mod uri;

#[cfg(test)]
pub(crate) mod testing;

// Re-exports
pub use crate::bolt::{AccessMode, AuthToken, MinimumSeverity, Notification, NotificationCategory, NotificationConfig};
pub use driver::{Driver, DriverConfig, DriverConfigBuilder, DriverMetrics, ServerInfo, TrustStrategy};
pub use error::{DriverError, DriverResult, SecurityKind};
pub use pool::{
    ClusterPool, ConnectionPool, Connector, PoolConfig, PoolConfigBuilder, PoolMetrics, PooledConnection,
    TcpConnector,
};
pub use provider::{AcquiredConnection, ConnectionProvider, DirectProvider};
pub use record::{Counters, QueryResult, QueryType, Record, RecordStream, ResultSummary};
pub use retry::RetryPolicy;
pub use session::{Bookmarks, Query, Session, SessionConfig, SessionConfigBuilder};
pub use transaction::{ManagedTransaction, Transaction, TransactionConfig, TransactionState};
pub use types::{Duration, Node, OffsetTime, Path, Point, Relationship, Value, ZonedDateTime};
pub use uri::{BoltUri, ServerAddress, UriEncryption};

/// 파라미터 맵 생성 매크로
#[macro_export]
macro_rules! params {
    () => {
        std::collections::HashMap::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut map = std::collections::HashMap::new();
        $(
            map.insert($key.into(), $crate::driver::Value::from($value));
        )+
        map
    }};
}
