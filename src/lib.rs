//! # graphbolt
//!
//! An async client driver for graph databases speaking the Bolt protocol
//! (versions 4.0 through 5.4).
//!
//! ## Features
//!
//! - **PackStream and chunked framing** - Binary value codec and message framing for Tokio
//! - **Version-indexed protocol** - Request shaping and field gating picked once per connection
//! - **Connection pooling** - Bounded per-address pools with liveness checks and lifetimes
//! - **Cluster routing** - `neo4j://` URIs route reads and writes from a shared routing table
//! - **Transactions** - Auto-commit, explicit, and retried transaction functions
//! - **Causal consistency** - Bookmarks flow from one unit of work to the next
//!
//! ## Basic Usage
//!
//! ```rust,no_run
//! use graphbolt::{AuthToken, Driver, SessionConfig, Value};
//! use std::collections::HashMap;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let driver = Driver::new("bolt://localhost:7687", AuthToken::basic("neo4j", "password"))?;
//!
//!     let session = driver.session(
//!         SessionConfig::builder()
//!             .with_database("neo4j")
//!             .with_write_access()
//!             .build(),
//!     )?;
//!
//!     let mut params = HashMap::new();
//!     params.insert("name".to_string(), Value::String("Alice".to_string()));
//!
//!     let result = session
//!         .run("CREATE (n:Person {name: $name}) RETURN n", Some(params))
//!         .await?;
//!
//!     for record in result {
//!         println!("{}", record);
//!     }
//!
//!     session.close().await?;
//!     driver.close().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Transactions
//!
//! ```rust,no_run
//! # use graphbolt::{AuthToken, Driver, SessionConfig};
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! # let driver = Driver::new("bolt://localhost:7687", AuthToken::basic("u", "p"))?;
//! # let session = driver.session(SessionConfig::default())?;
//! let mut tx = session.begin_transaction(None).await?;
//! tx.run("CREATE (n:Node {id: 1})", None).await?;
//! tx.run("CREATE (n:Node {id: 2})", None).await?;
//! tx.commit().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Transaction Functions
//!
//! Transient failures, lost connections and expired routing information are
//! retried with exponential backoff until the configured retry time runs out:
//!
//! ```rust,no_run
//! # use graphbolt::{AuthToken, Driver, SessionConfig};
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! # let driver = Driver::new("neo4j://localhost:7687", AuthToken::basic("u", "p"))?;
//! # let session = driver.session(SessionConfig::default())?;
//! let created = session
//!     .execute_write(|tx| async move {
//!         let result = tx.run("CREATE (n:Node) RETURN n", None).await?;
//!         Ok(result.len())
//!     })
//!     .await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Authentication
//!
//! ```rust
//! use graphbolt::AuthToken;
//!
//! let auth = AuthToken::basic("username", "password");
//! let auth = AuthToken::bearer("my-token");
//! let auth = AuthToken::none();
//! ```
//!
//! ## Configuration
//!
//! ```rust
//! use graphbolt::{AuthToken, DriverConfig};
//! use std::time::Duration;
//!
//! let config = DriverConfig::builder("bolt://localhost:7687", AuthToken::basic("u", "p"))
//!     .unwrap()
//!     .with_max_connection_pool_size(50)
//!     .with_connection_timeout(Duration::from_secs(10))
//!     .with_fetch_size(500)
//!     .build();
//! ```
//!
//! Encrypted schemes (`bolt+s`, `neo4j+ssc`, ...) need a
//! [`driver::bolt::TransportSecurity`] supplied through
//! [`DriverConfigBuilder::with_security`].
//!
//! ## Modules
//!
//! - [`driver`] - Driver, session, transaction, pooling and routing
//! - [`bolt`] - Low-level Bolt protocol implementation

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod bolt;
pub mod driver;

// Re-exports for convenience
pub use driver::{
    AccessMode, AuthToken, Bookmarks, Driver, DriverConfig, DriverConfigBuilder, DriverError, DriverMetrics,
    DriverResult, ManagedTransaction, NotificationConfig, Query, QueryResult, Record, RecordStream,
    ResultSummary, ServerAddress, ServerInfo, Session, SessionConfig, SessionConfigBuilder, Transaction,
    TransactionConfig, TrustStrategy, Value,
};

pub use bolt::{BoltError, BoltVersion, PackStreamValue};

/// Config alias for convenience
pub type Config = DriverConfig;
