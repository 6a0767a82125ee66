//! Driver Error Types
//!
//! 드라이버 에러 정의. 서버 FAILURE 코드와 전송 계층 에러를 재시도 분류에
//! 필요한 종류(kind)로 정리합니다.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::bolt::{BoltError, BoltErrorCode};

// ============================================================================
// SecurityKind - 보안 에러 종류
// ============================================================================

/// 보안 에러 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityKind {
    /// 인증 실패 (재시도 안 함)
    Authentication,
    /// 권한 만료 (한 번 재시도)
    AuthorizationExpired,
    /// 토큰 만료 (새 자격 증명 필요)
    TokenExpired,
    /// 기타 보안 에러
    Other,
}

// ============================================================================
// DriverError - 드라이버 에러
// ============================================================================

/// 드라이버 에러
///
/// `Clone`이므로 공유된 라우팅 갱신 결과를 모든 대기자에게 그대로 전달할 수
/// 있습니다.
#[derive(Error, Debug, Clone)]
pub enum DriverError {
    /// 클라이언트 에러 (잘못된 쿼리, 인자 등)
    #[error("Client error: {code} - {message}")]
    Client { code: String, message: String },

    /// 일시적 에러 (재시도 가능)
    #[error("Transient error: {code} - {message}")]
    Transient { code: String, message: String },

    /// 데이터베이스 에러
    #[error("Database error: {code} - {message}")]
    Database { code: String, message: String },

    /// 보안 에러
    #[error("Security error ({kind:?}): {code} - {message}")]
    Security {
        kind: SecurityKind,
        code: String,
        message: String,
    },

    /// 서비스 불가
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// 세션 만료 (라우팅 정보 무효화)
    #[error("Session expired: {message}")]
    SessionExpired {
        message: String,
        /// 쓰기 서버를 잃었는지 여부 (NotALeader 등)
        lost_writer: bool,
    },

    /// 프로토콜 위반
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// 복구 불가능한 디스커버리 에러
    #[error("Fatal discovery error: {code} - {message}")]
    FatalDiscovery { code: String, message: String },

    /// 협상된 프로토콜 버전이 지원하지 않는 기능
    #[error("Unsupported feature: {0}")]
    Unsupported(String),

    /// 연결 에러
    #[error("Connection error [{address}]: {message}")]
    Connection { address: String, message: String },

    /// 풀 획득 타임아웃
    #[error("Timed out after {timeout:?} acquiring a connection to {address}")]
    PoolTimeout { address: String, timeout: Duration },

    /// 풀이 닫힘
    #[error("Connection pool for {0} is closed")]
    PoolClosed(String),

    /// 설정 에러
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// 타임아웃 에러
    #[error("Timeout: {0}")]
    Timeout(String),

    /// 타입 변환 에러
    #[error("Type conversion error: {0}")]
    TypeConversion(String),

    /// 결과가 이미 소비됨
    #[error("Result has already been consumed")]
    ResultConsumed,

    /// 트랜잭션 상태 에러
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// 닫힌 세션 사용
    #[error("Session is closed")]
    SessionClosed,

    /// I/O 에러
    #[error("I/O error: {0}")]
    Io(Arc<io::Error>),

    /// 재시도 한도 초과
    #[error("Retries exhausted after {attempts} attempt(s) in {elapsed:?}: {source}")]
    RetryExhausted {
        attempts: u32,
        elapsed: Duration,
        #[source]
        source: Box<DriverError>,
    },
}

impl DriverError {
    /// 연결 에러 생성
    pub fn connection(address: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Connection {
            address: address.into(),
            message: message.into(),
        }
    }

    /// 프로토콜 에러 생성
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    /// 트랜잭션 에러 생성
    pub fn transaction(msg: impl Into<String>) -> Self {
        Self::Transaction(msg.into())
    }

    /// 닫힌 세션 에러 생성
    pub fn session_closed() -> Self {
        Self::SessionClosed
    }

    /// 타임아웃 에러 생성
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    /// 설정 에러 생성
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// 서비스 불가 에러 생성
    pub fn service_unavailable(msg: impl Into<String>) -> Self {
        Self::ServiceUnavailable(msg.into())
    }

    /// 세션 만료 에러 생성
    pub fn session_expired(msg: impl Into<String>) -> Self {
        Self::SessionExpired {
            message: msg.into(),
            lost_writer: false,
        }
    }

    /// 타입 변환 에러 생성
    pub fn type_conversion(msg: impl Into<String>) -> Self {
        Self::TypeConversion(msg.into())
    }

    /// 서버 FAILURE 코드를 에러 종류로 분류
    pub fn from_server(code: impl Into<String>, message: impl Into<String>) -> Self {
        let code = code.into();
        let message = message.into();

        match code.as_str() {
            BoltErrorCode::UNAUTHORIZED => Self::Security {
                kind: SecurityKind::Authentication,
                code,
                message,
            },
            BoltErrorCode::AUTHORIZATION_EXPIRED => Self::Security {
                kind: SecurityKind::AuthorizationExpired,
                code,
                message,
            },
            BoltErrorCode::TOKEN_EXPIRED => Self::Security {
                kind: SecurityKind::TokenExpired,
                code,
                message,
            },
            BoltErrorCode::DATABASE_NOT_FOUND => Self::FatalDiscovery { code, message },
            BoltErrorCode::NOT_A_LEADER | BoltErrorCode::FORBIDDEN_ON_READ_ONLY_DATABASE => {
                Self::SessionExpired {
                    message: format!("Server at this address can no longer accept writes: {}", message),
                    lost_writer: true,
                }
            }
            // 클라이언트가 종료시킨 트랜잭션은 재시도 대상이 아님
            BoltErrorCode::TRANSACTION_TERMINATED | BoltErrorCode::LOCK_CLIENT_STOPPED => {
                Self::Client { code, message }
            }
            c if c.starts_with(BoltErrorCode::SECURITY_PREFIX) => Self::Security {
                kind: SecurityKind::Other,
                code,
                message,
            },
            c if c.starts_with(BoltErrorCode::TRANSIENT_PREFIX) => Self::Transient { code, message },
            c if c.starts_with(BoltErrorCode::CLIENT_PREFIX) => Self::Client { code, message },
            _ => Self::Database { code, message },
        }
    }

    /// Bolt 계층 에러를 서버 주소와 함께 변환
    pub fn from_bolt(err: BoltError, address: &str) -> Self {
        match err {
            BoltError::Io(e) => Self::connection(address, e.to_string()),
            BoltError::ConnectionClosed => Self::connection(address, "connection closed by server"),
            BoltError::FeatureUnsupported { .. } => Self::Unsupported(err.to_string()),
            BoltError::Handshake(_)
            | BoltError::PackStream(_)
            | BoltError::Protocol(_)
            | BoltError::MessageTooLarge { .. } => {
                Self::Protocol(format!("{} (server {})", err, address))
            }
        }
    }

    /// 서버 에러 코드 (있는 경우)
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Client { code, .. }
            | Self::Transient { code, .. }
            | Self::Database { code, .. }
            | Self::Security { code, .. }
            | Self::FatalDiscovery { code, .. } => Some(code),
            _ => None,
        }
    }

    /// 보안 에러 종류 (있는 경우)
    pub fn security_kind(&self) -> Option<SecurityKind> {
        match self {
            Self::Security { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// 재시도 가능 여부 (권한 만료는 재시도 정책에서 한 번만 허용)
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Transient { .. }
                | Self::ServiceUnavailable(_)
                | Self::SessionExpired { .. }
                | Self::Connection { .. }
                | Self::Security {
                    kind: SecurityKind::AuthorizationExpired,
                    ..
                }
        )
    }

    /// 라우팅 테이블 무효화가 필요한지 여부
    pub fn invalidates_routing(&self) -> bool {
        matches!(
            self,
            Self::ServiceUnavailable(_) | Self::SessionExpired { .. } | Self::Connection { .. }
        )
    }

    /// 디스커버리를 즉시 중단해야 하는 에러인지 여부
    pub fn is_fatal_for_discovery(&self) -> bool {
        match self {
            Self::Security { .. } | Self::FatalDiscovery { .. } | Self::Unsupported(_) => true,
            Self::Client { code, .. } => {
                code == BoltErrorCode::INVALID_BOOKMARK
                    || code == BoltErrorCode::INVALID_BOOKMARK_MIXTURE
            }
            _ => false,
        }
    }

    /// 재시도 끝에 남은 마지막 에러
    pub fn last_error(&self) -> &DriverError {
        match self {
            Self::RetryExhausted { source, .. } => source.last_error(),
            other => other,
        }
    }
}

impl From<io::Error> for DriverError {
    fn from(err: io::Error) -> Self {
        Self::Io(Arc::new(err))
    }
}

// ============================================================================
// Result Type
// ============================================================================

/// 드라이버 결과 타입
pub type DriverResult<T> = Result<T, DriverError>;

// ============================================================================
// Tests
// ============================================================================
