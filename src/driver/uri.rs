//! URI 파싱
//!
//! `bolt://` (직접 연결)과 `neo4j://` (라우팅) 스킴, 그리고 `+s` / `+ssc`
//! 암호화 접미사를 해석합니다. 라우팅 URI의 쿼리 파라미터는 라우팅
//! 컨텍스트가 됩니다.

use std::collections::HashMap;
use std::fmt;

use super::error::{DriverError, DriverResult};

/// 기본 Bolt 포트
pub const DEFAULT_PORT: u16 = 7687;

/// 라우팅 컨텍스트 예약 키
pub const ROUTING_ADDRESS_KEY: &str = "address";

// ============================================================================
// ServerAddress - 서버 주소
// ============================================================================

/// 서버 주소
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ServerAddress {
    /// 호스트
    pub host: String,
    /// 포트
    pub port: u16,
}

impl ServerAddress {
    /// 새 서버 주소 생성
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// `host`, `host:port`, `[v6]`, `[v6]:port` 형식 파싱
    pub fn parse(s: &str) -> DriverResult<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(DriverError::configuration("Empty server address"));
        }

        if let Some(rest) = s.strip_prefix('[') {
            let (host, tail) = rest
                .split_once(']')
                .ok_or_else(|| DriverError::configuration(format!("Unclosed IPv6 bracket in '{}'", s)))?;
            let port = match tail {
                "" => DEFAULT_PORT,
                t => parse_port(t.strip_prefix(':').unwrap_or(t), s)?,
            };
            return Ok(Self::new(host, port));
        }

        match s.rsplit_once(':') {
            // 괄호 없는 IPv6 주소는 포트를 가질 수 없음
            Some((host, _)) if host.contains(':') => Ok(Self::new(s, DEFAULT_PORT)),
            Some((host, port)) if !host.is_empty() => Ok(Self::new(host, parse_port(port, s)?)),
            Some(_) => Err(DriverError::configuration(format!("Missing host in '{}'", s))),
            None => Ok(Self::new(s, DEFAULT_PORT)),
        }
    }

    /// 소켓 주소로 변환
    pub fn to_socket_addr(&self) -> String {
        self.to_string()
    }
}

fn parse_port(port: &str, input: &str) -> DriverResult<u16> {
    port.parse()
        .map_err(|_| DriverError::configuration(format!("Invalid port in '{}'", input)))
}

impl fmt::Display for ServerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

impl Default for ServerAddress {
    fn default() -> Self {
        Self::new("localhost", DEFAULT_PORT)
    }
}

// ============================================================================
// UriEncryption - URI 암호화 접미사
// ============================================================================

/// URI 스킴에 포함된 암호화 설정
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UriEncryption {
    /// 접미사 없음 (설정에 따름)
    Unspecified,
    /// `+s`: 암호화, CA 신뢰
    SystemCas,
    /// `+ssc`: 암호화, 모든 인증서 신뢰
    AnyCertificate,
}

impl UriEncryption {
    /// 접미사가 명시되었는지 여부
    pub fn is_specified(&self) -> bool {
        !matches!(self, Self::Unspecified)
    }
}

// ============================================================================
// BoltUri - 파싱된 URI
// ============================================================================

/// 파싱된 드라이버 URI
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoltUri {
    /// 라우팅 여부 (`neo4j` 스킴)
    pub routing: bool,
    /// 암호화 접미사
    pub encryption: UriEncryption,
    /// 초기 주소 (라우팅의 경우 시드 라우터)
    pub address: ServerAddress,
    /// 라우팅 컨텍스트 (`address` 포함); 직접 연결이면 비어 있음
    pub routing_context: HashMap<String, String>,
}

impl BoltUri {
    /// URI 파싱
    pub fn parse(uri: &str) -> DriverResult<Self> {
        let (scheme, rest) = uri
            .split_once("://")
            .ok_or_else(|| DriverError::configuration(format!("Missing scheme in URI '{}'", uri)))?;

        let (routing, encryption) = match scheme.to_ascii_lowercase().as_str() {
            "bolt" => (false, UriEncryption::Unspecified),
            "bolt+s" => (false, UriEncryption::SystemCas),
            "bolt+ssc" => (false, UriEncryption::AnyCertificate),
            "neo4j" => (true, UriEncryption::Unspecified),
            "neo4j+s" => (true, UriEncryption::SystemCas),
            "neo4j+ssc" => (true, UriEncryption::AnyCertificate),
            other => {
                return Err(DriverError::configuration(format!(
                    "Unsupported URI scheme '{}'",
                    other
                )))
            }
        };

        let (authority, query) = match rest.split_once('?') {
            Some((a, q)) => (a, Some(q)),
            None => (rest, None),
        };
        let address = ServerAddress::parse(authority.trim_end_matches('/'))?;

        let params = match query {
            Some(q) if !q.is_empty() => parse_query(q)?,
            _ => HashMap::new(),
        };

        let routing_context = if routing {
            let mut context = params;
            context.insert(ROUTING_ADDRESS_KEY.to_string(), address.to_string());
            context
        } else {
            if !params.is_empty() {
                return Err(DriverError::configuration(format!(
                    "Routing context is not supported by direct URI '{}'",
                    uri
                )));
            }
            HashMap::new()
        };

        Ok(Self {
            routing,
            encryption,
            address,
            routing_context,
        })
    }
}

fn parse_query(query: &str) -> DriverResult<HashMap<String, String>> {
    let mut params = HashMap::new();
    for pair in query.split('&').filter(|p| !p.is_empty()) {
        let (key, value) = pair
            .split_once('=')
            .filter(|(k, v)| !k.is_empty() && !v.is_empty())
            .ok_or_else(|| {
                DriverError::configuration(format!("Invalid routing context parameter '{}'", pair))
            })?;

        if key == ROUTING_ADDRESS_KEY {
            return Err(DriverError::configuration(
                "The key 'address' is reserved for the routing context",
            ));
        }
        if params.insert(key.to_string(), value.to_string()).is_some() {
            return Err(DriverError::configuration(format!(
                "Duplicate routing context key '{}'",
                key
            )));
        }
    }
    Ok(params)
}

// ============================================================================
// Tests
// ============================================================================
