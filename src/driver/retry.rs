//! Retry Policy
//!
//! 관리형 트랜잭션(`execute_read` / `execute_write`)의 재시도 정책.
//!
//! n번째 재시도 전 대기 시간은 `initial_delay * multiplier^(n-1)`에
//! ±`jitter` 비율의 균등 난수를 곱한 값이며, 남은 시간 예산을 넘지
//! 않습니다. 경과 시간이 `max_retry_time`에 도달하면 마지막 에러를 담은
//! [`DriverError::RetryExhausted`]로 끝납니다.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tokio::time::Instant;

use super::error::{DriverError, DriverResult, SecurityKind};

/// 한 번의 시도 결과 분류
#[derive(Debug)]
pub enum Outcome<T> {
    /// 성공
    Success(T),
    /// 재시도 가능한 실패
    Retriable(DriverError),
    /// 즉시 반환할 실패
    Fatal(DriverError),
}

/// 재시도 정책
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// 최대 재시도 시간
    pub max_retry_time: Duration,
    /// 첫 대기 시간
    pub initial_delay: Duration,
    /// 대기 시간 배수
    pub multiplier: f64,
    /// 지터 비율 (0.2 = ±20%)
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

impl RetryPolicy {
    /// 최대 재시도 시간으로 생성 (나머지는 기본값)
    pub fn new(max_retry_time: Duration) -> Self {
        Self {
            max_retry_time,
            initial_delay: Duration::from_secs(1),
            multiplier: 2.0,
            jitter: 0.2,
        }
    }

    /// 시도 결과 분류
    ///
    /// `AuthorizationExpired`는 실행당 한 번만 재시도합니다.
    pub fn classify<T>(result: DriverResult<T>, auth_retried: &mut bool) -> Outcome<T> {
        match result {
            Ok(value) => Outcome::Success(value),
            Err(e) if e.security_kind() == Some(SecurityKind::AuthorizationExpired) => {
                if *auth_retried {
                    Outcome::Fatal(e)
                } else {
                    *auth_retried = true;
                    Outcome::Retriable(e)
                }
            }
            Err(e) if e.is_retryable() => Outcome::Retriable(e),
            Err(e) => Outcome::Fatal(e),
        }
    }

    /// 지터 없는 n번째 재시도 대기 시간
    pub fn base_delay(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(i32::MAX as u32) as i32;
        let secs = self.initial_delay.as_secs_f64() * self.multiplier.powi(exponent);
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
    }

    /// 지터를 적용한 n번째 재시도 대기 시간
    pub fn delay(&self, retry: u32) -> Duration {
        let base = self.base_delay(retry);
        // NaN, 무한대, 음수는 지터 없음으로 취급
        if !self.jitter.is_finite() || self.jitter <= 0.0 {
            return base;
        }
        let jitter = self.jitter.min(1.0);
        let factor = 1.0 + rand::thread_rng().gen_range(-jitter..=jitter);
        Duration::try_from_secs_f64(base.as_secs_f64() * factor.max(0.0)).unwrap_or(base)
    }

    /// 성공하거나, 치명적 에러가 나거나, 시간 예산이 다할 때까지 실행
    ///
    /// `work`는 시도 번호(1부터)를 받습니다. 실패한 시도의 결과는 버려집니다.
    pub async fn run<T, F, Fut>(&self, mut work: F) -> DriverResult<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = DriverResult<T>>,
    {
        let start = Instant::now();
        let mut auth_retried = false;
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            let error = match Self::classify(work(attempt).await, &mut auth_retried) {
                Outcome::Success(value) => return Ok(value),
                Outcome::Fatal(e) => return Err(e),
                Outcome::Retriable(e) => e,
            };

            let elapsed = start.elapsed();
            if elapsed >= self.max_retry_time {
                tracing::warn!(attempts = attempt, ?elapsed, error = %error, "giving up on transaction");
                return Err(DriverError::RetryExhausted {
                    attempts: attempt,
                    elapsed,
                    source: Box::new(error),
                });
            }

            let delay = self.delay(attempt).min(self.max_retry_time - elapsed);
            tracing::warn!(attempt, ?delay, error = %error, "transaction failed; retrying");
            tokio::time::sleep(delay).await;
        }
    }
}
