// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use once_cell::sync::Lazy;
use regex::Regex;
use std::time::Duration;

/// 外部限流错误未给出提示时的默认等待
pub const DEFAULT_RATE_LIMIT_WAIT: Duration = Duration::from_secs(60);

/// 临时性错误的特征片段（小写）
const RETRYABLE_PATTERNS: [&str; 17] = [
    "rate limit",
    "quota",
    "too many requests",
    "429",
    "500",
    "502",
    "503",
    "504",
    "connection refused",
    "connection reset",
    "context deadline exceeded",
    "deadline has elapsed",
    "i/o timeout",
    "timed out",
    "temporary_failure",
    "try_again",
    "service unavailable",
];

/// 外部服务限流的特征片段（小写）
const RATE_LIMIT_PATTERNS: [&str; 5] = [
    "rate limit",
    "too many requests",
    "429",
    "quota exceeded",
    "throttl",
];

static RETRY_AFTER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)retry[-_ ]after\W{0,3}(\d+(?:\.\d+)?)\s*(ms|s|m|h)?")
        .expect("retry-after pattern is valid")
});

/// 判断错误信息是否表示临时性故障
///
/// 不区分大小写地匹配已知的网络、超时、限流和 5xx 特征
pub fn is_retryable_error(message: &str) -> bool {
    let message = message.to_lowercase();
    RETRYABLE_PATTERNS.iter().any(|p| message.contains(p))
}

/// 判断错误信息是否来自外部服务的限流
pub fn is_external_rate_limit_error(message: &str) -> bool {
    let message = message.to_lowercase();
    RATE_LIMIT_PATTERNS.iter().any(|p| message.contains(p))
}

/// 从错误信息中解析 `retry-after` 提示
///
/// 支持 `retry-after: 30`、`retry_after=2m`、`Retry-After: 1.5s` 等写法，
/// 没有单位时按秒计算
pub fn parse_retry_after(message: &str) -> Option<Duration> {
    let captures = RETRY_AFTER_RE.captures(message)?;
    let value: f64 = captures.get(1)?.as_str().parse().ok()?;
    let seconds = match captures.get(2).map(|m| m.as_str().to_lowercase()).as_deref() {
        Some("ms") => value / 1000.0,
        Some("m") => value * 60.0,
        Some("h") => value * 3600.0,
        _ => value,
    };
    Duration::try_from_secs_f64(seconds).ok()
}

/// 外部限流错误要求的最短等待
///
/// 非限流错误返回 `None`；限流错误优先使用 `retry-after` 提示，
/// 否则为 [`DEFAULT_RATE_LIMIT_WAIT`]
pub fn rate_limit_wait(message: &str) -> Option<Duration> {
    if !is_external_rate_limit_error(message) {
        return None;
    }
    Some(parse_retry_after(message).unwrap_or(DEFAULT_RATE_LIMIT_WAIT))
}
