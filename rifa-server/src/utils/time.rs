//! 时间工具函数
//!
//! 所有时间戳统一使用 Unix millis (`i64`)，
//! repository 层只接收/返回 millis，不做时区转换。

use chrono::Utc;

/// 当前时间 Unix millis
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// 秒 → millis
pub fn secs_to_millis(secs: u64) -> i64 {
    (secs as i64) * 1000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn now_is_after_2020() {
        // 2020-01-01 UTC
        assert!(now_millis() > 1_577_836_800_000);
    }

    #[test]
    fn secs_conversion() {
        assert_eq!(secs_to_millis(900), 900_000);
    }
}
