//! # 测试辅助函数
//!
//! 提供通用的测试工具和断言宏。

use std::sync::Once;
use tracing::Level;

static INIT: Once = Once::new();

/// 初始化测试环境
///
/// 日志写入测试捕获器，多次调用只生效一次。
pub fn init_test_env() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_max_level(Level::DEBUG)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// 断言错误类型
#[macro_export]
macro_rules! assert_error_type {
    ($result:expr, $error_type:pat) => {
        match $result {
            Err($error_type) => (),
            Err(other) => panic!("Expected error type, got: {:?}", other),
            Ok(val) => panic!("Expected error, got Ok: {:?}", val),
        }
    };
}

/// 断言包含文本
#[macro_export]
macro_rules! assert_contains {
    ($text:expr, $substring:expr) => {
        assert!(
            $text.contains($substring),
            "Text '{}' does not contain '{}'",
            $text,
            $substring
        );
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_is_idempotent() {
        init_test_env();
        init_test_env();
    }

    #[test]
    fn assert_macros_cover_both_arms() {
        assert_contains!("hello world", "world");

        let result: crate::error::Result<()> = Err(crate::error::ObserverError::config("bad"));
        assert_error_type!(result, crate::error::ObserverError::Config { .. });
    }
}
