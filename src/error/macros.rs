//! # 错误处理宏

/// 快速创建指定类别错误的宏
///
/// 第一个参数是 [`crate::error::ObserverError`] 的构造函数名，
/// 其余参数与 `format!` 相同。
#[macro_export]
macro_rules! observer_err {
    ($kind:ident, $msg:expr) => {
        $crate::error::ObserverError::$kind($msg)
    };
    ($kind:ident, $fmt:expr, $($arg:tt)*) => {
        $crate::error::ObserverError::$kind(format!($fmt, $($arg)*))
    };
}

/// 确保条件成立，否则返回指定类别的错误
#[macro_export]
macro_rules! observer_ensure {
    ($cond:expr, $kind:ident, $msg:expr) => {
        if !($cond) {
            return Err($crate::observer_err!($kind, $msg));
        }
    };
    ($cond:expr, $kind:ident, $fmt:expr, $($arg:tt)*) => {
        if !($cond) {
            return Err($crate::observer_err!($kind, $fmt, $($arg)*));
        }
    };
}
