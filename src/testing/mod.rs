//! # 测试支撑模块
//!
//! 提供测试夹具、Mock 投递端与辅助函数。
//! 随 `testing` 特性对外发布，集成测试与宿主应用的测试都可复用。

#[cfg(any(test, feature = "testing"))]
pub mod fixtures;
#[cfg(any(test, feature = "testing"))]
pub mod helpers;
#[cfg(any(test, feature = "testing"))]
pub mod mocks;

#[cfg(any(test, feature = "testing"))]
pub use fixtures::*;
#[cfg(any(test, feature = "testing"))]
pub use helpers::*;
#[cfg(any(test, feature = "testing"))]
pub use mocks::*;
