//! # 错误类型定义

use thiserror::Error;

use super::ErrorCategory;

/// SDK 主要错误类型
#[derive(Debug, Error)]
pub enum ObserverError {
    /// 配置相关错误
    #[error("配置错误: {message}")]
    Config {
        /// 错误描述
        message: String,
        /// 底层原因
        #[source]
        source: Option<anyhow::Error>,
    },

    /// 凭证无效或缺失
    #[error("认证错误: {message}")]
    Auth {
        /// 错误描述
        message: String,
    },

    /// 网络通信错误
    #[error("网络错误: {message}")]
    Network {
        /// 错误描述
        message: String,
        /// 底层原因
        #[source]
        source: Option<anyhow::Error>,
    },

    /// 序列化/反序列化错误
    #[error("序列化错误: {message}")]
    Serialization {
        /// 错误描述
        message: String,
        /// 底层原因
        #[source]
        source: anyhow::Error,
    },

    /// 载荷投递错误
    #[error("投递错误: {message}")]
    Publish {
        /// 错误描述
        message: String,
        /// 底层原因
        #[source]
        source: Option<anyhow::Error>,
    },

    /// IO相关错误
    #[error("IO错误: {message}")]
    Io {
        /// 错误描述
        message: String,
        /// 底层原因
        #[source]
        source: std::io::Error,
    },

    /// 系统内部错误
    #[error("内部错误: {message}")]
    Internal {
        /// 错误描述
        message: String,
        /// 底层原因
        #[source]
        source: Option<anyhow::Error>,
    },

    /// 带上层语境的错误包装
    #[error("{context}")]
    Context {
        /// 发生错误时的语境描述
        context: String,
        /// 被包装的原始错误
        #[source]
        source: Box<ObserverError>,
    },
}

impl ObserverError {
    /// 错误分类，用于决定失败是硬性还是可降级
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Config { .. } | Self::Auth { .. } | Self::Serialization { .. } => {
                ErrorCategory::Client
            }
            Self::Network { .. }
            | Self::Publish { .. }
            | Self::Io { .. }
            | Self::Internal { .. } => ErrorCategory::Server,
            Self::Context { source, .. } => source.category(),
        }
    }

    /// 创建配置错误
    pub fn config<T: Into<String>>(message: T) -> Self {
        Self::Config {
            message: message.into(),
            source: None,
        }
    }

    /// 创建带来源的配置错误
    pub fn config_with_source<T: Into<String>, E: Into<anyhow::Error>>(
        message: T,
        source: E,
    ) -> Self {
        Self::Config {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// 创建认证错误
    pub fn auth<T: Into<String>>(message: T) -> Self {
        Self::Auth {
            message: message.into(),
        }
    }

    /// 创建网络错误
    pub fn network<T: Into<String>>(message: T) -> Self {
        Self::Network {
            message: message.into(),
            source: None,
        }
    }

    /// 创建带来源的网络错误
    pub fn network_with_source<T: Into<String>, E: Into<anyhow::Error>>(
        message: T,
        source: E,
    ) -> Self {
        Self::Network {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// 创建投递错误
    pub fn publish<T: Into<String>>(message: T) -> Self {
        Self::Publish {
            message: message.into(),
            source: None,
        }
    }

    /// 创建带来源的投递错误
    pub fn publish_with_source<T: Into<String>, E: Into<anyhow::Error>>(
        message: T,
        source: E,
    ) -> Self {
        Self::Publish {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// 创建内部错误
    pub fn internal<T: Into<String>>(message: T) -> Self {
        Self::Internal {
            message: message.into(),
            source: None,
        }
    }

    /// 创建带来源的内部错误
    pub fn internal_with_source<T: Into<String>, E: Into<anyhow::Error>>(
        message: T,
        source: E,
    ) -> Self {
        Self::Internal {
            message: message.into(),
            source: Some(source.into()),
        }
    }
}

// 自动转换常见错误类型
impl From<std::io::Error> for ObserverError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: "文件操作失败".to_string(),
            source: err,
        }
    }
}

impl From<toml::de::Error> for ObserverError {
    fn from(err: toml::de::Error) -> Self {
        Self::config_with_source("TOML解析失败", err)
    }
}

impl From<serde_json::Error> for ObserverError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            message: "JSON处理失败".to_string(),
            source: err.into(),
        }
    }
}

impl From<url::ParseError> for ObserverError {
    fn from(err: url::ParseError) -> Self {
        Self::config_with_source("URL解析失败", err)
    }
}

impl From<reqwest::Error> for ObserverError {
    fn from(err: reqwest::Error) -> Self {
        Self::network_with_source("HTTP请求失败", err)
    }
}
