//! # 配置管理模块
//!
//! 处理 SDK 配置加载与验证

mod observer_config;

pub use observer_config::{CaptureConfig, ObserverConfig};

use std::env;
use std::path::Path;

use crate::error::{ObserverError, Result};
use crate::redact::FieldPath;

/// 按环境变量加载配置文件
///
/// 读取 `OBSERVER_ENV`（缺省 `dev`），加载 `config/observer.{env}.toml`。
pub fn load_config() -> Result<ObserverConfig> {
    let env_name = env::var("OBSERVER_ENV").unwrap_or_else(|_| "dev".to_string());
    let config_file = format!("config/observer.{env_name}.toml");
    load_config_from(Path::new(&config_file))
}

/// 从指定路径加载配置文件
pub fn load_config_from(path: &Path) -> Result<ObserverConfig> {
    if !path.exists() {
        return Err(ObserverError::config(format!(
            "配置文件不存在: {}",
            path.display()
        )));
    }

    let config_content = std::fs::read_to_string(path).map_err(|e| {
        ObserverError::config_with_source(format!("读取配置文件失败: {}", path.display()), e)
    })?;

    let config: ObserverConfig = toml::from_str(&config_content)?;

    // 验证配置的有效性
    validate_config(&config)?;

    Ok(config)
}

/// 验证配置有效性
///
/// 脱敏路径在这里统一编译，非法表达式在初始化期失败，
/// 而不是在运行期吞掉整个消息体。
pub fn validate_config(config: &ObserverConfig) -> Result<()> {
    if let Some(root_url) = &config.root_url {
        url::Url::parse(root_url).map_err(|e| {
            ObserverError::config_with_source(format!("无效的收集端地址: {root_url}"), e)
        })?;
        crate::observer_ensure!(
            !config.api_key.is_empty(),
            config,
            "配置了 root_url 但缺少 api_key"
        );
    }

    for expr in config
        .redact_request_body
        .iter()
        .chain(&config.redact_response_body)
    {
        FieldPath::parse(expr)?;
    }

    crate::observer_ensure!(
        config.capture.max_body_bytes > 0,
        config,
        "max_body_bytes 必须大于 0"
    );
    crate::observer_ensure!(
        config.capture.stale_after_secs > 0,
        config,
        "stale_after_secs 必须大于 0"
    );
    crate::observer_ensure!(
        config.capture.sweep_interval_secs > 0,
        config,
        "sweep_interval_secs 必须大于 0"
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> ObserverConfig {
        ObserverConfig {
            api_key: "key_test".to_string(),
            root_url: Some("https://collect.example.com".to_string()),
            redact_headers: vec!["authorization".to_string()],
            redact_request_body: vec!["$.user.password".to_string()],
            ..ObserverConfig::default()
        }
    }

    #[test]
    fn validate_accepts_valid_config() {
        assert!(validate_config(&valid_config()).is_ok());
    }

    #[test]
    fn validate_rejects_bad_root_url() {
        let config = ObserverConfig {
            root_url: Some("not a url".to_string()),
            ..valid_config()
        };
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("无效的收集端地址"));
    }

    #[test]
    fn validate_rejects_root_url_without_api_key() {
        let config = ObserverConfig {
            api_key: String::new(),
            ..valid_config()
        };
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("api_key"));
    }

    #[test]
    fn validate_rejects_malformed_redaction_path() {
        let config = ObserverConfig {
            redact_request_body: vec!["$..password".to_string()],
            ..valid_config()
        };
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn validate_rejects_zero_body_cap() {
        let mut config = valid_config();
        config.capture.max_body_bytes = 0;
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("max_body_bytes"));
    }
}
