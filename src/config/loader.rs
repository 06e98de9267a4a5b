//! 配置加载器实现
//!
//! 提供TOML配置文件解析、`${VAR}` 环境变量替换和配置模板生成

use crate::config::types::{validate_config, Config};
use crate::error::{ConfigError, Result};
use async_trait::async_trait;
use regex::Regex;
use std::path::{Path, PathBuf};

/// 项目配置目录名
const CONFIG_DIR_NAME: &str = "url-vitals";
/// 当前目录下的配置文件名
const LOCAL_CONFIG_FILE: &str = "url-vitals.toml";

/// 配置加载器trait，定义配置加载接口
#[async_trait]
pub trait ConfigLoader: Send + Sync {
    /// 从文件加载配置
    ///
    /// # 参数
    /// * `path` - 配置文件路径
    ///
    /// # 返回
    /// * `Result<Config>` - 加载的配置或错误
    async fn load_from_file(&self, path: &Path) -> Result<Config>;

    /// 从字符串加载配置
    ///
    /// # 参数
    /// * `content` - 配置文件内容
    ///
    /// # 返回
    /// * `Result<Config>` - 加载的配置或错误
    async fn load_from_string(&self, content: &str) -> Result<Config>;

    /// 验证配置
    fn validate(&self, config: &Config) -> Result<()>;
}

/// TOML配置加载器实现
#[derive(Debug, Clone)]
pub struct TomlConfigLoader {
    /// 是否启用环境变量替换
    enable_env_substitution: bool,
}

impl Default for TomlConfigLoader {
    fn default() -> Self {
        Self::new(true)
    }
}

impl TomlConfigLoader {
    /// 创建新的TOML配置加载器
    ///
    /// # 参数
    /// * `enable_env_substitution` - 是否启用环境变量替换
    pub fn new(enable_env_substitution: bool) -> Self {
        Self {
            enable_env_substitution,
        }
    }

    /// 替换字符串中的 `${VAR_NAME}` 环境变量，未定义的变量视为错误。注释行不做替换
    fn substitute_env_vars(&self, content: &str) -> Result<String> {
        if !self.enable_env_substitution {
            return Ok(content.to_string());
        }

        let env_var_regex = Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}")
            .map_err(|e| ConfigError::ParseError(format!("正则表达式错误: {e}")))?;

        let mut lines = Vec::new();
        for line in content.lines() {
            // 注释行原样保留
            if line.trim_start().starts_with('#') {
                lines.push(line.to_string());
                continue;
            }

            let mut processed = line.to_string();
            for captures in env_var_regex.captures_iter(line) {
                let full_match = &captures[0];
                let var_name = &captures[1];

                let value = std::env::var(var_name).map_err(|_| ConfigError::EnvVarError {
                    var: var_name.to_string(),
                })?;
                processed = processed.replace(full_match, &value);
            }
            lines.push(processed);
        }

        Ok(lines.join("\n"))
    }

    /// 解析TOML内容
    fn parse_toml(&self, content: &str) -> Result<Config> {
        let processed_content = self.substitute_env_vars(content)?;

        let config: Config = toml::from_str(&processed_content)
            .map_err(|e| ConfigError::ParseError(format!("TOML解析失败: {e}")))?;

        Ok(config)
    }
}

#[async_trait]
impl ConfigLoader for TomlConfigLoader {
    async fn load_from_file(&self, path: &Path) -> Result<Config> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.to_string_lossy().to_string(),
            }
            .into());
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ConfigError::ParseError(format!("读取文件失败: {e}")))?;

        let config = self.parse_toml(&content)?;
        self.validate(&config)?;

        log::info!("成功加载配置文件: {}", path.display());
        log::debug!("配置内容: {config:?}");

        Ok(config)
    }

    async fn load_from_string(&self, content: &str) -> Result<Config> {
        let config = self.parse_toml(content)?;
        self.validate(&config)?;

        log::debug!("成功解析配置字符串");

        Ok(config)
    }

    fn validate(&self, config: &Config) -> Result<()> {
        validate_config(config).map_err(|e| ConfigError::ValidationError(e).into())
    }
}

/// 获取默认配置文件路径
///
/// 优先使用当前目录下的 `url-vitals.toml`，否则使用用户配置目录下的
/// `url-vitals/config.toml`
pub fn get_default_config_path() -> PathBuf {
    let local = PathBuf::from(LOCAL_CONFIG_FILE);
    if local.exists() {
        return local;
    }

    dirs::config_dir()
        .map(|config_dir| config_dir.join(CONFIG_DIR_NAME).join("config.toml"))
        .unwrap_or(local)
}

/// 加载配置：指定了路径时必须存在；未指定时默认路径不存在则使用内置默认值
///
/// # 参数
/// * `path` - 命令行指定的配置文件路径
///
/// # 返回
/// * `Result<Config>` - 加载的配置或错误
pub async fn load_config(path: Option<&Path>) -> Result<Config> {
    let loader = TomlConfigLoader::default();

    match path {
        Some(path) => loader.load_from_file(path).await,
        None => {
            let default_path = get_default_config_path();
            if default_path.exists() {
                loader.load_from_file(&default_path).await
            } else {
                log::debug!("未找到配置文件 {}，使用默认配置", default_path.display());
                Ok(Config::default())
            }
        }
    }
}

/// 生成带注释的默认配置模板
pub fn default_config_template() -> Result<String> {
    let body = toml::to_string_pretty(&Config::default())
        .map_err(|e| ConfigError::ParseError(format!("序列化默认配置失败: {e}")))?;

    Ok(format!(
        "# url-vitals 配置文件\n\
         #\n\
         # 字符串值中可以使用 ${{VAR_NAME}} 引用环境变量。\n\
         # 安全提示: transport.accept_invalid_certs = true 时不校验TLS证书，\n\
         # 仅用于判断URL可达性，不能用于传输任何敏感数据。\n\n{body}"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const TEST_CONFIG_TOML: &str = r#"
log_level = "debug"

[validation]
worker_count = 5
timeout_seconds = 10
per_worker_delay_seconds = 0.1

[classifier]
error_indicators = ["seite nicht gefunden"]
min_content_chars = 50

[output]
directory = "reports"
"#;

    const TEST_CONFIG_WITH_ENV_VARS: &str = r#"
[transport]
user_agent = "${VITALS_TEST_AGENT}"

[transport.headers]
"Authorization" = "Bearer ${VITALS_TEST_TOKEN}"
"#;

    #[tokio::test]
    async fn test_toml_parsing() {
        let loader = TomlConfigLoader::new(false);
        let config = loader.load_from_string(TEST_CONFIG_TOML).await.unwrap();

        assert_eq!(config.log_level, "debug");
        assert_eq!(config.validation.worker_count, 5);
        assert_eq!(config.validation.timeout_seconds, 10.0);
        assert_eq!(config.classifier.min_content_chars, 50);
        assert_eq!(config.output.directory, PathBuf::from("reports"));
        // 未出现的节使用默认值
        assert_eq!(config.transport.max_attempts, 3);
    }

    #[tokio::test]
    #[serial]
    async fn test_env_var_substitution() {
        env::set_var("VITALS_TEST_AGENT", "vitals-bot/1.0");
        env::set_var("VITALS_TEST_TOKEN", "test-token-123");

        let loader = TomlConfigLoader::new(true);
        let config = loader
            .load_from_string(TEST_CONFIG_WITH_ENV_VARS)
            .await
            .unwrap();

        assert_eq!(config.transport.user_agent, "vitals-bot/1.0");
        assert_eq!(
            config.transport.headers.get("Authorization"),
            Some(&"Bearer test-token-123".to_string())
        );

        env::remove_var("VITALS_TEST_AGENT");
        env::remove_var("VITALS_TEST_TOKEN");
    }

    #[tokio::test]
    #[serial]
    async fn test_env_var_substitution_missing_var() {
        let loader = TomlConfigLoader::new(true);
        let result = loader
            .load_from_string("log_level = \"${VITALS_MISSING_VAR}\"")
            .await;

        let error = result.unwrap_err();
        assert!(error.to_string().contains("VITALS_MISSING_VAR"));
    }

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        let loader = TomlConfigLoader::new(false);
        let result = loader
            .load_from_string("[validation]\nworker_count = 0\n")
            .await;
        assert!(result.unwrap_err().to_string().contains("并发任务数"));

        let result = loader.load_from_string("[validation\n").await;
        assert!(result.unwrap_err().to_string().contains("TOML解析失败"));
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(TEST_CONFIG_TOML.as_bytes()).unwrap();

        let loader = TomlConfigLoader::new(false);
        let config = loader.load_from_file(file.path()).await.unwrap();
        assert_eq!(config.validation.worker_count, 5);

        let missing = loader
            .load_from_file(Path::new("/nonexistent/url-vitals.toml"))
            .await;
        assert!(missing.unwrap_err().to_string().contains("配置文件不存在"));
    }

    #[tokio::test]
    async fn test_load_config_with_explicit_missing_path() {
        let result = load_config(Some(Path::new("/nonexistent/url-vitals.toml"))).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    #[serial]
    async fn test_default_template_round_trips() {
        let template = default_config_template().unwrap();
        assert!(template.contains("accept_invalid_certs = true"));

        let loader = TomlConfigLoader::new(true);
        let config = loader.load_from_string(&template).await.unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    #[serial]
    fn test_comment_lines_not_substituted() {
        let loader = TomlConfigLoader::new(true);
        let content = "# use ${VITALS_UNSET_IN_COMMENT}\nlog_level = \"info\"";
        assert_eq!(loader.substitute_env_vars(content).unwrap(), content);
    }

    #[test]
    fn test_substitute_env_vars_disabled() {
        let loader = TomlConfigLoader::new(false);
        let content = "test ${VAR} content";
        assert_eq!(loader.substitute_env_vars(content).unwrap(), content);
    }

    #[test]
    fn test_get_default_config_path() {
        let path = get_default_config_path();
        let text = path.to_string_lossy();
        assert!(text.ends_with("url-vitals.toml") || text.contains(CONFIG_DIR_NAME));
    }
}
