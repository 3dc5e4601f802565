use crate::error::{Result, SandboxError};
use crate::variable::types::{EnvScope, Environments, VariableConfig};
use std::fs;
use std::path::Path;
use tracing::debug;

/// 配置文件加载器
pub struct ConfigLoader;

impl ConfigLoader {
    /// 配置文件名
    const CONFIG_FILE: &'static str = "ruscript.toml";

    /// 从指定路径加载配置文件
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<VariableConfig> {
        let content = fs::read_to_string(path.as_ref())?;

        toml::from_str(&content)
            .map_err(|e| SandboxError::Config(format!("Failed to parse config file: {}", e)))
    }

    /// 查找并加载配置文件
    /// 查找顺序：
    /// 1. 当前目录及父目录
    /// 2. 用户配置目录 ~/.config/ruscript/
    pub fn find_and_load() -> Option<VariableConfig> {
        Self::try_load_from_current_dir().or_else(Self::try_load_from_user_dir)
    }

    /// 尝试从当前目录及其父目录加载
    fn try_load_from_current_dir() -> Option<VariableConfig> {
        let mut current = std::env::current_dir().ok()?;

        loop {
            let config_path = current.join(Self::CONFIG_FILE);
            if config_path.exists() {
                debug!(path = %config_path.display(), "loading config");
                return Self::load_from_path(&config_path).ok();
            }

            // 尝试父目录
            if !current.pop() {
                break;
            }
        }

        None
    }

    /// 尝试从用户配置目录加载
    fn try_load_from_user_dir() -> Option<VariableConfig> {
        let home = dirs::home_dir()?;
        let config_path = home
            .join(".config")
            .join("ruscript")
            .join(Self::CONFIG_FILE);

        if config_path.exists() {
            Self::load_from_path(&config_path).ok()
        } else {
            None
        }
    }

    /// 构建两层环境变量
    /// env_name: 选中的环境（如 "dev", "prod"），其变量进入 selected
    /// cli_vars: CLI 传入的变量覆盖（--var key=value），写入 selected
    pub fn build_environments(
        config: &VariableConfig,
        env_name: Option<&str>,
        cli_vars: &[(String, String)],
    ) -> Environments {
        let selected = env_name
            .and_then(|name| config.get_environment(name))
            .map(|env| env.to_env_vars())
            .unwrap_or_default();
        let mut envs = Environments::new(config.globals.to_env_vars(), selected);

        for (key, value) in cli_vars {
            envs.set(key, value.clone(), EnvScope::Active);
        }

        envs
    }

    /// 解析 CLI 变量参数 "key=value"
    pub fn parse_cli_var(s: &str) -> Option<(String, String)> {
        s.split_once('=')
            .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
    }
}
