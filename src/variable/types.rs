use crate::sandbox::SandboxConfig;
use crate::variable::resolver::{ResolveError, ResolveOptions, VariableResolver};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// 单个环境变量
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvVar {
    pub key: String,

    /// 当前值
    #[serde(default, alias = "currentValue")]
    pub value: String,

    /// 初始值（reset 时恢复）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_value: Option<String>,

    #[serde(default)]
    pub secret: bool,
}

impl EnvVar {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            initial_value: None,
            secret: false,
        }
    }

    pub fn secret(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            secret: true,
            ..Self::new(key, value)
        }
    }

    pub fn with_initial(mut self, initial: impl Into<String>) -> Self {
        self.initial_value = Some(initial.into());
        self
    }

    /// 未设置初始值时视为当前值
    pub fn initial(&self) -> &str {
        self.initial_value.as_deref().unwrap_or(&self.value)
    }
}

/// 变量作用域
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvScope {
    /// selected 优先，其次 global
    All,
    /// 仅 selected
    Active,
    /// 仅 global
    Global,
}

/// 两层环境变量：selected 遮蔽 global
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environments {
    #[serde(default)]
    pub global: Vec<EnvVar>,
    #[serde(default)]
    pub selected: Vec<EnvVar>,
}

impl Environments {
    pub fn new(global: Vec<EnvVar>, selected: Vec<EnvVar>) -> Self {
        Self { global, selected }
    }

    fn layers(&self, scope: EnvScope) -> Vec<&Vec<EnvVar>> {
        match scope {
            EnvScope::All => vec![&self.selected, &self.global],
            EnvScope::Active => vec![&self.selected],
            EnvScope::Global => vec![&self.global],
        }
    }

    /// 按作用域查找，重复键以第一个为准
    pub fn lookup(&self, key: &str, scope: EnvScope) -> Option<&EnvVar> {
        self.layers(scope)
            .into_iter()
            .find_map(|layer| layer.iter().find(|var| var.key == key))
    }

    pub fn get(&self, key: &str) -> Option<&EnvVar> {
        self.lookup(key, EnvScope::All)
    }

    fn lookup_mut(&mut self, key: &str, scope: EnvScope) -> Option<&mut EnvVar> {
        if scope != EnvScope::Global
            && let Some(index) = self.selected.iter().position(|var| var.key == key)
        {
            return self.selected.get_mut(index);
        }
        if scope != EnvScope::Active {
            return self.global.iter_mut().find(|var| var.key == key);
        }
        None
    }

    fn layer_for_insert(&mut self, scope: EnvScope) -> &mut Vec<EnvVar> {
        match scope {
            EnvScope::Global => &mut self.global,
            EnvScope::All | EnvScope::Active => &mut self.selected,
        }
    }

    /// 更新已有变量的当前值，不存在时追加（默认追加到 selected）
    pub fn set(&mut self, key: &str, value: impl Into<String>, scope: EnvScope) {
        let value = value.into();
        match self.lookup_mut(key, scope) {
            Some(var) => var.value = value,
            None => self.layer_for_insert(scope).push(EnvVar::new(key, value)),
        }
    }

    pub fn set_initial(&mut self, key: &str, value: impl Into<String>, scope: EnvScope) {
        let value = value.into();
        match self.lookup_mut(key, scope) {
            Some(var) => var.initial_value = Some(value),
            None => self
                .layer_for_insert(scope)
                .push(EnvVar::new(key, value.clone()).with_initial(value)),
        }
    }

    /// 只删除第一个匹配项，selected 先于 global
    pub fn unset(&mut self, key: &str, scope: EnvScope) -> bool {
        if scope != EnvScope::Global
            && let Some(index) = self.selected.iter().position(|var| var.key == key)
        {
            self.selected.remove(index);
            return true;
        }
        if scope != EnvScope::Active
            && let Some(index) = self.global.iter().position(|var| var.key == key)
        {
            self.global.remove(index);
            return true;
        }
        false
    }

    /// 当前值恢复为初始值
    pub fn reset(&mut self, key: &str, scope: EnvScope) -> bool {
        match self.lookup_mut(key, scope) {
            Some(var) => {
                var.value = var.initial().to_string();
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self, scope: EnvScope) {
        if scope != EnvScope::Global {
            self.selected.clear();
        }
        if scope != EnvScope::Active {
            self.global.clear();
        }
    }

    /// 作用域内可见的 key -> value，selected 遮蔽 global
    pub fn to_map(&self, scope: EnvScope) -> BTreeMap<String, String> {
        let mut map = BTreeMap::new();
        for layer in self.layers(scope).into_iter().rev() {
            for var in layer.iter().rev() {
                map.insert(var.key.clone(), var.value.clone());
            }
        }
        map
    }

    /// 展开 `<<name>>` 占位符
    pub fn resolve(&self, text: &str, options: ResolveOptions) -> Result<String, ResolveError> {
        VariableResolver::expand(text, |key| self.get(key), options)
    }
}

/// 配置文件中的变量：字符串或 `{ value, secret }`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum VariableEntry {
    Plain(String),
    Detailed {
        value: String,
        #[serde(default)]
        secret: bool,
    },
}

/// 环境配置
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Environment {
    /// 变量映射
    #[serde(flatten)]
    pub variables: BTreeMap<String, VariableEntry>,
}

impl Environment {
    /// 转换为变量列表，并解析其中的系统环境变量 ${VAR}
    pub fn to_env_vars(&self) -> Vec<EnvVar> {
        self.variables
            .iter()
            .map(|(key, entry)| match entry {
                VariableEntry::Plain(value) => {
                    EnvVar::new(key.clone(), VariableResolver::resolve_env_vars(value))
                }
                VariableEntry::Detailed { value, secret } => EnvVar {
                    secret: *secret,
                    ..EnvVar::new(key.clone(), VariableResolver::resolve_env_vars(value))
                },
            })
            .collect()
    }
}

/// 完整的配置文件
#[derive(Debug, Clone, Deserialize, Default)]
pub struct VariableConfig {
    /// 脚本引擎限制
    #[serde(default)]
    pub sandbox: SandboxConfig,

    /// 全局变量
    #[serde(default)]
    pub globals: Environment,

    /// 所有环境配置
    #[serde(default)]
    pub environments: HashMap<String, Environment>,
}

impl VariableConfig {
    /// 获取指定环境的变量
    pub fn get_environment(&self, env_name: &str) -> Option<&Environment> {
        self.environments.get(env_name)
    }
}
