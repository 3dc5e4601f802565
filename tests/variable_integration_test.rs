use ruscript::variable::{
    ConfigLoader, EnvScope, EnvVar, Environments, ResolveError, ResolveOptions, VariableResolver,
};
use std::fs;
use tempfile::TempDir;

fn no_secrets() -> ResolveOptions {
    ResolveOptions::default()
}

/// 测试从实际配置文件加载变量
#[test]
fn test_load_config_from_file() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("ruscript.toml");

    let config_content = r#"
[sandbox]
max_operations = 20000

[globals]
base_url = "http://global"

[environments.dev]
base_url = "http://localhost:3000"
api_key = { value = "dev-key-123", secret = true }
"#;

    fs::write(&config_path, config_content).unwrap();

    let config = ConfigLoader::load_from_path(&config_path).unwrap();
    assert_eq!(config.sandbox.max_operations, 20000);
    assert!(config.environments.contains_key("dev"));

    let envs = ConfigLoader::build_environments(&config, Some("dev"), &[]);
    assert_eq!(envs.get("base_url").unwrap().value, "http://localhost:3000");
    let api_key = envs.get("api_key").unwrap();
    assert_eq!(api_key.value, "dev-key-123");
    assert!(api_key.secret);
}

/// 测试 CLI 变量覆盖优先级
#[test]
fn test_cli_override_priority() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("ruscript.toml");

    fs::write(
        &config_path,
        r#"
[environments.dev]
base_url = "http://localhost:3000"
api_key = "config-key"
"#,
    )
    .unwrap();

    let config = ConfigLoader::load_from_path(&config_path).unwrap();
    let cli_vars = vec![("api_key".to_string(), "cli-override-key".to_string())];
    let envs = ConfigLoader::build_environments(&config, Some("dev"), &cli_vars);

    assert_eq!(envs.get("api_key").unwrap().value, "cli-override-key");
    assert_eq!(envs.get("base_url").unwrap().value, "http://localhost:3000");
}

/// 测试系统环境变量解析
#[test]
fn test_environment_variable_resolution() {
    unsafe {
        std::env::set_var("RUSCRIPT_TEST_KEY", "environment-value");
    }

    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("ruscript.toml");
    fs::write(
        &config_path,
        r#"
[environments.dev]
api_key = "${RUSCRIPT_TEST_KEY}"
"#,
    )
    .unwrap();

    let config = ConfigLoader::load_from_path(&config_path).unwrap();
    let envs = ConfigLoader::build_environments(&config, Some("dev"), &[]);
    assert_eq!(envs.resolve("<<api_key>>", no_secrets()).unwrap(), "environment-value");

    unsafe {
        std::env::remove_var("RUSCRIPT_TEST_KEY");
    }
}

#[test]
fn test_resolve_without_placeholders_is_identity() {
    let envs = Environments::new(vec![EnvVar::new("a", "1")], vec![]);
    for text in ["", "plain text", "{{a}}", "<a>", "<<>> unmatched"] {
        assert_eq!(envs.resolve(text, no_secrets()).unwrap(), text);
    }
}

#[test]
fn test_mutual_cycle_reports_loop() {
    let envs = Environments::new(
        vec![],
        vec![EnvVar::new("a", "<<b>>"), EnvVar::new("b", "<<a>>")],
    );
    assert!(matches!(
        envs.resolve("<<a>>", no_secrets()),
        Err(ResolveError::ExpansionLoop(_))
    ));
}

#[test]
fn test_selected_shadows_global() {
    let envs = Environments::new(vec![EnvVar::new("x", "G")], vec![EnvVar::new("x", "S")]);
    assert_eq!(envs.resolve("<<x>>", no_secrets()).unwrap(), "S");
    assert_eq!(envs.lookup("x", EnvScope::Global).unwrap().value, "G");
}

#[test]
fn test_nested_expansion() {
    let envs = Environments::new(
        vec![EnvVar::new("host", "api.example.com")],
        vec![
            EnvVar::new("base", "https://<<host>>"),
            EnvVar::new("users", "<<base>>/users"),
        ],
    );
    assert_eq!(
        envs.resolve("<<users>>?missing=<<nope>>", no_secrets()).unwrap(),
        "https://api.example.com/users?missing=<<nope>>"
    );
}

#[test]
fn test_unset_removes_first_duplicate_only() {
    let mut envs = Environments::new(
        vec![EnvVar::new("x", "G")],
        vec![EnvVar::new("x", "A"), EnvVar::new("x", "B")],
    );
    assert!(envs.unset("x", EnvScope::All));
    assert_eq!(envs.selected, vec![EnvVar::new("x", "B")]);
    assert_eq!(envs.global, vec![EnvVar::new("x", "G")]);
}

#[test]
fn test_secret_masking_and_hiding() {
    let envs = Environments::new(
        vec![],
        vec![
            EnvVar::secret("token", "abcd"),
            EnvVar::new("header", "Bearer <<token>>"),
        ],
    );
    assert_eq!(envs.resolve("<<header>>", no_secrets()).unwrap(), "Bearer abcd");
    assert_eq!(
        envs.resolve("<<header>>", ResolveOptions::masked()).unwrap(),
        "Bearer ****"
    );
    assert_eq!(
        envs.resolve("<<header>>", ResolveOptions::hide_secrets()).unwrap(),
        "Bearer <<token>>"
    );
}

#[test]
fn test_replace_in_single_pass() {
    let envs = Environments::new(
        vec![],
        vec![EnvVar::new("a", "{{b}}"), EnvVar::new("b", "B")],
    );
    let map = envs.to_map(EnvScope::All);
    let out = VariableResolver::replace_in("{{ a }}-{{b}}-{{c}}", |key| {
        map.get(key).map(String::as_str)
    });
    assert_eq!(out, "{{b}}-B-{{c}}");
}

/// 测试空配置文件
#[test]
fn test_empty_config() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("ruscript.toml");
    fs::write(&config_path, "").unwrap();

    let config = ConfigLoader::load_from_path(&config_path).unwrap();
    assert!(config.environments.is_empty());
    let envs = ConfigLoader::build_environments(&config, Some("missing"), &[]);
    assert_eq!(envs, Environments::default());
}

/// 测试 CLI 变量解析格式
#[test]
fn test_cli_variable_parsing() {
    let (k, v) = ConfigLoader::parse_cli_var("key2=value with spaces").unwrap();
    assert_eq!(k, "key2");
    assert_eq!(v, "value with spaces");

    let (k, v) = ConfigLoader::parse_cli_var("key3=value=with=equals").unwrap();
    assert_eq!(k, "key3");
    assert_eq!(v, "value=with=equals");
}
