use tracing_subscriber::{EnvFilter, fmt};

/// 优先于 `RUST_LOG` 读取的环境变量
pub const LOG_ENV: &str = "RUSCRIPT_LOG";

/// 未配置时的过滤规则；`verbose` 会打开沙箱和脚本控制台的 debug 输出
pub fn default_filter(verbose: bool) -> &'static str {
    if verbose {
        "warn,ruscript=debug,ruscript::console=debug"
    } else {
        "warn,ruscript=info"
    }
}

/// 初始化日志系统
///
/// 过滤规则依次取 `RUSCRIPT_LOG`、`RUST_LOG`，都没有时用 [`default_filter`]。
/// 日志写到 stderr，`--json` 的输出不受影响。
pub fn init_logger(verbose: bool) {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(default_filter(verbose)));

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(verbose)
        .without_time()
        .init();

    tracing::debug!(verbose, "ruscript logger initialized");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filters_parse() {
        for verbose in [false, true] {
            let filter = default_filter(verbose);
            assert!(filter.contains("ruscript="), "filter: {}", filter);
            assert!(EnvFilter::try_new(filter).is_ok(), "filter: {}", filter);
        }
    }
}
