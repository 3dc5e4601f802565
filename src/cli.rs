use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, anyhow};
use clap::{Args, Parser, Subcommand};
use serde::Deserialize;

use ruscript::http::{CookieJar, RequestSnapshot, ResponseSnapshot};
use ruscript::runner::{PreRequestContext, ScriptRunner, TestContext, TestReporter};
use ruscript::sandbox::{SharedHost, combine};
use ruscript::variable::{ConfigLoader, EnvScope, Environments, VariableConfig};

pub type Result<T> = std::result::Result<T, anyhow::Error>;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// 显示通过的断言与请求参数
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 运行前置脚本，片段按 root → 请求 的顺序给出
    Pre {
        #[command(flatten)]
        run: RunArgs,
    },
    /// 运行测试脚本，片段按 请求 → root 的顺序给出
    Test {
        #[command(flatten)]
        run: RunArgs,
    },
    /// 打印合并后的脚本
    Combine {
        #[arg(required = true)]
        scripts: Vec<PathBuf>,
    },
}

#[derive(Args)]
pub struct RunArgs {
    /// 脚本片段文件
    #[arg(required = true)]
    pub scripts: Vec<PathBuf>,

    /// 上下文 JSON：{request, response?, cookies?, envs?}
    #[arg(short, long)]
    pub context: Option<PathBuf>,

    /// 选中的环境名
    #[arg(short, long)]
    pub env: Option<String>,

    /// 覆盖变量 key=value
    #[arg(long = "var", value_name = "KEY=VALUE")]
    pub vars: Vec<String>,

    /// 配置文件路径，缺省时自动查找 ruscript.toml
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// 以 JSON 输出结果
    #[arg(long)]
    pub json: bool,
}

/// 上下文文件
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContextFile {
    #[serde(default)]
    request: Option<RequestSnapshot>,
    #[serde(default)]
    response: Option<ResponseSnapshot>,
    #[serde(default)]
    cookies: Option<CookieJar>,
    #[serde(default)]
    envs: Option<Environments>,
}

/// 执行命令，返回是否全部成功
pub async fn run(cli: Cli) -> Result<bool> {
    let reporter = TestReporter::new(cli.verbose);
    match cli.command {
        Commands::Combine { scripts } => {
            println!("{}", combine(read_scripts(&scripts)?.as_slice()));
            Ok(true)
        }
        Commands::Pre { run } => run_pre(run, &reporter).await,
        Commands::Test { run } => run_test(run, &reporter).await,
    }
}

async fn run_pre(args: RunArgs, reporter: &TestReporter) -> Result<bool> {
    let (script, context, envs, runner) = prepare(&args)?;
    if !args.json {
        reporter.print_header(args.scripts.len());
    }

    let context = PreRequestContext {
        request: context.request.unwrap_or_default(),
        envs,
        cookies: context.cookies,
    };
    match runner.run_pre_request_script(script, context).await {
        Ok(result) => {
            if args.json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                reporter.print_pre_request_result(&result);
            }
            Ok(true)
        }
        Err(failure) => {
            if args.json {
                println!("{}", serde_json::to_string_pretty(&failure)?);
            } else {
                reporter.print_failure(&failure);
            }
            Ok(false)
        }
    }
}

async fn run_test(args: RunArgs, reporter: &TestReporter) -> Result<bool> {
    let (script, context, envs, runner) = prepare(&args)?;
    let response = context
        .response
        .ok_or_else(|| anyhow!("test scripts need a context file with a response"))?;
    if !args.json {
        reporter.print_header(args.scripts.len());
    }

    let context = TestContext {
        request: context.request.unwrap_or_default(),
        response,
        envs,
        cookies: context.cookies,
    };
    match runner.run_test_script(script, context).await {
        Ok(result) => {
            let success = result.summary().is_success();
            if args.json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                reporter.print_test_result(&result);
            }
            Ok(success)
        }
        Err(failure) => {
            if args.json {
                println!("{}", serde_json::to_string_pretty(&failure)?);
            } else {
                reporter.print_failure(&failure);
            }
            Ok(false)
        }
    }
}

fn prepare(args: &RunArgs) -> Result<(String, ContextFile, Environments, ScriptRunner)> {
    let script = combine(read_scripts(&args.scripts)?.as_slice());

    let context = match &args.context {
        Some(path) => load_context(path)?,
        None => ContextFile::default(),
    };

    let config = match &args.config {
        Some(path) => ConfigLoader::load_from_path(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => ConfigLoader::find_and_load().unwrap_or_default(),
    };

    let vars = parse_vars(&args.vars)?;
    let envs = build_envs(&config, context.envs.clone(), args.env.as_deref(), &vars);
    let runner = ScriptRunner::with_host(Arc::new(SharedHost::with_config(config.sandbox)));

    Ok((script, context, envs, runner))
}

/// 上下文里的变量优先于配置文件，`--var` 最后覆盖
fn build_envs(
    config: &VariableConfig,
    from_context: Option<Environments>,
    env_name: Option<&str>,
    vars: &[(String, String)],
) -> Environments {
    match from_context {
        Some(mut envs) => {
            for (key, value) in vars {
                envs.set(key, value.clone(), EnvScope::Active);
            }
            envs
        }
        None => ConfigLoader::build_environments(config, env_name, vars),
    }
}

fn parse_vars(raw: &[String]) -> Result<Vec<(String, String)>> {
    raw.iter()
        .map(|s| {
            ConfigLoader::parse_cli_var(s).ok_or_else(|| anyhow!("invalid --var '{}', expected KEY=VALUE", s))
        })
        .collect()
}

fn read_scripts(paths: &[PathBuf]) -> Result<Vec<String>> {
    paths
        .iter()
        .map(|path| {
            fs::read_to_string(path).with_context(|| format!("failed to read script {}", path.display()))
        })
        .collect()
}

fn load_context(path: &Path) -> Result<ContextFile> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read context {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("invalid context file {}", path.display()))
}
