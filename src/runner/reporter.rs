use colored::Colorize;

use crate::assertion::{ExpectStatus, TestDescriptor, TestSummary};
use crate::error::ErrorKind;
use crate::runner::types::{PreRequestResult, RunFailure, TestRunResult};
use crate::sandbox::{ConsoleEntry, ConsoleLevel};

pub struct TestReporter {
    verbose: bool,
}

impl TestReporter {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    /// 打印测试开始
    pub fn print_header(&self, fragments: usize) {
        println!("\nRunning {} script fragment(s)...\n", fragments);
    }

    /// 打印结果树
    pub fn print_tests(&self, root: &TestDescriptor) {
        // 根节点上的断言直接列出
        for result in &root.expect_results {
            self.print_expectation(result.status, &result.message, 1);
        }
        for child in &root.children {
            self.print_node(child, 1);
        }
    }

    fn print_node(&self, node: &TestDescriptor, depth: usize) {
        let indent = "  ".repeat(depth);
        let symbol = if node.all_passed() {
            "✓".green()
        } else {
            "✗".red()
        };
        println!("{}{} {}", indent, symbol, node.descriptor.bold());

        for result in &node.expect_results {
            // 通过的断言只在 verbose 模式下展示
            if self.verbose || result.status != ExpectStatus::Pass {
                self.print_expectation(result.status, &result.message, depth + 1);
            }
        }
        for child in &node.children {
            self.print_node(child, depth + 1);
        }
    }

    fn print_expectation(&self, status: ExpectStatus, message: &str, depth: usize) {
        let indent = "  ".repeat(depth);
        match status {
            ExpectStatus::Pass => println!("{}{} {}", indent, "✓".green(), message),
            ExpectStatus::Fail => println!("{}{} {}", indent, "✗".red(), message.red()),
            ExpectStatus::Error => println!(
                "{}{} {}: {}",
                indent,
                "!".yellow(),
                "Error".red().bold(),
                message
            ),
        }
    }

    pub fn print_console(&self, entries: &[ConsoleEntry]) {
        if entries.is_empty() {
            return;
        }
        println!("   Console:");
        for entry in entries {
            let args = entry
                .args
                .iter()
                .map(|arg| match arg {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect::<Vec<_>>()
                .join(" ");
            let level = match entry.level {
                ConsoleLevel::Log => "log".normal(),
                ConsoleLevel::Info => "info".cyan(),
                ConsoleLevel::Warn => "warn".yellow(),
                ConsoleLevel::Error => "error".red(),
                ConsoleLevel::Debug => "debug".dimmed(),
            };
            println!("     [{}] {}", level, args);
        }
        println!();
    }

    pub fn print_test_result(&self, result: &TestRunResult) {
        self.print_tests(&result.tests);
        println!();
        self.print_console(&result.console);
        self.print_summary(&result.summary());
    }

    pub fn print_pre_request_result(&self, result: &PreRequestResult) {
        let request = match result.resolved_request() {
            Ok(resolved) => resolved,
            Err(e) => {
                println!("   {}: {}", "Warning".yellow(), e);
                result.updated_request.clone()
            }
        };
        println!(" {} {} {}", "✓".green(), request.method.cyan(), request.url);
        for header in &request.headers {
            println!("   {}: {}", header.key.bold(), header.value);
        }
        if self.verbose {
            for param in &request.params {
                println!("   ?{}={}", param.key, param.value);
            }
        }

        println!("\n   Environment:");
        for var in result
            .updated_envs
            .selected
            .iter()
            .chain(&result.updated_envs.global)
        {
            let value = if var.secret {
                "*".repeat(var.value.chars().count())
            } else {
                var.value.clone()
            };
            println!("     {} = {}", var.key, value);
        }
        println!();
        self.print_console(&result.console);
    }

    pub fn print_failure(&self, failure: &RunFailure) {
        println!(
            " {} {} [{}]",
            "✗".red(),
            failure.error.message().red(),
            match failure.error.kind() {
                ErrorKind::Infra => "infra",
                ErrorKind::Script => "script",
            }
        );
        if let Some(tests) = &failure.tests {
            println!("\n   Completed before failure:");
            self.print_tests(tests);
            println!();
        }
        self.print_console(&failure.console);
    }

    /// 打印测试摘要
    pub fn print_summary(&self, summary: &TestSummary) {
        println!("{}", "━".repeat(50));
        println!("{}", "Summary".bold());
        println!("{}", "━".repeat(50));

        if summary.failed == 0 {
            println!(
                "  {}: {} passed, {} total",
                "Tests".bold(),
                summary.passed.to_string().green(),
                summary.total
            );
        } else {
            println!(
                "  {}: {} passed, {} failed, {} total",
                "Tests".bold(),
                summary.passed.to_string().green(),
                summary.failed.to_string().red(),
                summary.total
            );
        }

        if summary.total_assertions > 0 {
            if summary.is_success() {
                println!(
                    "  {}: {} passed, {} total",
                    "Assertions".bold(),
                    summary.passed_assertions.to_string().green(),
                    summary.total_assertions
                );
            } else {
                println!(
                    "  {}: {} passed, {} failed, {} errored, {} total",
                    "Assertions".bold(),
                    summary.passed_assertions.to_string().green(),
                    summary.failed_assertions.to_string().red(),
                    summary.errored_assertions.to_string().yellow(),
                    summary.total_assertions
                );
            }
        }
        println!();
    }
}

impl Default for TestReporter {
    fn default() -> Self {
        Self::new(false)
    }
}
