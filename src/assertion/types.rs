use serde::{Deserialize, Serialize};

/// 根节点的固定名称
pub const ROOT_DESCRIPTOR: &str = "root";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpectStatus {
    Pass,
    Fail,
    Error,
}

/// 单次断言的结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpectResult {
    pub status: ExpectStatus,
    pub message: String,
}

impl ExpectResult {
    /// 创建成功的断言结果
    pub fn pass(message: impl Into<String>) -> Self {
        Self {
            status: ExpectStatus::Pass,
            message: message.into(),
        }
    }

    /// 创建失败的断言结果
    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            status: ExpectStatus::Fail,
            message: message.into(),
        }
    }

    /// 创建错误的断言结果（类型不匹配或测试体抛出异常）
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: ExpectStatus::Error,
            message: message.into(),
        }
    }

    pub fn from_outcome(passed: bool, message: impl Into<String>) -> Self {
        if passed {
            Self::pass(message)
        } else {
            Self::fail(message)
        }
    }

    pub fn is_pass(&self) -> bool {
        self.status == ExpectStatus::Pass
    }
}

/// 测试结果树的节点
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestDescriptor {
    pub descriptor: String,
    pub expect_results: Vec<ExpectResult>,
    pub children: Vec<TestDescriptor>,
}

impl TestDescriptor {
    pub fn new(descriptor: impl Into<String>) -> Self {
        Self {
            descriptor: descriptor.into(),
            expect_results: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn root() -> Self {
        Self::new(ROOT_DESCRIPTOR)
    }

    /// 自身的断言是否全部通过
    pub fn passed(&self) -> bool {
        self.expect_results.iter().all(ExpectResult::is_pass)
    }

    /// 包括所有后代在内是否全部通过
    pub fn all_passed(&self) -> bool {
        self.passed() && self.children.iter().all(TestDescriptor::all_passed)
    }

    /// 按名称查找直接子节点
    pub fn child(&self, descriptor: &str) -> Option<&TestDescriptor> {
        self.children.iter().find(|c| c.descriptor == descriptor)
    }
}

/// 测试摘要
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub total_assertions: usize,
    pub passed_assertions: usize,
    pub failed_assertions: usize,
    pub errored_assertions: usize,
}

impl TestSummary {
    /// 统计整棵树；根节点不算作测试，但其断言计入总数
    pub fn from_descriptor(root: &TestDescriptor) -> Self {
        let mut summary = Self::default();
        summary.count_assertions(root);
        for child in &root.children {
            summary.visit(child);
        }
        summary
    }

    fn visit(&mut self, node: &TestDescriptor) {
        self.total += 1;
        if node.passed() {
            self.passed += 1;
        } else {
            self.failed += 1;
        }
        self.count_assertions(node);
        for child in &node.children {
            self.visit(child);
        }
    }

    fn count_assertions(&mut self, node: &TestDescriptor) {
        for result in &node.expect_results {
            self.total_assertions += 1;
            match result.status {
                ExpectStatus::Pass => self.passed_assertions += 1,
                ExpectStatus::Fail => self.failed_assertions += 1,
                ExpectStatus::Error => self.errored_assertions += 1,
            }
        }
    }

    pub fn is_success(&self) -> bool {
        self.failed_assertions == 0 && self.errored_assertions == 0
    }
}
