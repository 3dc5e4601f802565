use crate::assertion::types::{ExpectResult, TestDescriptor};

/// 测试树 + 显式游标
///
/// 游标是从根到当前节点的子节点下标路径。`enter` 返回进入前的深度，
/// 调用方在测试体结束后用它 `leave`，无论测试体是否出错。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestRunStack {
    root: TestDescriptor,
    cursor: Vec<usize>,
}

impl Default for TestRunStack {
    fn default() -> Self {
        Self::new()
    }
}

impl TestRunStack {
    pub fn new() -> Self {
        Self {
            root: TestDescriptor::root(),
            cursor: Vec::new(),
        }
    }

    pub fn current(&self) -> &TestDescriptor {
        self.cursor
            .iter()
            .fold(&self.root, |node, &index| &node.children[index])
    }

    fn current_mut(&mut self) -> &mut TestDescriptor {
        let mut node = &mut self.root;
        for &index in &self.cursor {
            node = &mut node.children[index];
        }
        node
    }

    /// 在当前节点下追加子节点并使其成为当前节点
    pub fn enter(&mut self, descriptor: impl Into<String>) -> usize {
        let saved = self.cursor.len();
        let node = self.current_mut();
        node.children.push(TestDescriptor::new(descriptor));
        let index = node.children.len() - 1;
        self.cursor.push(index);
        saved
    }

    /// 恢复到 `enter` 之前的节点
    pub fn leave(&mut self, saved: usize) {
        self.cursor.truncate(saved);
    }

    pub fn depth(&self) -> usize {
        self.cursor.len()
    }

    pub fn record(&mut self, result: ExpectResult) {
        self.current_mut().expect_results.push(result);
    }

    pub fn root(&self) -> &TestDescriptor {
        &self.root
    }

    pub fn into_root(self) -> TestDescriptor {
        self.root
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_enter_leave() {
        let mut stack = TestRunStack::new();
        let outer = stack.enter("A");
        stack.record(ExpectResult::pass("a1"));
        let inner = stack.enter("B");
        stack.record(ExpectResult::fail("b1"));
        stack.leave(inner);
        stack.record(ExpectResult::pass("a2"));
        stack.leave(outer);
        stack.record(ExpectResult::pass("top"));

        let root = stack.into_root();
        assert_eq!(root.expect_results.len(), 1);
        let a = root.child("A").unwrap();
        assert_eq!(a.expect_results.len(), 2);
        let b = a.child("B").unwrap();
        assert_eq!(b.expect_results, vec![ExpectResult::fail("b1")]);
    }

    #[test]
    fn test_leave_restores_after_unbalanced_inner() {
        let mut stack = TestRunStack::new();
        let saved = stack.enter("A");
        // 内层测试体中途出错，没有机会 leave
        stack.enter("B");
        stack.enter("C");
        stack.leave(saved);
        assert_eq!(stack.depth(), 0);
        stack.enter("D");
        assert_eq!(stack.root().children.len(), 2);
    }
}
