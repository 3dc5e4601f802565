/// 上游编译步骤在每个片段前加的标记行
pub const MODULE_PREFIX: &str = "export {};\n";

/// 合并结果中片段之间的分隔注释行
pub const FRAGMENT_SEPARATOR: &str = "\n// ---- ruscript fragment ----\n";

/// 合并脚本片段
///
/// 空白片段被丢弃，其余按输入顺序用 [`FRAGMENT_SEPARATOR`] 连接。
/// 宿主按分隔行把每个片段编译成独立的 AST，各自拥有自己的作用域和 `fn` 定义。
/// 没有可执行的片段时返回空串。
pub fn combine<S: AsRef<str>>(scripts: &[S]) -> String {
    scripts
        .iter()
        .map(|s| strip_prefix(s.as_ref()))
        .filter(|s| !s.trim().is_empty())
        .collect::<Vec<_>>()
        .join(FRAGMENT_SEPARATOR)
}

/// 把合并后的源码拆回片段；未经合并的脚本就是单个片段
pub fn fragments(script: &str) -> impl Iterator<Item = &str> {
    script
        .split(FRAGMENT_SEPARATOR)
        .filter(|s| !s.trim().is_empty())
}

fn strip_prefix(script: &str) -> &str {
    script
        .strip_prefix(MODULE_PREFIX)
        .or_else(|| script.strip_prefix(MODULE_PREFIX.trim_end()))
        .unwrap_or(script)
}
