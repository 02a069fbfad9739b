//! 版本提取工具模块
//! 负责根据版本模板与正则捕获结果计算版本号
//! 模板语法：`\1` 分组引用；`\1?THEN:ELSE` 三元表达式（分组非空取 THEN，否则取 ELSE，ELSE 延伸到模板末尾）

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::compiler::CompiledPattern;

static TERNARY_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\\(\d+)\?([^:]+):(.*)$").unwrap()
});

static BACKREF_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\\(\d+)").unwrap()
});

/// 版本提取工具类
pub struct VersionExtractor;

impl VersionExtractor {
    /// 从正则捕获结果中提取版本号
    ///
    /// # 返回值
    /// - `Some(String)`: 模板求值后非空的版本号
    /// - `None`: 无模板 / 求值结果为空
    pub fn extract(version_template: &Option<String>, captures: &Captures) -> Option<String> {
        let template = version_template.as_deref()?;
        let groups: Vec<Option<&str>> = captures
            .iter()
            .map(|group| group.map(|m| m.as_str()))
            .collect();
        Self::evaluate(template, &groups)
    }

    /// 对单个值的所有匹配位置逐一求值，保留字典序最大的非空版本
    pub fn best_of(pattern: &CompiledPattern, value: &str) -> Option<String> {
        pattern.version_template.as_ref()?;
        pattern
            .captures_iter(value)
            .filter_map(|captures| Self::extract(&pattern.version_template, &captures))
            .fold(None, |best: Option<String>, candidate| match best {
                Some(current) if current >= candidate => Some(current),
                _ => Some(candidate),
            })
    }

    /// 纯函数：模板 + 分组值（下标0为整体匹配）-> 版本号
    ///
    /// 特例：两个分支都是纯文本（不含分组引用）且整个分组值与 ELSE 忽略大小写相等时取 ELSE。
    /// 仅用于 `version (pro|free)` + `\1?Pro:Free` 这类按分组取标签的写法，
    /// 分支中含分组引用的模板（如 `\1?\1:beta`）始终按分组是否为空选择。
    pub fn evaluate(template: &str, groups: &[Option<&str>]) -> Option<String> {
        // 1. 三元表达式逐个求值（每次替换都会缩短模板，必然终止）
        let mut version = template.to_string();
        loop {
            let Some((start, chosen)) = TERNARY_REGEX.captures(&version).and_then(|caps| {
                let whole = caps.get(0)?;
                let value = group_value(groups, caps.get(1)?.as_str());
                let (then_part, else_part) = (caps.get(2)?.as_str(), caps.get(3)?.as_str());
                let labels_only = !BACKREF_REGEX.is_match(then_part) && !BACKREF_REGEX.is_match(else_part);
                let chosen = if value.is_empty() || (labels_only && value.eq_ignore_ascii_case(else_part.trim())) {
                    else_part
                } else {
                    then_part
                };
                Some((whole.start(), chosen.to_string()))
            }) else {
                break;
            };
            version.truncate(start);
            version.push_str(&chosen);
        }

        // 2. 剩余分组引用替换为分组值（未参与匹配的分组替换为空）
        let version = BACKREF_REGEX.replace_all(&version, |caps: &Captures| group_value(groups, &caps[1]).to_string());

        // 3. 清理空白，空结果不计入
        let version = version.trim();
        if version.is_empty() {
            None
        } else {
            Some(version.to_string())
        }
    }
}

/// 按下标取分组值，分组不存在或未参与匹配时为空串
fn group_value<'g>(groups: &[Option<&'g str>], index: &str) -> &'g str {
    index
        .parse::<usize>()
        .ok()
        .and_then(|i| groups.get(i).copied().flatten())
        .unwrap_or("")
}

// 单元测试
#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::{RuleCompiler, SignalType};

    fn extract_first(pattern: &str, template: &str, input: &str) -> Option<String> {
        let regex = Regex::new(pattern).unwrap();
        let captures = regex.captures(input)?;
        VersionExtractor::extract(&Some(template.to_string()), &captures)
    }

    #[test]
    fn test_ternary_template() {
        assert_eq!(extract_first(r"version (pro|free)", r"\1?Pro:Free", "version pro"), Some("Pro".to_string()));
        assert_eq!(extract_first(r"version (pro|free)", r"\1?Pro:Free", "version free"), Some("Free".to_string()));
    }

    #[test]
    fn test_ternary_selects_on_group_value() {
        // 分组非空即为真，因此用可选分组区分两种分支
        let regex = r"version (?:(pro)|free)";
        assert_eq!(extract_first(regex, r"\1?Pro:Free", "version pro"), Some("Pro".to_string()));
        assert_eq!(extract_first(regex, r"\1?Pro:Free", "version free"), Some("Free".to_string()));
    }

    #[test]
    fn test_else_label_rule_skips_backref_branches() {
        let groups = [Some("v BETA"), Some("BETA")];
        // 分支含分组引用：分组非空即取 THEN，不因与 ELSE 同名而翻转
        assert_eq!(VersionExtractor::evaluate(r"\1?\1:beta", &groups), Some("BETA".to_string()));
        // 纯文本标签仍按 ELSE 同名规则选择
        assert_eq!(VersionExtractor::evaluate(r"\1?Stable:Beta", &groups), Some("Beta".to_string()));
    }

    #[test]
    fn test_backreference_template() {
        assert_eq!(extract_first(r"v(\d+\.\d+)", r"\1", "v2.5"), Some("2.5".to_string()));
    }

    #[test]
    fn test_missing_group_yields_none() {
        // 分组未参与匹配，替换为空，结果为空即无版本
        assert_eq!(extract_first(r"nginx(?:/([\d.]+))?", r"\1", "nginx"), None);
        // 超出分组数量的引用同样视为空
        assert_eq!(extract_first(r"nginx(?:/([\d.]+))?", r"\2", "nginx/1.21.6"), None);
    }

    #[test]
    fn test_literal_and_whitespace_templates() {
        assert_eq!(extract_first(r"jquery", "3", "jquery"), Some("3".to_string()));
        assert_eq!(extract_first(r"nginx/\s*([\d.]+)\s*", r"  \1  ", "nginx/ 1.21.6 "), Some("1.21.6".to_string()));
        assert_eq!(extract_first(r"x", "   ", "x"), None);
    }

    #[test]
    fn test_chained_ternary_and_embedded_backref() {
        let groups = [Some("whole"), None, Some("8")];
        assert_eq!(VersionExtractor::evaluate(r"\1?one:\2?v\2:none", &groups), Some("v8".to_string()));
        assert_eq!(VersionExtractor::evaluate(r"\2?\2.x:unknown", &groups), Some("8.x".to_string()));
        assert_eq!(VersionExtractor::evaluate(r"\1-\2", &groups), Some("-8".to_string()));
    }

    #[test]
    fn test_best_of_multiple_occurrences() {
        let pattern = RuleCompiler::compile_single_pattern(r"lib-([\d.]+)\.js\;version:\1", SignalType::Html).unwrap();
        let html = "<script src=lib-1.9.js></script><script src=lib-2.1.js></script><script src=lib-10.0.js></script>";
        // 字典序比较："2.1" > "10.0"
        assert_eq!(VersionExtractor::best_of(&pattern, html), Some("2.1".to_string()));
    }

    #[test]
    fn test_best_of_without_template() {
        let pattern = RuleCompiler::compile_single_pattern(r"lib-([\d.]+)\.js", SignalType::Html).unwrap();
        assert_eq!(VersionExtractor::best_of(&pattern, "lib-1.0.js"), None);
    }
}
