//! 正则兼容修复
//! Wappalyzer 规则按 JS 正则编写，regex crate 不支持环视，编译失败时做一次降级修复

use once_cell::sync::Lazy;
use regex::Regex;

// 粗略匹配四种环视（允许内部一层嵌套括号），非精确解析
static LOOK_AROUND_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\(\?\s*(?:=|!|<=|<!)((?:[^()]|\([^()]*\))*)\)"#).unwrap()
});

/// 正则修复器
pub struct RegexFixer;

impl RegexFixer {
    /// 移除环视语法（(?=)(?!)(?<=)(?<!)）
    pub fn remove_look_around(pattern: &str) -> String {
        LOOK_AROUND_REGEX.replace_all(pattern, "").into_owned()
    }

    /// 尝试修复，修复后与原文一致时返回 None（无可修复内容）
    pub fn fix(pattern: &str) -> Option<String> {
        let fixed = Self::remove_look_around(pattern);
        (fixed != pattern).then_some(fixed)
    }
}
