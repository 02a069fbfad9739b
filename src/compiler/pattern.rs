//! 编译后模式模型
//! 正则编译后的结构

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use regex::{CaptureMatches, Regex};

/// 信号类型（规则分组维度）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SignalType {
    Html,
    Meta,
    Headers,
    Script,
    Js,
    Env,
    Url,
}

impl SignalType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalType::Html => "html",
            SignalType::Meta => "meta",
            SignalType::Headers => "headers",
            SignalType::Script => "script",
            SignalType::Js => "js",
            SignalType::Env => "env",
            SignalType::Url => "url",
        }
    }

    /// meta/header 忽略大小写，其余区分大小写
    pub fn case_insensitive(&self) -> bool {
        matches!(self, SignalType::Meta | SignalType::Headers)
    }
}

impl fmt::Display for SignalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 编译后的正则模式
#[derive(Debug, Clone)]
pub struct CompiledPattern {
    // 规则原文（`\;` 之前的部分）
    pub source: String,
    pub regex: Regex,
    pub confidence: u8,
    pub version_template: Option<String>,
    // 未识别的附加属性，原样保留
    pub attributes: BTreeMap<String, String>,
    // 在原始规则列表中的下标（编译失败的兄弟规则不影响）
    pub index: usize,
}

impl CompiledPattern {
    /// 子串搜索匹配（非全量匹配）
    #[inline]
    pub fn is_match(&self, value: &str) -> bool {
        self.regex.is_match(value)
    }

    /// 所有匹配的捕获结果（用于多次出现时提取版本）
    pub fn captures_iter<'r, 'h>(&'r self, value: &'h str) -> CaptureMatches<'r, 'h> {
        self.regex.captures_iter(value)
    }
}

/// implies 引用（`PHP\;confidence:50`）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImpliedRef {
    pub name: String,
    pub confidence: u8,
}

/// 技术编译后的规则
#[derive(Debug, Clone, Default)]
pub struct CompiledTechRule {
    pub name: String,
    pub html_patterns: Vec<CompiledPattern>,
    pub script_patterns: Vec<CompiledPattern>,
    pub env_patterns: Vec<CompiledPattern>,
    pub url_patterns: Vec<CompiledPattern>,
    // 键名已转小写
    pub meta_patterns: HashMap<String, Vec<CompiledPattern>>,
    pub header_patterns: HashMap<String, Vec<CompiledPattern>>,
    // 探针属性名保持原样，探针值按 CompiledPattern::index 对应
    pub js_patterns: HashMap<String, Vec<CompiledPattern>>,
    pub implies: Vec<ImpliedRef>,
    pub excludes: Vec<String>,
    pub category_ids: Vec<String>,
    pub website: Option<String>,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub cpe: Option<String>,
}

impl CompiledTechRule {
    /// 规则总数（所有信号类型）
    pub fn pattern_count(&self) -> usize {
        let keyed = |m: &HashMap<String, Vec<CompiledPattern>>| m.values().map(Vec::len).sum::<usize>();
        self.html_patterns.len()
            + self.script_patterns.len()
            + self.env_patterns.len()
            + self.url_patterns.len()
            + keyed(&self.meta_patterns)
            + keyed(&self.header_patterns)
            + keyed(&self.js_patterns)
    }
}

/// 单条规则编译告警（非致命，规则被跳过）
#[derive(Debug, Clone, PartialEq)]
pub struct CompileWarning {
    pub tech: String,
    pub signal: SignalType,
    pub source: String,
    pub message: String,
}

impl fmt::Display for CompileWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}][{}] {} => {}", self.tech, self.signal, self.source, self.message)
    }
}

/// 编译后的规则库
#[derive(Debug, Clone, Default)]
pub struct CompiledRuleLibrary {
    pub tech_patterns: HashMap<String, Arc<CompiledTechRule>>,
    pub category_map: HashMap<String, String>, // 分类ID -> 分类名称
    pub warnings: Vec<CompileWarning>,
}

impl CompiledRuleLibrary {
    pub fn len(&self) -> usize {
        self.tech_patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tech_patterns.is_empty()
    }

    pub fn get(&self, tech_name: &str) -> Option<&Arc<CompiledTechRule>> {
        self.tech_patterns.get(tech_name)
    }

    /// 列出所有 JS 探针槽位：(技术, 属性名, 原始规则下标)，供外部采集层填充探针结果
    /// 编译失败的规则不产生槽位，其余规则保持原下标
    pub fn probe_slots(&self) -> Vec<(&str, &str, usize)> {
        let mut slots: Vec<(&str, &str, usize)> = self
            .tech_patterns
            .values()
            .flat_map(|tech| {
                tech.js_patterns.iter().flat_map(move |(key, patterns)| {
                    patterns
                        .iter()
                        .map(move |pattern| (tech.name.as_str(), key.as_str(), pattern.index))
                })
            })
            .collect();
        slots.sort_unstable();
        slots
    }

    /// 分类ID -> 简写分类名（小写，空格替换为连字符）
    pub fn category_slug(&self, category_id: &str) -> Option<String> {
        self.category_map
            .get(category_id)
            .map(|name| name.to_lowercase().replace(' ', "-"))
    }
}
