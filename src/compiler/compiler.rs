//! 规则编译器核心
//! 仅负责将原始规则编译为可执行的正则模式

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Instant;
use regex::{Regex, RegexBuilder};
use serde_json::Value;
use tracing::{debug, warn};

use super::pattern::{
    CompileWarning, CompiledPattern, CompiledRuleLibrary, CompiledTechRule, ImpliedRef, SignalType,
};
use super::regex_fixer::RegexFixer;
use crate::error::RswResult;
use crate::rule::{RuleLibrary, TechRule};

/// 规则字符串中的属性分隔符（字面量 `\;`）
const ATTR_DELIMITER: &str = "\\;";
const DEFAULT_CONFIDENCE: u8 = 100;

/// 单条规则字符串解析结果（尚未编译正则）
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParsedRule {
    pub source: String,
    pub confidence: u8,
    pub version_template: Option<String>,
    pub attributes: BTreeMap<String, String>,
}

/// 规则编译器
pub struct RuleCompiler;

impl RuleCompiler {
    /// 编译规则库
    pub fn compile(rule_lib: &RuleLibrary) -> CompiledRuleLibrary {
        let start = Instant::now();
        let mut tech_patterns = HashMap::with_capacity(rule_lib.tech_rules.len());
        let mut category_map = HashMap::new();
        let mut warnings = Vec::new();

        // 1. 构建分类映射（ID -> 名称），ID 按字符串处理
        for (cat_id, cat_rule) in &rule_lib.category_rules {
            category_map.insert(cat_id.trim().to_string(), cat_rule.name.clone());
        }

        // 2. 编译每个技术规则
        let mut stats = CompileStats::default();
        for (tech_name, tech_rule) in &rule_lib.tech_rules {
            let compiled = Self::compile_tech_rule(tech_name, tech_rule, &mut stats, &mut warnings);
            tech_patterns.insert(tech_name.clone(), Arc::new(compiled));
        }

        for warning in &warnings {
            warn!("规则编译跳过：{}", warning);
        }

        // 3. 输出编译统计
        debug!("✅ 规则编译完成，总耗时{:?}，跳过规则{}条", start.elapsed(), warnings.len());
        debug!(
            "📊 编译统计：HTML模式{}条、Meta模式{}条、Header模式{}条、Script模式{}条、JS模式{}条、Env模式{}条、URL模式{}条",
            stats.html_count,
            stats.meta_count,
            stats.header_count,
            stats.script_count,
            stats.js_count,
            stats.env_count,
            stats.url_count
        );

        CompiledRuleLibrary {
            tech_patterns,
            category_map,
            warnings,
        }
    }

    /// 编译单个技术规则
    pub fn compile_tech_rule(
        tech_name: &str,
        tech_rule: &TechRule,
        stats: &mut CompileStats,
        warnings: &mut Vec<CompileWarning>,
    ) -> CompiledTechRule {
        let mut ctx = CompileContext { tech_name, stats, warnings };

        CompiledTechRule {
            name: tech_name.to_string(),
            html_patterns: ctx.compile_pattern_list(tech_rule.html.as_ref(), SignalType::Html),
            script_patterns: ctx.compile_pattern_list(tech_rule.script.as_ref(), SignalType::Script),
            env_patterns: ctx.compile_pattern_list(tech_rule.env.as_ref(), SignalType::Env),
            url_patterns: ctx.compile_pattern_list(tech_rule.url.as_ref(), SignalType::Url),
            meta_patterns: ctx.compile_keyed_patterns(tech_rule.meta.as_ref(), SignalType::Meta),
            header_patterns: ctx.compile_keyed_patterns(tech_rule.headers.as_ref(), SignalType::Headers),
            js_patterns: ctx.compile_keyed_patterns(tech_rule.js.as_ref(), SignalType::Js),
            implies: Self::parse_implies(tech_rule.implies.as_ref()),
            excludes: Self::parse_excludes(tech_rule.excludes.as_ref()),
            category_ids: tech_rule.category_ids.clone(),
            website: tech_rule.website.clone(),
            description: tech_rule.description.clone(),
            icon: tech_rule.icon.clone(),
            cpe: tech_rule.cpe.clone(),
        }
    }

    /// 解析规则字符串：`正则\;confidence:50\;version:\1`
    /// 第0段为正则原文，其余段为 `属性名:属性值`（按第一个冒号切分），无冒号的段忽略
    pub fn parse_rule(raw: &str) -> ParsedRule {
        let mut segments = raw.split(ATTR_DELIMITER);
        let mut parsed = ParsedRule {
            source: segments.next().unwrap_or_default().to_string(),
            confidence: DEFAULT_CONFIDENCE,
            ..Default::default()
        };

        for segment in segments {
            let Some((name, value)) = segment.split_once(':') else {
                continue;
            };
            match name {
                "confidence" => match value.trim().parse::<i64>() {
                    Ok(conf) => parsed.confidence = conf.clamp(0, 100) as u8,
                    Err(_) => warn!("无效的confidence属性，使用默认值：{}", raw),
                },
                "version" => parsed.version_template = Some(value.to_string()),
                _ => {
                    parsed.attributes.insert(name.to_string(), value.to_string());
                }
            }
        }

        parsed
    }

    /// 编译单个正则（失败时尝试移除环视后重试一次）
    pub fn compile_regex(source: &str, signal: SignalType) -> Result<Regex, regex::Error> {
        let build = |pattern: &str| {
            RegexBuilder::new(pattern)
                .case_insensitive(signal.case_insensitive())
                .build()
        };

        match build(source) {
            Ok(regex) => Ok(regex),
            Err(err) => match RegexFixer::fix(source) {
                Some(fixed) => {
                    let regex = build(&fixed)?;
                    debug!("正则已降级修复：{} => {}", source, fixed);
                    Ok(regex)
                }
                None => Err(err),
            },
        }
    }

    /// 编译单个规则字符串（下标为0，列表编译时再回填）
    pub fn compile_single_pattern(raw: &str, signal: SignalType) -> RswResult<CompiledPattern> {
        let parsed = Self::parse_rule(raw);
        let regex = Self::compile_regex(&parsed.source, signal)?;

        Ok(CompiledPattern {
            source: parsed.source,
            regex,
            confidence: parsed.confidence,
            version_template: parsed.version_template,
            attributes: parsed.attributes,
            index: 0,
        })
    }

    /// 解析 implies（字符串或字符串列表，支持 `\;confidence:N`）
    pub fn parse_implies(value: Option<&Value>) -> Vec<ImpliedRef> {
        Self::string_items(value)
            .into_iter()
            .map(|item| {
                let parsed = Self::parse_rule(item);
                ImpliedRef {
                    name: parsed.source.trim().to_string(),
                    confidence: parsed.confidence,
                }
            })
            .filter(|implied| !implied.name.is_empty())
            .collect()
    }

    /// 解析 excludes（字符串或字符串列表）
    pub fn parse_excludes(value: Option<&Value>) -> Vec<String> {
        Self::string_items(value)
            .into_iter()
            .map(|item| item.trim().to_string())
            .filter(|name| !name.is_empty())
            .collect()
    }

    /// 字符串 / 字符串列表 统一展开，其它类型视为空
    fn string_items(value: Option<&Value>) -> Vec<&str> {
        match value {
            Some(Value::String(s)) => vec![s.as_str()],
            Some(Value::Array(arr)) => arr.iter().filter_map(Value::as_str).collect(),
            _ => Vec::new(),
        }
    }
}

/// 单个技术编译过程中的上下文
struct CompileContext<'a> {
    tech_name: &'a str,
    stats: &'a mut CompileStats,
    warnings: &'a mut Vec<CompileWarning>,
}

impl CompileContext<'_> {
    /// 编译列表型模式（html/script/env/url），每个模式记录其原始下标
    fn compile_pattern_list(&mut self, value: Option<&Value>, signal: SignalType) -> Vec<CompiledPattern> {
        let raw_patterns: Vec<(usize, &str)> = match value {
            None | Some(Value::Null) => return Vec::new(),
            Some(Value::String(s)) => vec![(0, s.as_str())],
            Some(Value::Array(arr)) => {
                let mut items = Vec::with_capacity(arr.len());
                for (index, item) in arr.iter().enumerate() {
                    match item {
                        Value::String(s) => items.push((index, s.as_str())),
                        other => self.warn(signal, &other.to_string(), "规则项不是字符串"),
                    }
                }
                items
            }
            Some(other) => {
                self.warn(signal, &other.to_string(), "规则类型不支持");
                return Vec::new();
            }
        };

        let mut patterns = Vec::with_capacity(raw_patterns.len());
        for (index, raw) in raw_patterns {
            match RuleCompiler::compile_single_pattern(raw, signal) {
                Ok(pattern) => patterns.push(CompiledPattern { index, ..pattern }),
                Err(err) => self.warn(signal, raw, &err.to_string()),
            }
        }
        self.stats.add(signal, patterns.len());
        patterns
    }

    /// 编译键值对型模式（meta/headers/js）
    fn compile_keyed_patterns(
        &mut self,
        value: Option<&HashMap<String, Value>>,
        signal: SignalType,
    ) -> HashMap<String, Vec<CompiledPattern>> {
        let Some(value) = value else {
            return HashMap::new();
        };

        let mut keyed_patterns: HashMap<String, Vec<CompiledPattern>> = HashMap::with_capacity(value.len());
        for (key, val) in value {
            let patterns = self.compile_pattern_list(Some(val), signal);
            if patterns.is_empty() {
                continue;
            }
            let key = if signal.case_insensitive() {
                key.to_lowercase()
            } else {
                key.clone()
            };
            keyed_patterns.entry(key).or_default().extend(patterns);
        }
        keyed_patterns
    }

    fn warn(&mut self, signal: SignalType, source: &str, message: &str) {
        self.warnings.push(CompileWarning {
            tech: self.tech_name.to_string(),
            signal,
            source: source.to_string(),
            message: message.to_string(),
        });
    }
}

/// 编译统计信息
#[derive(Debug, Clone, Default)]
pub struct CompileStats {
    html_count: usize,
    meta_count: usize,
    header_count: usize,
    script_count: usize,
    js_count: usize,
    env_count: usize,
    url_count: usize,
}

impl CompileStats {
    fn add(&mut self, signal: SignalType, count: usize) {
        match signal {
            SignalType::Html => self.html_count += count,
            SignalType::Meta => self.meta_count += count,
            SignalType::Headers => self.header_count += count,
            SignalType::Script => self.script_count += count,
            SignalType::Js => self.js_count += count,
            SignalType::Env => self.env_count += count,
            SignalType::Url => self.url_count += count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_rule_attributes() {
        let parsed = RuleCompiler::parse_rule(r"version (pro|free)\;version:\1?Pro:Free\;confidence:75\;noise\;key:value");
        assert_eq!(parsed.source, "version (pro|free)");
        assert_eq!(parsed.confidence, 75);
        // 按第一个冒号切分，三元表达式中的冒号保留
        assert_eq!(parsed.version_template.as_deref(), Some(r"\1?Pro:Free"));
        assert_eq!(parsed.attributes.get("key").map(String::as_str), Some("value"));
        assert!(!parsed.attributes.contains_key("noise"));
    }

    #[test]
    fn test_parse_rule_defaults() {
        let parsed = RuleCompiler::parse_rule("jquery");
        assert_eq!(parsed.confidence, 100);
        assert!(parsed.version_template.is_none());
        assert!(parsed.attributes.is_empty());

        let clamped = RuleCompiler::parse_rule(r"x\;confidence:250");
        assert_eq!(clamped.confidence, 100);
        let invalid = RuleCompiler::parse_rule(r"x\;confidence:high");
        assert_eq!(invalid.confidence, 100);
    }

    #[test]
    fn test_malformed_regex_skipped_with_warning() {
        let rule = TechRule {
            html: Some(json!(["(unclosed", "<div class=\"ok\""])),
            ..Default::default()
        };
        let lib = RuleLibrary::default().with_tech("Broken", rule);
        let compiled = RuleCompiler::compile(&lib);

        let tech = compiled.get("Broken").unwrap();
        assert_eq!(tech.html_patterns.len(), 1);
        assert_eq!(compiled.warnings.len(), 1);
        assert_eq!(compiled.warnings[0].source, "(unclosed");
        assert_eq!(compiled.warnings[0].signal, SignalType::Html);
    }

    #[test]
    fn test_empty_fields_compile_to_nothing() {
        let rule = TechRule {
            html: Some(Value::Null),
            script: Some(json!([])),
            ..Default::default()
        };
        let lib = RuleLibrary::default().with_tech("Empty", rule);
        let compiled = RuleCompiler::compile(&lib);

        assert_eq!(compiled.get("Empty").unwrap().pattern_count(), 0);
        assert!(compiled.warnings.is_empty());
    }

    #[test]
    fn test_keyed_patterns_case_policy() {
        let rule = TechRule {
            headers: Some(HashMap::from([("X-Powered-By".to_string(), json!(r"PHP/\d+\.\d+\;confidence:50"))])),
            js: Some(HashMap::from([("jQuery.fn.jquery".to_string(), json!(r"([\d.]+)\;version:\1"))])),
            ..Default::default()
        };
        let lib = RuleLibrary::default().with_tech("PHP", rule);
        let compiled = RuleCompiler::compile(&lib);
        let tech = compiled.get("PHP").unwrap();

        let header = &tech.header_patterns["x-powered-by"][0];
        assert_eq!(header.confidence, 50);
        assert!(header.is_match("php/7.4"));
        assert!(tech.js_patterns.contains_key("jQuery.fn.jquery"));
        assert_eq!(compiled.probe_slots(), vec![("PHP", "jQuery.fn.jquery", 0)]);
    }

    #[test]
    fn test_failed_sibling_keeps_rule_index() {
        let rule = TechRule {
            js: Some(HashMap::from([(
                "Lib.version".to_string(),
                json!(["(unclosed", r"^2\.\;version:two", 42, "^3"]),
            )])),
            ..Default::default()
        };
        let lib = RuleLibrary::default().with_tech("Lib", rule);
        let compiled = RuleCompiler::compile(&lib);

        let indices: Vec<usize> = compiled.get("Lib").unwrap().js_patterns["Lib.version"]
            .iter()
            .map(|pattern| pattern.index)
            .collect();
        assert_eq!(indices, vec![1, 3]);
        assert_eq!(compiled.probe_slots(), vec![("Lib", "Lib.version", 1), ("Lib", "Lib.version", 3)]);
        assert_eq!(compiled.warnings.len(), 2);
    }

    #[test]
    fn test_regex_error_is_typed() {
        let err = RuleCompiler::compile_single_pattern("(unclosed", SignalType::Html).unwrap_err();
        assert!(matches!(err, crate::error::RswappalyzerError::RegexCompileError(_)));
    }

    #[test]
    fn test_look_around_fallback() {
        let pattern = RuleCompiler::compile_single_pattern(r"angular(?!-)[\w.]*\.js", SignalType::Script).unwrap();
        assert!(pattern.is_match("/static/angular.min.js"));
    }

    #[test]
    fn test_parse_implies_and_excludes() {
        let implies = RuleCompiler::parse_implies(Some(&json!(["PHP\\;confidence:50", "MySQL", " "])));
        assert_eq!(
            implies,
            vec![
                ImpliedRef { name: "PHP".to_string(), confidence: 50 },
                ImpliedRef { name: "MySQL".to_string(), confidence: 100 },
            ]
        );
        assert_eq!(RuleCompiler::parse_excludes(Some(&json!("Drupal"))), vec!["Drupal".to_string()]);
        assert!(RuleCompiler::parse_excludes(None).is_empty());
    }

    #[test]
    fn test_category_ids_are_strings() {
        let raw = r#"{
            "apps": { "X": { "cats": ["1", 2, "beta"] } },
            "categories": { "1": "CMS", "2": { "name": "Message boards" }, "beta": { "name": "Beta Tools" } }
        }"#;
        let lib: RuleLibrary = serde_json::from_str(raw).unwrap();
        let compiled = RuleCompiler::compile(&lib);

        assert_eq!(compiled.category_map.len(), 3);
        assert_eq!(compiled.get("X").unwrap().category_ids, vec!["1", "2", "beta"]);
        assert_eq!(compiled.category_slug("1").as_deref(), Some("cms"));
        assert_eq!(compiled.category_slug("2").as_deref(), Some("message-boards"));
        assert_eq!(compiled.category_slug("beta").as_deref(), Some("beta-tools"));
    }
}
