//! 检测分析器：按信号类型将规则应用到信号包
//! 每个分析器只作用于单个候选技术，命中通过 DetectionUpdater 写入候选状态

use std::collections::{BTreeMap, HashMap};

use crate::compiler::{CompiledPattern, CompiledTechRule, SignalType};
use crate::detector::CandidateState;
use crate::signal::MetaTag;
use crate::utils::DetectionUpdater;

type KeyedPatterns = HashMap<String, Vec<CompiledPattern>>;

/// 分析器通用骨架
pub trait Analyzer<P: ?Sized, D: ?Sized> {
    const SIGNAL: SignalType;

    /// 从编译后的技术规则中获取当前分析器对应的规则集（无规则时返回 None）
    fn get_patterns(tech: &CompiledTechRule) -> Option<&P>;

    /// 核心匹配逻辑
    fn match_logic(patterns: &P, data: &D, candidate: &mut CandidateState, verbose: bool);

    fn analyze(data: &D, candidate: &mut CandidateState, verbose: bool)
    where
        Self: Sized,
    {
        let tech = candidate.tech.clone();
        let Some(patterns) = Self::get_patterns(&tech) else {
            return;
        };
        Self::match_logic(patterns, data, candidate, verbose);
    }
}

/// 规则列表逐一匹配一组值，任一值命中即记录
fn scan_values<'v>(
    signal: SignalType,
    key: Option<&str>,
    patterns: &[CompiledPattern],
    values: impl Iterator<Item = &'v str> + Clone,
    candidate: &mut CandidateState,
    verbose: bool,
) {
    for pattern in patterns {
        for value in values.clone() {
            if pattern.is_match(value) {
                DetectionUpdater::update(candidate, signal, key, pattern, value, verbose);
            }
        }
    }
}

fn non_empty(patterns: &[CompiledPattern]) -> Option<&[CompiledPattern]> {
    (!patterns.is_empty()).then_some(patterns)
}

fn non_empty_keyed(patterns: &KeyedPatterns) -> Option<&KeyedPatterns> {
    (!patterns.is_empty()).then_some(patterns)
}

/// HTML分析器：规则匹配原始响应体
pub struct HtmlAnalyzer;

impl Analyzer<[CompiledPattern], str> for HtmlAnalyzer {
    const SIGNAL: SignalType = SignalType::Html;

    fn get_patterns(tech: &CompiledTechRule) -> Option<&[CompiledPattern]> {
        non_empty(&tech.html_patterns)
    }

    fn match_logic(patterns: &[CompiledPattern], html: &str, candidate: &mut CandidateState, verbose: bool) {
        scan_values(Self::SIGNAL, None, patterns, std::iter::once(html), candidate, verbose);
    }
}

/// Meta分析器：仅匹配声明了已注册键名的标签的 content
pub struct MetaAnalyzer;

impl Analyzer<KeyedPatterns, [MetaTag]> for MetaAnalyzer {
    const SIGNAL: SignalType = SignalType::Meta;

    fn get_patterns(tech: &CompiledTechRule) -> Option<&KeyedPatterns> {
        non_empty_keyed(&tech.meta_patterns)
    }

    fn match_logic(patterns: &KeyedPatterns, meta_tags: &[MetaTag], candidate: &mut CandidateState, verbose: bool) {
        for (key, key_patterns) in patterns {
            let contents = meta_tags
                .iter()
                .filter(|tag| tag.declares(key))
                .filter_map(|tag| tag.content.as_deref());
            scan_values(Self::SIGNAL, Some(key.as_str()), key_patterns, contents, candidate, verbose);
        }
    }
}

/// Script分析器：规则匹配每个 script src
pub struct ScriptAnalyzer;

impl Analyzer<[CompiledPattern], [String]> for ScriptAnalyzer {
    const SIGNAL: SignalType = SignalType::Script;

    fn get_patterns(tech: &CompiledTechRule) -> Option<&[CompiledPattern]> {
        non_empty(&tech.script_patterns)
    }

    fn match_logic(patterns: &[CompiledPattern], scripts: &[String], candidate: &mut CandidateState, verbose: bool) {
        scan_values(Self::SIGNAL, None, patterns, scripts.iter().map(String::as_str), candidate, verbose);
    }
}

/// Header分析器：键名小写查找
pub struct HeaderAnalyzer;

impl Analyzer<KeyedPatterns, HashMap<String, String>> for HeaderAnalyzer {
    const SIGNAL: SignalType = SignalType::Headers;

    fn get_patterns(tech: &CompiledTechRule) -> Option<&KeyedPatterns> {
        non_empty_keyed(&tech.header_patterns)
    }

    fn match_logic(
        patterns: &KeyedPatterns,
        headers: &HashMap<String, String>,
        candidate: &mut CandidateState,
        verbose: bool,
    ) {
        for (name, header_patterns) in patterns {
            let Some(value) = headers.get(name) else {
                continue;
            };
            scan_values(
                Self::SIGNAL,
                Some(name.as_str()),
                header_patterns,
                std::iter::once(value.as_str()),
                candidate,
                verbose,
            );
        }
    }
}

/// JS探针分析器：原始下标为 i 的规则只匹配同一探针属性下标 i 的采集值
pub struct JsAnalyzer;

impl Analyzer<KeyedPatterns, HashMap<String, BTreeMap<usize, String>>> for JsAnalyzer {
    const SIGNAL: SignalType = SignalType::Js;

    fn get_patterns(tech: &CompiledTechRule) -> Option<&KeyedPatterns> {
        non_empty_keyed(&tech.js_patterns)
    }

    fn match_logic(
        patterns: &KeyedPatterns,
        probes: &HashMap<String, BTreeMap<usize, String>>,
        candidate: &mut CandidateState,
        verbose: bool,
    ) {
        for (key, values) in probes {
            let Some(key_patterns) = patterns.get(key) else {
                continue;
            };
            for (index, value) in values {
                let Some(pattern) = key_patterns.iter().find(|pattern| pattern.index == *index) else {
                    continue;
                };
                if pattern.is_match(value) {
                    DetectionUpdater::update(candidate, Self::SIGNAL, Some(key.as_str()), pattern, value, verbose);
                }
            }
        }
    }
}

/// 环境变量分析器
pub struct EnvAnalyzer;

impl Analyzer<[CompiledPattern], [String]> for EnvAnalyzer {
    const SIGNAL: SignalType = SignalType::Env;

    fn get_patterns(tech: &CompiledTechRule) -> Option<&[CompiledPattern]> {
        non_empty(&tech.env_patterns)
    }

    fn match_logic(patterns: &[CompiledPattern], env: &[String], candidate: &mut CandidateState, verbose: bool) {
        scan_values(Self::SIGNAL, None, patterns, env.iter().map(String::as_str), candidate, verbose);
    }
}

/// URL分析器
pub struct UrlAnalyzer;

impl Analyzer<[CompiledPattern], str> for UrlAnalyzer {
    const SIGNAL: SignalType = SignalType::Url;

    fn get_patterns(tech: &CompiledTechRule) -> Option<&[CompiledPattern]> {
        non_empty(&tech.url_patterns)
    }

    fn match_logic(patterns: &[CompiledPattern], url: &str, candidate: &mut CandidateState, verbose: bool) {
        scan_values(Self::SIGNAL, None, patterns, std::iter::once(url), candidate, verbose);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::RuleCompiler;
    use crate::rule::{RuleLibrary, TechRule};
    use crate::signal::extract_meta_tags;
    use serde_json::json;
    use std::sync::Arc;

    fn compiled(rule: TechRule) -> Arc<CompiledTechRule> {
        let lib = RuleLibrary::default().with_tech("Tech", rule);
        RuleCompiler::compile(&lib).get("Tech").unwrap().clone()
    }

    #[test]
    fn test_meta_only_registered_keys_case_insensitive() {
        let tech = compiled(TechRule {
            meta: Some(HashMap::from([(
                "Generator".to_string(),
                json!(r"wordpress ?([\d.]+)?\;version:\1"),
            )])),
            ..Default::default()
        });

        let tags = extract_meta_tags(r#"<meta name="GENERATOR" content="WordPress 6.4.2">"#);
        let mut candidate = CandidateState::new(tech.clone());
        MetaAnalyzer::analyze(tags.as_slice(), &mut candidate, false);
        assert_eq!(candidate.confidence(), 100);
        assert_eq!(candidate.version(), Some("6.4.2"));

        let unrelated = extract_meta_tags(r#"<meta name="description" content="WordPress 6.4.2">"#);
        let mut candidate = CandidateState::new(tech);
        MetaAnalyzer::analyze(unrelated.as_slice(), &mut candidate, false);
        assert!(!candidate.detected);
    }

    #[test]
    fn test_header_rule_confidence() {
        let tech = compiled(TechRule {
            headers: Some(HashMap::from([(
                "X-Powered-By".to_string(),
                json!(r"PHP/\d+\.\d+\;confidence:50"),
            )])),
            ..Default::default()
        });
        let headers = HashMap::from([("x-powered-by".to_string(), "PHP/7.4".to_string())]);

        let mut candidate = CandidateState::new(tech);
        HeaderAnalyzer::analyze(&headers, &mut candidate, false);
        assert_eq!(candidate.total_confidence(), 50.0);
    }

    #[test]
    fn test_script_any_url_matches() {
        let tech = compiled(TechRule {
            script: Some(json!([r"jquery[.-]([\d.]+)(?:\.min)?\.js\;version:\1", "jquery"])),
            ..Default::default()
        });
        let scripts = vec!["/static/app.js".to_string(), "/cdn/jquery-3.6.0.min.js".to_string()];

        let mut candidate = CandidateState::new(tech);
        ScriptAnalyzer::analyze(scripts.as_slice(), &mut candidate, false);
        assert!(candidate.detected);
        assert_eq!(candidate.version(), Some("3.6.0"));
        assert_eq!(candidate.confidence_entries().count(), 2);
    }

    #[test]
    fn test_js_probe_uses_rule_index() {
        let tech = compiled(TechRule {
            js: Some(HashMap::from([(
                "jQuery.fn.jquery".to_string(),
                json!([r"^1\.", r"([\d.]+)\;version:\1"]),
            )])),
            ..Default::default()
        });
        let probes = HashMap::from([(
            "jQuery.fn.jquery".to_string(),
            BTreeMap::from([(1usize, "3.7.1".to_string()), (5usize, "1.0".to_string())]),
        )]);

        let mut candidate = CandidateState::new(tech);
        JsAnalyzer::analyze(&probes, &mut candidate, false);
        assert_eq!(candidate.confidence_entries().count(), 1);
        assert_eq!(candidate.version(), Some("3.7.1"));
    }

    #[test]
    fn test_js_index_survives_broken_sibling() {
        let tech = compiled(TechRule {
            js: Some(HashMap::from([(
                "Lib.version".to_string(),
                json!(["(unclosed", r"^2\.\;version:two"]),
            )])),
            ..Default::default()
        });

        let slot_one = HashMap::from([(
            "Lib.version".to_string(),
            BTreeMap::from([(1usize, "2.0".to_string())]),
        )]);
        let mut candidate = CandidateState::new(tech.clone());
        JsAnalyzer::analyze(&slot_one, &mut candidate, false);
        assert!(candidate.detected);
        assert_eq!(candidate.version(), Some("two"));

        // 下标0的规则编译失败，下标0的采集值不应被下标1的规则匹配
        let slot_zero = HashMap::from([(
            "Lib.version".to_string(),
            BTreeMap::from([(0usize, "2.0".to_string())]),
        )]);
        let mut candidate = CandidateState::new(tech);
        JsAnalyzer::analyze(&slot_zero, &mut candidate, false);
        assert!(!candidate.detected);
    }

    #[test]
    fn test_html_env_url_case_sensitive() {
        let tech = compiled(TechRule {
            html: Some(json!("<div id=\"App\"")),
            env: Some(json!("^__NEXT_DATA__$")),
            url: Some(json!(r"^https?://[^/]+\.myshopify\.com")),
            ..Default::default()
        });

        let mut candidate = CandidateState::new(tech.clone());
        HtmlAnalyzer::analyze("<div id=\"app\">", &mut candidate, false);
        assert!(!candidate.detected);

        let env = vec!["__NEXT_DATA__".to_string()];
        EnvAnalyzer::analyze(env.as_slice(), &mut candidate, false);
        UrlAnalyzer::analyze("https://demo.myshopify.com/cart", &mut candidate, false);
        assert_eq!(candidate.confidence_entries().count(), 2);
        assert_eq!(candidate.confidence(), 100);
    }
}
