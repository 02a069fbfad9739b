//! 检测结果集

use std::collections::BTreeMap;

use super::candidate::CandidateState;
use crate::compiler::CompiledRuleLibrary;
use crate::error::RswappalyzerError;
use crate::rule::{Technology, TechnologyLite};

/// 单次检测的最终结果：技术名 -> 候选状态（均已检出且置信度 > 0）
#[derive(Debug, Default)]
pub struct ResultSet {
    entries: BTreeMap<String, CandidateState>,
    // 关联解析阶段的错误（结果仍为部分有效）
    resolve_error: Option<RswappalyzerError>,
}

impl ResultSet {
    pub fn new(entries: BTreeMap<String, CandidateState>, resolve_error: Option<RswappalyzerError>) -> Self {
        Self { entries, resolve_error }
    }

    pub fn get(&self, name: &str) -> Option<&CandidateState> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 按名称排序
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &CandidateState)> {
        self.entries.iter().map(|(name, state)| (name.as_str(), state))
    }

    pub fn resolve_error(&self) -> Option<&RswappalyzerError> {
        self.resolve_error.as_ref()
    }

    /// 分类简写名（小写、空格转连字符） -> 排序后的技术名列表
    pub fn by_category(&self, compiled_lib: &CompiledRuleLibrary) -> BTreeMap<String, Vec<String>> {
        let mut grouped: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (name, state) in &self.entries {
            for cat_id in &state.tech.category_ids {
                if let Some(slug) = compiled_lib.category_slug(cat_id) {
                    grouped.entry(slug).or_default().push(name.clone());
                }
            }
        }
        for names in grouped.values_mut() {
            names.sort();
            names.dedup();
        }
        grouped
    }

    /// 转换为报告记录（按名称排序）
    pub fn technologies(&self, compiled_lib: &CompiledRuleLibrary) -> Vec<Technology> {
        self.entries
            .iter()
            .map(|(name, state)| {
                let tech = &state.tech;
                let implied_by = state.implied_by();
                Technology {
                    name: name.clone(),
                    confidence: state.confidence(),
                    version: state.version().map(str::to_string),
                    categories: tech
                        .category_ids
                        .iter()
                        .filter_map(|cat_id| compiled_lib.category_map.get(cat_id).cloned())
                        .collect(),
                    implied_by: (!implied_by.is_empty()).then_some(implied_by),
                    website: tech.website.clone(),
                    description: tech.description.clone(),
                    icon: tech.icon.clone(),
                    cpe: tech.cpe.clone(),
                }
            })
            .collect()
    }

    /// 精简报告记录
    pub fn technologies_lite(&self) -> Vec<TechnologyLite> {
        self.entries
            .iter()
            .map(|(name, state)| TechnologyLite {
                name: name.clone(),
                version: state.version().map(str::to_string),
                confidence: state.confidence(),
            })
            .collect()
    }
}

impl IntoIterator for ResultSet {
    type Item = (String, CandidateState);
    type IntoIter = std::collections::btree_map::IntoIter<String, CandidateState>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::{CompiledTechRule, SignalType};
    use crate::detector::ConfidenceKey;
    use std::collections::HashMap;
    use std::sync::Arc;

    fn state(name: &str, cats: &[&str], score: f64) -> CandidateState {
        let mut state = CandidateState::new(Arc::new(CompiledTechRule {
            name: name.to_string(),
            category_ids: cats.iter().map(|id| id.to_string()).collect(),
            website: Some(format!("https://{}.example", name.to_lowercase())),
            ..Default::default()
        }));
        state.record(ConfidenceKey::new(SignalType::Html, None, name), score);
        state
    }

    fn library() -> CompiledRuleLibrary {
        CompiledRuleLibrary {
            category_map: HashMap::from([
                ("1".to_string(), "CMS".to_string()),
                ("27".to_string(), "Programming languages".to_string()),
            ]),
            ..Default::default()
        }
    }

    #[test]
    fn test_by_category_slugs() {
        let entries = BTreeMap::from([
            ("WordPress".to_string(), state("WordPress", &["1"], 100.0)),
            ("PHP".to_string(), state("PHP", &["27"], 100.0)),
            ("Drupal".to_string(), state("Drupal", &["1", "99"], 100.0)),
        ]);
        let grouped = ResultSet::new(entries, None).by_category(&library());

        assert_eq!(grouped["cms"], vec!["Drupal".to_string(), "WordPress".to_string()]);
        assert_eq!(grouped["programming-languages"], vec!["PHP".to_string()]);
        assert_eq!(grouped.len(), 2);
    }

    #[test]
    fn test_report_records() {
        let mut php = state("PHP", &["27"], 50.0);
        php.offer_version("8.2.1");
        let results = ResultSet::new(BTreeMap::from([("PHP".to_string(), php)]), None);

        let techs = results.technologies(&library());
        assert_eq!(techs.len(), 1);
        assert_eq!(techs[0].confidence, 50);
        assert_eq!(techs[0].version.as_deref(), Some("8.2.1"));
        assert_eq!(techs[0].categories, vec!["Programming languages".to_string()]);
        assert_eq!(techs[0].implied_by, None);

        let lite = results.technologies_lite();
        assert_eq!(lite[0].to_string(), "PHP 8.2.1");
        assert!(results.resolve_error().is_none());
    }
}
