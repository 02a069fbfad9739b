//! 单次检测中每个技术的候选状态
//! 置信度按来源键聚合（同键覆盖），总分封顶100；版本号取字典序最大值

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use crate::compiler::{CompiledTechRule, SignalType};

const MAX_CONFIDENCE: f64 = 100.0;

/// 置信度来源键：信号类型 + 可选键名 + 规则原文 + 推导链
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConfidenceKey {
    pub signal: SignalType,
    pub key: Option<String>,
    pub rule: String,
    // 推导链，按推导顺序排列（首个为证据所属技术）
    pub implied_by: Vec<String>,
}

impl ConfidenceKey {
    pub fn new(signal: SignalType, key: Option<&str>, rule: &str) -> Self {
        Self {
            signal,
            key: key.map(str::to_string),
            rule: rule.to_string(),
            implied_by: Vec::new(),
        }
    }

    /// 派生推导键：`<原键> implied by <tech>`
    pub fn implied_by(&self, tech: &str) -> Self {
        let mut derived = self.clone();
        derived.implied_by.push(tech.to_string());
        derived
    }

    /// 技术是否已在推导链中
    pub fn in_chain(&self, tech: &str) -> bool {
        self.implied_by.iter().any(|t| t == tech)
    }
}

impl fmt::Display for ConfidenceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ", self.signal)?;
        if let Some(key) = &self.key {
            write!(f, "{} ", key)?;
        }
        f.write_str(&self.rule)?;
        for tech in &self.implied_by {
            write!(f, " implied by {}", tech)?;
        }
        Ok(())
    }
}

/// 候选技术状态
#[derive(Debug, Clone)]
pub struct CandidateState {
    pub tech: Arc<CompiledTechRule>,
    pub detected: bool,
    pub version: String,
    confidence: BTreeMap<ConfidenceKey, f64>,
}

impl CandidateState {
    pub fn new(tech: Arc<CompiledTechRule>) -> Self {
        Self {
            tech,
            detected: false,
            version: String::new(),
            confidence: BTreeMap::new(),
        }
    }

    /// 由 implies 推导实例化的候选（预置为已检出）
    pub fn implied(tech: Arc<CompiledTechRule>) -> Self {
        let mut state = Self::new(tech);
        state.detected = true;
        state
    }

    pub fn name(&self) -> &str {
        &self.tech.name
    }

    /// 记录一条命中；同键覆盖，重复记录不会累加
    pub fn record(&mut self, key: ConfidenceKey, score: f64) {
        let score = if score.is_finite() { score.clamp(0.0, MAX_CONFIDENCE) } else { 0.0 };
        self.detected = true;
        self.confidence.insert(key, score);
    }

    /// 总置信度：所有来源求和后封顶100
    pub fn total_confidence(&self) -> f64 {
        self.confidence.values().sum::<f64>().min(MAX_CONFIDENCE)
    }

    /// 报告用整数置信度
    pub fn confidence(&self) -> u8 {
        self.total_confidence().round() as u8
    }

    pub fn confidence_entries(&self) -> impl Iterator<Item = (&ConfidenceKey, f64)> + '_ {
        self.confidence.iter().map(|(key, score)| (key, *score))
    }

    /// 提交候选版本，仅在非空且字典序更大时替换（相等保留先到者）
    pub fn offer_version(&mut self, candidate: &str) -> bool {
        if candidate.is_empty() || candidate <= self.version.as_str() {
            return false;
        }
        self.version = candidate.to_string();
        true
    }

    pub fn version(&self) -> Option<&str> {
        (!self.version.is_empty()).then_some(self.version.as_str())
    }

    /// 已检出且总置信度大于0
    pub fn is_confirmed(&self) -> bool {
        self.detected && self.total_confidence() > 0.0
    }

    /// 直接推导出本技术的来源技术（推导链最后一环），去重排序
    pub fn implied_by(&self) -> Vec<String> {
        self.confidence
            .keys()
            .filter_map(|key| key.implied_by.last().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}
