//! 检测结果更新工具
//! 负责将单次命中写入候选状态（按来源键记录置信度、提交版本）

use tracing::debug;

use crate::compiler::{CompiledPattern, SignalType};
use crate::detector::{CandidateState, ConfidenceKey};
use crate::utils::VersionExtractor;

/// 检测结果更新工具
pub struct DetectionUpdater;

impl DetectionUpdater {
    /// 记录一次命中：置信度按 (信号, 键, 规则) 记录，再对命中值提取版本
    pub fn update(
        candidate: &mut CandidateState,
        signal: SignalType,
        key: Option<&str>,
        pattern: &CompiledPattern,
        value: &str,
        verbose: bool,
    ) {
        candidate.record(
            ConfidenceKey::new(signal, key, &pattern.source),
            f64::from(pattern.confidence),
        );

        let version = VersionExtractor::best_of(pattern, value);
        if let Some(version) = &version {
            candidate.offer_version(version);
        }

        if verbose {
            debug!(
                "[{}]匹配成功 | 技术: {} | 匹配项: {} | 版本: {:?} | 置信度: {} | 规则: {}",
                signal,
                candidate.name(),
                key.unwrap_or("-"),
                version,
                pattern.confidence,
                pattern.source
            );
        }
    }

    /// 将来源候选的置信度条目按比例传播给被推导技术
    /// 推导链中已出现目标技术的条目不再传播（防止环路回流）
    pub fn propagate_implied(
        source: &CandidateState,
        target: &mut CandidateState,
        implied_confidence: u8,
    ) -> usize {
        let factor = f64::from(implied_confidence) / 100.0;
        let target_name = target.name().to_string();
        let entries: Vec<(ConfidenceKey, f64)> = source
            .confidence_entries()
            .filter(|(key, _)| !key.in_chain(&target_name))
            .map(|(key, score)| (key.implied_by(source.name()), score * factor))
            .collect();

        let count = entries.len();
        for (key, score) in entries {
            target.record(key, score);
        }
        count
    }
}
