//! 全局检测器单例管理
use once_cell::sync::Lazy;
use tokio::sync::OnceCell;

use super::detector::TechDetector;
use super::result::ResultSet;
use crate::config::{ConfigManager, DetectorConfig};
use crate::error::{RswResult, RswappalyzerError};
use crate::rule::RuleLibrary;
use crate::signal::SignalBundle;

/// 全局检测器实例
static GLOBAL_DETECTOR: Lazy<OnceCell<TechDetector>> = Lazy::new(OnceCell::new);

/// 初始化全局检测器（默认配置）
pub async fn init_global_detector(rule_lib: &RuleLibrary) -> RswResult<()> {
    init_global_detector_with_config(rule_lib, ConfigManager::get_default()).await
}

/// 带自定义配置初始化全局检测器，重复初始化时保留首个实例
pub async fn init_global_detector_with_config(rule_lib: &RuleLibrary, config: DetectorConfig) -> RswResult<()> {
    GLOBAL_DETECTOR
        .get_or_try_init(|| async move { TechDetector::new(rule_lib, config) })
        .await?;
    Ok(())
}

/// 获取全局检测器
pub fn get_global_detector() -> RswResult<&'static TechDetector> {
    GLOBAL_DETECTOR.get().ok_or(RswappalyzerError::DetectorNotInitialized)
}

/// 使用全局检测器检测
pub fn detect_technologies(bundle: &SignalBundle) -> RswResult<ResultSet> {
    Ok(get_global_detector()?.analyze(bundle))
}
