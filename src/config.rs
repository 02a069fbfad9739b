//! 全局配置管理,存储所有可配置项

/// 检测器配置
#[derive(Debug, Clone)]
pub struct DetectorConfig {
    // implies 推导最大轮数（None 表示使用规则库技术总数）
    pub max_implies_passes: Option<usize>,
    // 批量检测并发度
    pub batch_concurrency: usize,
    // 构建信号包时是否从 body 中提取 script src
    pub extract_scripts: bool,
    // 是否输出每条命中规则的调试日志
    pub verbose: bool,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            max_implies_passes: None,
            batch_concurrency: 16,
            extract_scripts: true,
            verbose: false,
        }
    }
}

impl DetectorConfig {
    /// 计算本次推导的轮数上限
    pub fn implies_pass_cap(&self, signature_count: usize) -> usize {
        self.max_implies_passes.unwrap_or(signature_count).max(1)
    }
}

/// 配置管理器
pub struct ConfigManager;

impl ConfigManager {
    /// 获取默认配置
    pub fn get_default() -> DetectorConfig {
        DetectorConfig::default()
    }

    /// 自定义配置
    pub fn custom() -> CustomConfigBuilder {
        CustomConfigBuilder::new()
    }
}

/// 配置构建器（便于自定义配置）
#[derive(Debug, Clone, Default)]
pub struct CustomConfigBuilder {
    config: DetectorConfig,
}

impl CustomConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_implies_passes(mut self, passes: usize) -> Self {
        self.config.max_implies_passes = Some(passes);
        self
    }

    pub fn batch_concurrency(mut self, concurrency: usize) -> Self {
        // 并发度至少为1，否则信号量永远拿不到许可
        self.config.batch_concurrency = concurrency.max(1);
        self
    }

    pub fn extract_scripts(mut self, extract: bool) -> Self {
        self.config.extract_scripts = extract;
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.config.verbose = verbose;
        self
    }

    pub fn build(self) -> DetectorConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_overrides_defaults() {
        let config = ConfigManager::custom()
            .max_implies_passes(3)
            .batch_concurrency(0)
            .verbose(true)
            .build();

        assert_eq!(config.max_implies_passes, Some(3));
        assert_eq!(config.batch_concurrency, 1);
        assert!(config.verbose);
        assert!(config.extract_scripts);
    }

    #[test]
    fn test_pass_cap_defaults_to_signature_count() {
        let config = ConfigManager::get_default();
        assert_eq!(config.implies_pass_cap(42), 42);
        assert_eq!(config.implies_pass_cap(0), 1);
    }
}
