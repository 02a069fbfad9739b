//! rswappalyzer-core - Wappalyzer 规则检测内核
//! 规则编译、多信号匹配、置信度聚合、implies/excludes 关联解析

// 导出全局错误类型
pub use self::error::{RswappalyzerError, RswResult};

// 导出配置模块
pub use self::config::{DetectorConfig, ConfigManager, CustomConfigBuilder};

// 导出规则模块核心接口
pub use self::rule::{
    Technology, TechnologyLite, TechRule, CategoryRule, RuleLibrary, RuleCodec
};

// 导出提取模块核心接口
pub use self::extractor::HtmlExtractor;

// 导出信号模块核心接口
pub use self::signal::{MetaTag, ProbeResults, SignalBundle, SignalBundleBuilder, extract_meta_tags};

// 导出工具模块核心接口
pub use self::utils::{
    VersionExtractor, HeaderConverter, DetectionUpdater
};

// 导出编译模块核心接口
pub use self::compiler::{
    CompileWarning, CompiledPattern, CompiledRuleLibrary, CompiledTechRule, ImpliedRef, RuleCompiler, SignalType
};

// 导出检测模块核心接口
pub use self::detector::{
    CandidateState,
    ConfidenceKey,
    ResultSet,
    TechDetector,
    init_global_detector,
    init_global_detector_with_config,
    detect_technologies,
};

// 声明所有子模块
pub mod config;
pub mod error;
pub mod rule;
pub mod extractor;
pub mod signal;
pub mod utils;
pub mod compiler;
pub mod detector;
