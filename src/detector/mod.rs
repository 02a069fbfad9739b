//! 检测模块：技术检测核心逻辑
pub mod analyzer;
pub mod candidate;
pub mod detector;
pub mod global;
pub mod resolver;
pub mod result;

// 导出核心接口
pub use self::analyzer::{
    Analyzer, EnvAnalyzer, HeaderAnalyzer, HtmlAnalyzer, JsAnalyzer, MetaAnalyzer, ScriptAnalyzer, UrlAnalyzer,
};
pub use self::candidate::{CandidateState, ConfidenceKey};
pub use self::detector::TechDetector;
pub use self::global::{
    detect_technologies, get_global_detector, init_global_detector, init_global_detector_with_config,
};
pub use self::resolver::{CandidateTable, RelationResolver};
pub use self::result::ResultSet;
