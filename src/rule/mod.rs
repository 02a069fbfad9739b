//! 规则模块：负责规则数据模型定义与内存编解码
pub mod model;
pub mod codec;

// 导出核心接口
pub use self::model::{
    Technology, TechnologyLite, TechRule, CategoryRule, RuleLibrary
};
pub use self::codec::RuleCodec;
