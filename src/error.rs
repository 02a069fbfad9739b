//! 全局错误类型定义

use thiserror::Error;
use regex::Error as RegexError;
use serde_json::Error as SerdeJsonError;

#[derive(Error, Debug)]
pub enum RswappalyzerError {
    // 规则相关错误
    #[error("规则解析失败：{0}")]
    RuleParseError(String),

    // 编译相关错误
    #[error("正则编译失败：{0}")]
    RegexCompileError(#[from] RegexError),

    // 关联推导错误（配置错误，仅终止推导阶段）
    #[error("推导目标不存在：{tech} implies {implied}")]
    ImpliedTechNotFound { tech: String, implied: String },
    #[error("implies 推导在 {passes} 轮内未收敛")]
    ImpliesNotConverged { passes: usize },

    // 检测相关错误
    #[error("检测器未初始化")]
    DetectorNotInitialized,
    #[error("异步任务执行失败：{0}")]
    AsyncTaskError(String),

    // 序列化/反序列化错误
    #[error("JSON解析失败：{0}")]
    JsonError(#[from] SerdeJsonError),
    #[error("MessagePack序列化/反序列化失败：{0}")]
    MsgPackError(String),

    // 基础错误
    #[error("无效输入：{0}")]
    InvalidInput(String),
}

// 全局Result类型
pub type RswResult<T> = Result<T, RswappalyzerError>;
