//! 提取模块：从HTML中提取结构化信号
pub mod html_extractor;

pub use self::html_extractor::HtmlExtractor;
