//! 信号模块：检测输入与 meta 标签解析
pub mod bundle;
pub mod meta;

pub use self::bundle::{ProbeResults, SignalBundle, SignalBundleBuilder};
pub use self::meta::{MetaTag, extract_meta_tags};
