//! meta 标签提取（纯函数）
//! 按标签边界正则切出 `<meta ...>`，再分别取 name/property 与 content 属性

use once_cell::sync::Lazy;
use regex::Regex;

static META_TAG_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)<meta[^>]+>").unwrap()
});

static META_NAME_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)[\s"'/](?:name|property)\s*=\s*["']([^"']+)["']"#).unwrap()
});

static META_CONTENT_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)[\s"'/]content\s*=\s*["']([^"']+)["']"#).unwrap()
});

/// 单个 meta 标签
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetaTag {
    // name/property 声明的键名（小写）
    pub names: Vec<String>,
    pub content: Option<String>,
}

impl MetaTag {
    /// 是否声明了指定键名（忽略大小写）
    pub fn declares(&self, key: &str) -> bool {
        self.names.iter().any(|name| name.eq_ignore_ascii_case(key))
    }
}

/// 提取 HTML 中所有 meta 标签
pub fn extract_meta_tags(html: &str) -> Vec<MetaTag> {
    META_TAG_REGEX
        .find_iter(html)
        .map(|tag| {
            let tag = tag.as_str();
            MetaTag {
                names: META_NAME_REGEX
                    .captures_iter(tag)
                    .filter_map(|caps| caps.get(1))
                    .map(|name| name.as_str().trim().to_lowercase())
                    .collect(),
                content: META_CONTENT_REGEX
                    .captures(tag)
                    .and_then(|caps| caps.get(1))
                    .map(|content| content.as_str().to_string()),
            }
        })
        .collect()
}
