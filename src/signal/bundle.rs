//! 信号包：单次检测的全部输入
//! 由外部采集层填充，检测期间只读

use std::collections::{BTreeMap, HashMap};
use http::HeaderMap;

use crate::extractor::HtmlExtractor;
use crate::utils::HeaderConverter;

/// JS 探针结果：技术 -> 探针属性 -> 规则下标 -> 采集值
pub type ProbeResults = HashMap<String, HashMap<String, BTreeMap<usize, String>>>;

/// 检测输入
#[derive(Debug, Clone, Default)]
pub struct SignalBundle {
    body: String,
    scripts: Vec<String>,
    // 键名小写
    headers: HashMap<String, String>,
    js: ProbeResults,
    env: Vec<String>,
    url: String,
}

impl SignalBundle {
    pub fn builder() -> SignalBundleBuilder {
        SignalBundleBuilder::default()
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn scripts(&self) -> &[String] {
        &self.scripts
    }

    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    /// 按名称取Header值（忽略大小写）
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_lowercase()).map(String::as_str)
    }

    pub fn js(&self) -> &ProbeResults {
        &self.js
    }

    pub fn env(&self) -> &[String] {
        &self.env
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// 所有字段均为空
    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
            && self.scripts.is_empty()
            && self.headers.is_empty()
            && self.js.is_empty()
            && self.env.is_empty()
            && self.url.is_empty()
    }
}

/// 信号包构建器
#[derive(Debug, Clone)]
pub struct SignalBundleBuilder {
    bundle: SignalBundle,
    extract_scripts: bool,
}

impl Default for SignalBundleBuilder {
    fn default() -> Self {
        Self {
            bundle: SignalBundle::default(),
            extract_scripts: true,
        }
    }
}

impl SignalBundleBuilder {
    /// 响应体文本
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.bundle.body = body.into();
        self
    }

    /// build 时是否从 body 中提取 `<script src>`
    pub fn extract_scripts(mut self, extract: bool) -> Self {
        self.extract_scripts = extract;
        self
    }

    pub fn script(mut self, src: impl Into<String>) -> Self {
        self.bundle.scripts.push(src.into());
        self
    }

    pub fn scripts<I, S>(mut self, srcs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.bundle.scripts.extend(srcs.into_iter().map(Into::into));
        self
    }

    /// 单个Header，键名转小写；同名覆盖
    pub fn header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.bundle.headers.insert(name.as_ref().to_lowercase(), value.into());
        self
    }

    /// 从 http::HeaderMap 导入（同名多值以 `, ` 拼接）
    pub fn headers_from_map(mut self, header_map: &HeaderMap) -> Self {
        self.bundle.headers.extend(HeaderConverter::to_single_value_map(header_map));
        self
    }

    pub fn env(mut self, value: impl Into<String>) -> Self {
        self.bundle.env.push(value.into());
        self
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.bundle.url = url.into();
        self
    }

    /// 填充一条探针结果：技术 / 探针属性 / 规则下标 / 采集值
    pub fn probe(
        mut self,
        tech: impl Into<String>,
        key: impl Into<String>,
        index: usize,
        value: impl Into<String>,
    ) -> Self {
        self.bundle
            .js
            .entry(tech.into())
            .or_default()
            .entry(key.into())
            .or_default()
            .insert(index, value.into());
        self
    }

    pub fn build(mut self) -> SignalBundle {
        if self.extract_scripts && !self.bundle.body.is_empty() {
            for src in HtmlExtractor::script_srcs(&self.bundle.body) {
                if !self.bundle.scripts.contains(&src) {
                    self.bundle.scripts.push(src);
                }
            }
        }
        self.bundle
    }
}
