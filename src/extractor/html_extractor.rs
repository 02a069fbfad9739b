//! HTML标签提取器
//! 基于 html5ever 分词器，从HTML中提取 script src

use std::cell::RefCell;
use html5ever::tokenizer::{
    BufferQueue, Tag, TagKind, Token, TokenSink, TokenSinkResult, Tokenizer, TokenizerOpts
};
use markup5ever::interface::Attribute;
use tendril::StrTendril;

#[derive(Debug, Default, Clone)]
pub struct HtmlExtractor {
    script_srcs: RefCell<Vec<String>>,
}

impl TokenSink for HtmlExtractor {
    type Handle = ();

    fn process_token(&self, token: Token, _line: u64) -> TokenSinkResult<()> {
        if let Token::TagToken(Tag {
            kind: TagKind::StartTag,
            name,
            attrs,
            ..
        }) = token
        {
            if &*name == "script" {
                self.extract_script_src(&attrs);
            }
        }
        TokenSinkResult::Continue
    }
}

impl HtmlExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// 从HTML字符串提取标签
    pub fn extract(&self, html: &str) -> Self {
        let tokenizer = Tokenizer::new(self.clone(), TokenizerOpts::default());
        let queue = BufferQueue::default();
        queue.push_back(StrTendril::from(html));

        let _ = tokenizer.feed(&queue);
        tokenizer.end();

        tokenizer.sink
    }

    /// 便捷方法：直接返回 script src 列表
    pub fn script_srcs(html: &str) -> Vec<String> {
        Self::new().extract(html).get_script_srcs()
    }

    /// 提取script-src（空值忽略）
    fn extract_script_src(&self, attrs: &[Attribute]) {
        if let Some(attr) = attrs.iter().find(|attr| attr.name.local.as_ref() == "src") {
            let src = attr.value.trim();
            if !src.is_empty() {
                self.script_srcs.borrow_mut().push(src.to_string());
            }
        }
    }

    /// 获取提取到的script-src列表
    pub fn get_script_srcs(&self) -> Vec<String> {
        self.script_srcs.borrow().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_html_extractor() {
        let html = r#"
            <script src="/jquery.min.js"></script>
            <meta name="generator" content="WordPress 6.0" />
            <SCRIPT SRC="/vue.global.js"></SCRIPT>
            <script>var inline = 1;</script>
            <script src=""></script>
        "#;

        assert_eq!(
            HtmlExtractor::script_srcs(html),
            vec!["/jquery.min.js".to_string(), "/vue.global.js".to_string()]
        );
    }
}
