//! 规则库编解码
//! 仅处理内存中的字节 <-> 规则库转换（JSON / MessagePack），不做任何文件读写

use rmp_serde::{Serializer, from_slice};
use serde::Serialize;
use tracing::debug;

use super::model::RuleLibrary;
use crate::error::{RswResult, RswappalyzerError};

/// 规则库编解码器
pub struct RuleCodec;

impl RuleCodec {
    /// 解析 Wappalyzer apps.json 格式
    /// JSON 语法或结构错误返回 `JsonError`，没有任何技术规则返回 `RuleParseError`
    pub fn from_json_slice(data: &[u8]) -> RswResult<RuleLibrary> {
        let rule_lib: RuleLibrary = serde_json::from_slice(data)?;

        if rule_lib.tech_rules.is_empty() {
            return Err(RswappalyzerError::RuleParseError("规则库中没有任何技术规则".to_string()));
        }

        debug!("JSON规则库解析成功，技术规则数：{}，分类规则数：{}", rule_lib.tech_rules.len(), rule_lib.category_rules.len());
        Ok(rule_lib)
    }

    /// MessagePack 反序列化
    pub fn from_msgpack(data: &[u8]) -> RswResult<RuleLibrary> {
        let rule_lib: RuleLibrary = from_slice(data)
            .map_err(|e| RswappalyzerError::MsgPackError(format!("反序列化失败：{}", e)))?;

        debug!("MessagePack反序列化成功，技术规则数：{}，分类规则数：{}", rule_lib.tech_rules.len(), rule_lib.category_rules.len());
        Ok(rule_lib)
    }

    /// MessagePack 序列化（结构体按字段名编码，保证可读回）
    pub fn to_msgpack(rule_lib: &RuleLibrary) -> RswResult<Vec<u8>> {
        let mut data = Vec::new();
        rule_lib
            .serialize(&mut Serializer::new(&mut data).with_struct_map())
            .map_err(|e| RswappalyzerError::MsgPackError(format!("序列化失败：{}", e)))?;

        debug!("规则库序列化成功，序列化后数据大小：{} 字节", data.len());
        Ok(data)
    }
}
