//! Header格式转换工具
//! http::HeaderMap -> 小写键名的单值映射（同名多值以 `, ` 拼接）

use std::collections::HashMap;
use http::HeaderMap;
use tracing::debug;

const HEADER_VALUE_SEPARATOR: &str = ", ";

/// Header转换工具
pub struct HeaderConverter;

impl HeaderConverter {
    /// 将HeaderMap转换为HashMap<String, Vec<String>>（键名小写，非UTF-8值视为空串）
    pub fn to_hashmap(header_map: &HeaderMap) -> HashMap<String, Vec<String>> {
        let mut map: HashMap<String, Vec<String>> = HashMap::with_capacity(header_map.keys_len());

        for (key, value) in header_map.iter() {
            map.entry(key.as_str().to_lowercase())
                .or_default()
                .push(value.to_str().unwrap_or("").to_string());
        }

        debug!("Header转换完成，生成{}条记录", map.len());
        map
    }

    /// 多值映射转单值映射：非空值按出现顺序以 `, ` 拼接，全部为空的键丢弃
    pub fn to_single_value(hashmap: &HashMap<String, Vec<String>>) -> HashMap<String, String> {
        hashmap
            .iter()
            .filter_map(|(key, values)| {
                let joined = values
                    .iter()
                    .filter(|v| !v.is_empty())
                    .map(String::as_str)
                    .collect::<Vec<_>>()
                    .join(HEADER_VALUE_SEPARATOR);
                (!joined.is_empty()).then(|| (key.to_lowercase(), joined))
            })
            .collect()
    }

    /// HeaderMap 直接转单值映射
    pub fn to_single_value_map(header_map: &HeaderMap) -> HashMap<String, String> {
        Self::to_single_value(&Self::to_hashmap(header_map))
    }
}
