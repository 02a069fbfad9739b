//! 规则数据模型定义
//! 仅存储规则数据，无任何业务逻辑，支持序列化/反序列化

use std::collections::HashMap;
use std::fmt;
use serde::{Deserialize, Deserializer, Serialize};

/// 技术检测结果（完整版本）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Technology {
    pub name: String,
    pub confidence: u8,
    pub version: Option<String>,
    pub categories: Vec<String>,
    // 推导来源技术，序列化自动跳过空值
    #[serde(skip_serializing_if = "Option::is_none")]
    pub implied_by: Option<Vec<String>>,
    pub website: Option<String>,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub cpe: Option<String>,
}

// ======== 为 Technology 实现 Display trait（用于 Report 输出） ========
impl fmt::Display for Technology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            Some(v) if !v.is_empty() => write!(f, "{} {}", self.name, v),
            _ => write!(f, "{}", self.name),
        }
    }
}

/// 技术检测结果（精简版本）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TechnologyLite {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default = "full_confidence", skip_serializing_if = "is_default_confidence")]
    pub confidence: u8,
}

impl fmt::Display for TechnologyLite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            Some(v) if !v.is_empty() => write!(f, "{} {}", self.name, v),
            _ => write!(f, "{}", self.name),
        }
    }
}

// ======== 类型转换 ========
impl From<Technology> for TechnologyLite {
    fn from(full: Technology) -> Self {
        Self {
            name: full.name,
            version: full.version,
            confidence: full.confidence,
        }
    }
}

// ======== 辅助函数：置信度100时不序列化 ========
fn is_default_confidence(conf: &u8) -> bool {
    *conf == 100
}

fn full_confidence() -> u8 {
    100
}

/// 技术规则定义（Wappalyzer apps.json 单个技术）
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TechRule {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    // 分类ID统一为字符串，兼容数字写法
    #[serde(rename = "cats", default, alias = "categories", deserialize_with = "deserialize_category_ids")]
    pub category_ids: Vec<String>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub cpe: Option<String>,

    // 检测规则：字符串 / 字符串列表
    #[serde(default)]
    pub url: Option<serde_json::Value>,
    #[serde(default)]
    pub html: Option<serde_json::Value>,
    // 兼容：新版规则的 scriptSrc 字段
    #[serde(default, alias = "scriptSrc")]
    pub script: Option<serde_json::Value>,
    #[serde(default)]
    pub env: Option<serde_json::Value>,

    // 检测规则：键 -> 字符串 / 字符串列表
    #[serde(default)]
    pub meta: Option<HashMap<String, serde_json::Value>>,
    #[serde(default)]
    pub headers: Option<HashMap<String, serde_json::Value>>,
    #[serde(default)]
    pub js: Option<HashMap<String, serde_json::Value>>,

    // 关联规则
    #[serde(default)]
    pub implies: Option<serde_json::Value>,
    #[serde(default)]
    pub excludes: Option<serde_json::Value>,
}

// 分类ID可能是数字或字符串（`[1, "11"]`），统一转为去空白的字符串，空ID丢弃
fn deserialize_category_ids<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Num(u64),
        Str(String),
    }

    let ids = Option::<Vec<RawId>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(ids
        .into_iter()
        .map(|id| match id {
            RawId::Num(num) => num.to_string(),
            RawId::Str(s) => s.trim().to_string(),
        })
        .filter(|id| !id.is_empty())
        .collect())
}

/// 分类规则定义
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CategoryRule {
    pub name: String,
    pub priority: Option<u32>,
}

// 旧版 apps.json 中分类直接是名称字符串，新版是对象
impl<'de> Deserialize<'de> for CategoryRule {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawCategory {
            Named {
                #[serde(default)]
                name: String,
                #[serde(default)]
                priority: Option<u32>,
            },
            Plain(String),
        }

        Ok(match RawCategory::deserialize(deserializer)? {
            RawCategory::Named { name, priority } => CategoryRule { name, priority },
            RawCategory::Plain(name) => CategoryRule { name, priority: None },
        })
    }
}

/// 完整规则库（技术名称 -> 规则，分类ID -> 分类）
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RuleLibrary {
    #[serde(rename = "apps", alias = "technologies", default)]
    pub tech_rules: HashMap<String, TechRule>,
    #[serde(rename = "categories", default)]
    pub category_rules: HashMap<String, CategoryRule>,
}

impl RuleLibrary {
    /// 插入单个技术规则（便于手工构建规则库）
    pub fn with_tech(mut self, name: impl Into<String>, rule: TechRule) -> Self {
        self.tech_rules.insert(name.into(), rule);
        self
    }

    /// 插入单个分类
    pub fn with_category(mut self, id: impl ToString, name: impl Into<String>) -> Self {
        self.category_rules.insert(
            id.to_string(),
            CategoryRule {
                name: name.into(),
                priority: None,
            },
        );
        self
    }
}
