//! 脊柱模块
//!
//! 提供包文档中阅读顺序（脊柱）的结构定义。

/// 脊柱项信息(阅读顺序)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpineItem {
    /// 引用的清单项ID
    pub idref: String,
    /// 是否线性阅读
    pub linear: bool,
    /// itemref的properties（如page-spread-left）
    pub properties: Option<String>,
}

impl SpineItem {
    /// 创建新的脊柱项
    pub fn new(idref: String) -> Self {
        Self {
            idref,
            linear: true,
            properties: None,
        }
    }

    /// 创建带属性的脊柱项
    pub fn with_properties(idref: String, properties: Option<String>) -> Self {
        Self {
            idref,
            linear: true,
            properties,
        }
    }
}
