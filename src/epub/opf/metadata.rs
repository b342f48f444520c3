//! 包元数据模块
//!
//! 定义拼装过程需要的渲染属性、封面引用和脊柱项属性。

use std::fmt;
use std::str::FromStr;

/// rendition:layout 的取值
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenditionLayout {
    Reflowable,
    PrePaginated,
}

/// rendition:spread 的取值
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenditionSpread {
    None,
    Auto,
    Landscape,
    Portrait,
    Both,
}

/// rendition:orientation 的取值
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenditionOrientation {
    Auto,
    Landscape,
    Portrait,
}

/// 无法识别的渲染属性值
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownRenditionValue(pub String);

impl fmt::Display for UnknownRenditionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "无法识别的渲染属性值: {}", self.0)
    }
}

impl std::error::Error for UnknownRenditionValue {}

/// 为渲染属性枚举生成字符串互转
macro_rules! rendition_keywords {
    ($ty:ident { $($variant:ident => $keyword:literal),+ $(,)? }) => {
        impl $ty {
            /// 对应的属性关键字
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($ty::$variant => $keyword,)+
                }
            }
        }

        impl FromStr for $ty {
            type Err = UnknownRenditionValue;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                match value.trim() {
                    $($keyword => Ok($ty::$variant),)+
                    other => Err(UnknownRenditionValue(other.to_string())),
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

rendition_keywords!(RenditionLayout {
    Reflowable => "reflowable",
    PrePaginated => "pre-paginated",
});

rendition_keywords!(RenditionSpread {
    None => "none",
    Auto => "auto",
    Landscape => "landscape",
    Portrait => "portrait",
    Both => "both",
});

rendition_keywords!(RenditionOrientation {
    Auto => "auto",
    Landscape => "landscape",
    Portrait => "portrait",
});

/// 封面的来源
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoverProvenance {
    /// `<meta name="cover" content="id"/>` 指向的清单项
    ExplicitMetadata,
    /// 清单项带有 `cover-image` 属性
    CoverImageProperty,
    /// 从首个页面中挑选的最大图片
    InferredLargestImage,
    /// 没有封面
    None,
}

/// 脊柱项属性，保持包文档中的出现顺序
///
/// key为清单中的href，value为itemref的properties（如 `page-spread-left`）
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpineProperties {
    entries: Vec<(String, String)>,
}

impl SpineProperties {
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录href的属性，已存在的href只更新值
    pub fn insert(&mut self, href: String, properties: String) {
        match self.entries.iter_mut().find(|(existing, _)| *existing == href) {
            Some(entry) => entry.1 = properties,
            None => self.entries.push((href, properties)),
        }
    }

    pub fn get(&self, href: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == href)
            .map(|(_, properties)| properties.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(href, properties)| (href.as_str(), properties.as_str()))
    }
}

/// 从包文档中恢复的元数据
///
/// 一次拼装只采用第一个包文档的值，已经设置的字段不会被覆盖
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageMetadata {
    pub rendition_layout: Option<RenditionLayout>,
    pub rendition_spread: Option<RenditionSpread>,
    pub rendition_orientation: Option<RenditionOrientation>,
    /// `<meta name="cover">` 的content，或带cover-image属性的清单项ID
    pub cover_id: Option<String>,
    /// 封面图片的href（相对于包文档）
    pub cover_href: Option<String>,
    /// cover_href是怎样得到的
    pub cover_provenance: Option<CoverProvenance>,
    pub spine_properties: SpineProperties,
}

impl PackageMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// 是否没有恢复出任何字段
    pub fn is_empty(&self) -> bool {
        self.rendition_layout.is_none()
            && self.rendition_spread.is_none()
            && self.rendition_orientation.is_none()
            && self.cover_id.is_none()
            && self.cover_href.is_none()
            && self.spine_properties.is_empty()
    }

    /// 用另一份元数据填补尚未设置的字段，已设置的字段保持不变
    pub fn absorb(&mut self, other: PackageMetadata) {
        if self.rendition_layout.is_none() {
            self.rendition_layout = other.rendition_layout;
        }
        if self.rendition_spread.is_none() {
            self.rendition_spread = other.rendition_spread;
        }
        if self.rendition_orientation.is_none() {
            self.rendition_orientation = other.rendition_orientation;
        }
        if self.cover_href.is_none() && other.cover_href.is_some() {
            self.cover_href = other.cover_href;
            self.cover_provenance = other.cover_provenance;
        }
        if self.cover_id.is_none() {
            self.cover_id = other.cover_id;
        }
        for (href, properties) in other.spine_properties.entries {
            if self.spine_properties.get(&href).is_none() {
                self.spine_properties.insert(href, properties);
            }
        }
    }
}

/// 由获取端在包文档之外提供的渲染提示
///
/// 包文档中的值优先，提示只填补包文档没有给出的字段
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenditionHints {
    pub layout: Option<RenditionLayout>,
    pub spread: Option<RenditionSpread>,
    pub orientation: Option<RenditionOrientation>,
}

impl RenditionHints {
    pub fn pre_paginated() -> Self {
        Self {
            layout: Some(RenditionLayout::PrePaginated),
            ..Self::default()
        }
    }
}
