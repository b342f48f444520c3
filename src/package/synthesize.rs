//! 包合成
//!
//! 把拼装结果整理成打包端需要的结构：清单、脊柱、导航条目、渲染属性和封面。
//! 这里不产生任何字节，序列化由 [`crate::package::writer`] 完成。

use std::collections::HashSet;

use log::info;

use crate::epub::config::ReassemblyConfig;
use crate::epub::opf::{
    ManifestItem, PackageMetadata, RenditionHints, RenditionLayout, RenditionOrientation,
    RenditionSpread, SpineItem, media_type_for,
};
use crate::merge::cover::CoverDecision;
use crate::merge::paths;
use crate::merge::registry::FileRegistry;

/// 写入包文档时为生成的导航文档和NCX保留的ID
pub const NAV_ID: &str = "nav";
pub const NCX_ID: &str = "ncx";

/// 清单中的一项及其内容
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageItem {
    pub item: ManifestItem,
    pub content: Vec<u8>,
}

/// 导航文档中的一个条目
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationEntry {
    /// 页面的href，与清单项相同
    pub href: String,
    pub title: String,
}

/// 最终的渲染属性
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Rendition {
    pub layout: Option<RenditionLayout>,
    pub spread: Option<RenditionSpread>,
    pub orientation: Option<RenditionOrientation>,
}

impl Rendition {
    /// 包文档中的值优先，缺失的字段由渲染提示补上
    pub fn resolve(metadata: &PackageMetadata, hints: &RenditionHints) -> Self {
        Self {
            layout: metadata.rendition_layout.or(hints.layout),
            spread: metadata.rendition_spread.or(hints.spread),
            orientation: metadata.rendition_orientation.or(hints.orientation),
        }
    }

    pub fn is_pre_paginated(&self) -> bool {
        self.layout == Some(RenditionLayout::PrePaginated)
    }
}

/// 拼装结束时交给合成步骤的全部状态
pub struct MergeOutcome {
    pub registry: FileRegistry,
    pub stylesheets: Vec<(String, Vec<u8>)>,
    pub metadata: PackageMetadata,
    pub hints: RenditionHints,
    pub cover: CoverDecision,
}

/// 合成好的包，交给打包端序列化
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesizedPackage {
    /// 保留的文件在前，合并后的样式表在后
    pub manifest: Vec<PackageItem>,
    pub spine: Vec<SpineItem>,
    pub navigation: Vec<NavigationEntry>,
    pub rendition: Rendition,
    pub cover: CoverDecision,
    /// 封面清单项的ID
    pub cover_id: Option<String>,
}

impl SynthesizedPackage {
    /// 没有任何分片时的结果
    pub fn empty() -> Self {
        Self {
            manifest: Vec::new(),
            spine: Vec::new(),
            navigation: Vec::new(),
            rendition: Rendition::default(),
            cover: CoverDecision::none(),
            cover_id: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.manifest.is_empty() && self.spine.is_empty()
    }

    /// 根据拼装结果合成包
    pub fn assemble(outcome: MergeOutcome, config: &ReassemblyConfig) -> Self {
        let MergeOutcome {
            registry,
            stylesheets,
            metadata,
            hints,
            cover,
        } = outcome;

        let rendition = Rendition::resolve(&metadata, &hints);
        let spine_order = registry.spine_order().to_vec();
        let navigation: Vec<NavigationEntry> = spine_order
            .iter()
            .filter_map(|path| {
                registry.toc_title(path).map(|title| NavigationEntry {
                    href: path.clone(),
                    title: title.to_string(),
                })
            })
            .collect();

        let mut ids = IdAllocator::new();
        let mut manifest: Vec<PackageItem> = registry
            .into_files()
            .into_iter()
            .map(|file| (file.path, file.content))
            .chain(stylesheets)
            .map(|(path, content)| {
                let id = ids.allocate(&path);
                let media_type = media_type_for(&path).to_string();
                PackageItem {
                    item: ManifestItem::new(id, path, media_type),
                    content,
                }
            })
            .collect();

        let mut cover_id = None;
        if let Some(cover_path) = &cover.path {
            if let Some(entry) = manifest.iter_mut().find(|entry| &entry.item.href == cover_path) {
                entry.item.add_property("cover-image");
                cover_id = Some(entry.item.id.clone());
            }
        }

        let spine: Vec<SpineItem> = spine_order
            .iter()
            .filter(|path| {
                !(rendition.is_pre_paginated()
                    && config.is_navigation_filename(paths::basename(path)))
            })
            .filter_map(|path| {
                let id = manifest
                    .iter()
                    .find(|entry| entry.item.href == **path)
                    .map(|entry| entry.item.id.clone())?;
                let properties = metadata
                    .spine_properties
                    .iter()
                    .find(|(href, _)| paths::matches_spine_href(path, href))
                    .map(|(_, properties)| properties.to_string());
                Some(SpineItem::with_properties(id, properties))
            })
            .collect();

        info!(
            "合成完成: {} 个清单项, {} 个脊柱项, {} 个导航条目",
            manifest.len(),
            spine.len(),
            navigation.len()
        );

        Self {
            manifest,
            spine,
            navigation,
            rendition,
            cover,
            cover_id,
        }
    }

    /// 按href查找清单项
    pub fn item(&self, href: &str) -> Option<&PackageItem> {
        self.manifest.iter().find(|entry| entry.item.href == href)
    }

    /// 按ID查找清单项
    pub fn item_by_id(&self, id: &str) -> Option<&PackageItem> {
        self.manifest.iter().find(|entry| entry.item.id == id)
    }

    /// 封面清单项
    pub fn cover_item(&self) -> Option<&PackageItem> {
        self.cover_id.as_deref().and_then(|id| self.item_by_id(id))
    }
}

/// 从文件名派生清单项ID，保证唯一
struct IdAllocator {
    used: HashSet<String>,
}

impl IdAllocator {
    fn new() -> Self {
        Self {
            used: [NAV_ID, NCX_ID].iter().map(|id| id.to_string()).collect(),
        }
    }

    fn allocate(&mut self, path: &str) -> String {
        let base = derive_id(path);
        if self.used.insert(base.clone()) {
            return base;
        }
        let mut n = 2;
        loop {
            let candidate = format!("{}-{}", base, n);
            if self.used.insert(candidate.clone()) {
                return candidate;
            }
            n += 1;
        }
    }
}

/// 文件名中的`.`换成`-`，其他不能出现在XML ID中的字符换成`_`
pub fn derive_id(path: &str) -> String {
    let id: String = paths::basename(path)
        .chars()
        .map(|c| match c {
            '.' => '-',
            c if c.is_ascii_alphanumeric() || c == '-' || c == '_' => c,
            _ => '_',
        })
        .collect();

    if id.starts_with(|c: char| c.is_ascii_alphabetic()) {
        id
    } else {
        format!("item-{}", id)
    }
}
