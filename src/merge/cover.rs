//! 封面推断
//!
//! 包文档给出了封面时直接使用；否则只对固定版式的书籍，
//! 在第一个非导航页面引用的图片中挑选字节数最大的一张作为封面。

use crate::epub::config::ReassemblyConfig;
use crate::epub::opf::{CoverProvenance, PackageMetadata, RenditionLayout};
use crate::merge::paths;
use crate::merge::registry::FileRegistry;
use log::{debug, warn};
use once_cell::sync::Lazy;
use scraper::{Html, Selector};

static IMG_SRC: Lazy<Selector> =
    Lazy::new(|| Selector::parse("img[src]").expect("img选择器无效"));

/// 封面的最终决定
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverDecision {
    /// 封面图片在登记表中的路径
    pub path: Option<String>,
    pub provenance: CoverProvenance,
}

impl CoverDecision {
    pub fn none() -> Self {
        Self {
            path: None,
            provenance: CoverProvenance::None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.path.is_some()
    }
}

/// 在全部分片合并后决定封面
///
/// # 参数
/// * `metadata` - 第一个包文档提取出的元数据
/// * `layout` - 合并了渲染提示之后的版式
/// * `registry` - 最终的保留文件登记表
/// * `config` - 用于识别导航文档
pub fn resolve_cover(
    metadata: &PackageMetadata,
    layout: Option<RenditionLayout>,
    registry: &FileRegistry,
    config: &ReassemblyConfig,
) -> CoverDecision {
    if let Some(href) = &metadata.cover_href {
        return match registry.find_by_suffix(paths::logical_suffix(href)) {
            Some(file) => CoverDecision {
                path: Some(file.path.clone()),
                provenance: metadata
                    .cover_provenance
                    .unwrap_or(CoverProvenance::ExplicitMetadata),
            },
            None => {
                warn!("包文档中的封面 {} 没有对应的文件", href);
                CoverDecision::none()
            }
        };
    }

    if layout != Some(RenditionLayout::PrePaginated) {
        return CoverDecision::none();
    }

    match infer_largest_image(registry, config) {
        Some(path) => CoverDecision {
            path: Some(path),
            provenance: CoverProvenance::InferredLargestImage,
        },
        None => CoverDecision::none(),
    }
}

/// 第一个非导航页面中字节数最大的图片，大小相同时取先引用的
fn infer_largest_image(registry: &FileRegistry, config: &ReassemblyConfig) -> Option<String> {
    let page = registry
        .spine_order()
        .iter()
        .find(|path| !config.is_navigation_filename(paths::basename(path)))
        .and_then(|path| registry.get(path))?;

    let Ok(html) = std::str::from_utf8(&page.content) else {
        debug!("首页 {} 不是UTF-8，跳过封面推断", page.path);
        return None;
    };

    let page_dir = paths::parent_dir(&page.path);
    let mut best: Option<(&str, usize)> = None;

    for src in image_sources(html) {
        let resolved = paths::resolve(page_dir, &src);
        let Some(file) = registry.find_by_suffix(&resolved) else {
            debug!("图片引用 {} 没有对应的文件", src);
            continue;
        };
        let size = file.content.len();
        if size > best.map_or(0, |(_, best_size)| best_size) {
            best = Some((file.path.as_str(), size));
        }
    }

    best.map(|(path, _)| path.to_string())
}

/// 按文档顺序列出页面中所有 `<img src>`
pub fn image_sources(html: &str) -> Vec<String> {
    Html::parse_document(html)
        .select(&IMG_SRC)
        .filter_map(|element| element.value().attr("src"))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(images: &[&str]) -> Vec<u8> {
        let mut html = String::from("<?xml version=\"1.0\"?><html xmlns=\"http://www.w3.org/1999/xhtml\"><head></head><body>");
        for src in images {
            html.push_str(&format!("<img src=\"{}\"/>", src));
        }
        html.push_str("</body></html>");
        html.into_bytes()
    }

    fn registry_with(files: &[(&str, Vec<u8>)], pages: &[&str]) -> FileRegistry {
        let mut registry = FileRegistry::new();
        for (path, content) in files {
            registry.store(path, content.clone(), content.len() as u64);
        }
        for path in pages {
            registry.track_page(path, None);
        }
        registry
    }

    #[test]
    fn test_image_sources_in_document_order() {
        let html = String::from_utf8(page(&["a.jpg", "../b.png"])).unwrap();
        assert_eq!(image_sources(&html), vec!["a.jpg", "../b.png"]);
    }

    #[test]
    fn test_infers_largest_image_from_first_content_page() {
        let registry = registry_with(
            &[
                ("OEBPS/Text/nav.xhtml", page(&["../Images/huge.jpg"])),
                ("OEBPS/Text/page1.xhtml", page(&["../Images/small.jpg", "../Images/big.jpg", "missing.jpg"])),
                ("OEBPS/Images/small.jpg", vec![0; 10]),
                ("OEBPS/Images/big.jpg", vec![0; 500]),
                ("OEBPS/Images/huge.jpg", vec![0; 9000]),
            ],
            &["OEBPS/Text/nav.xhtml", "OEBPS/Text/page1.xhtml"],
        );

        let decision = resolve_cover(
            &PackageMetadata::new(),
            Some(RenditionLayout::PrePaginated),
            &registry,
            &ReassemblyConfig::default_config(),
        );
        assert_eq!(decision.path.as_deref(), Some("OEBPS/Images/big.jpg"));
        assert_eq!(decision.provenance, CoverProvenance::InferredLargestImage);
    }

    #[test]
    fn test_ties_keep_first_reference() {
        let registry = registry_with(
            &[
                ("p1.xhtml", page(&["b.jpg", "a.jpg"])),
                ("a.jpg", vec![1; 64]),
                ("b.jpg", vec![2; 64]),
            ],
            &["p1.xhtml"],
        );

        let decision = resolve_cover(
            &PackageMetadata::new(),
            Some(RenditionLayout::PrePaginated),
            &registry,
            &ReassemblyConfig::default_config(),
        );
        assert_eq!(decision.path.as_deref(), Some("b.jpg"));
    }

    #[test]
    fn test_no_inference_for_reflowable_books() {
        let registry = registry_with(
            &[("p1.xhtml", page(&["a.jpg"])), ("a.jpg", vec![1; 64])],
            &["p1.xhtml"],
        );

        let decision = resolve_cover(
            &PackageMetadata::new(),
            Some(RenditionLayout::Reflowable),
            &registry,
            &ReassemblyConfig::default_config(),
        );
        assert_eq!(decision, CoverDecision::none());
    }

    #[test]
    fn test_explicit_cover_takes_priority_over_inference() {
        let registry = registry_with(
            &[
                ("OEBPS/p1.xhtml", page(&["big.jpg"])),
                ("OEBPS/big.jpg", vec![1; 4096]),
                ("OEBPS/Images/cover.jpg", vec![1; 16]),
            ],
            &["OEBPS/p1.xhtml"],
        );
        let metadata = PackageMetadata {
            cover_href: Some("Images/cover.jpg".into()),
            cover_provenance: Some(CoverProvenance::CoverImageProperty),
            ..PackageMetadata::default()
        };

        let decision = resolve_cover(
            &metadata,
            Some(RenditionLayout::PrePaginated),
            &registry,
            &ReassemblyConfig::default_config(),
        );
        assert_eq!(decision.path.as_deref(), Some("OEBPS/Images/cover.jpg"));
        assert_eq!(decision.provenance, CoverProvenance::CoverImageProperty);
    }

    #[test]
    fn test_unmatched_explicit_cover_does_not_fall_back() {
        let registry = registry_with(
            &[("p1.xhtml", page(&["a.jpg"])), ("a.jpg", vec![1; 64])],
            &["p1.xhtml"],
        );
        let metadata = PackageMetadata {
            cover_href: Some("../Images/gone.jpg".into()),
            ..PackageMetadata::default()
        };

        let decision = resolve_cover(
            &metadata,
            Some(RenditionLayout::PrePaginated),
            &registry,
            &ReassemblyConfig::default_config(),
        );
        assert_eq!(decision, CoverDecision::none());
    }
}
