//! 拼装运行上下文
//!
//! `Reassembler` 持有一次拼装的全部状态：保留文件登记表、样式表累加器、
//! 包文档元数据。分片按到达顺序逐个合并，合并过程只在调用线程上进行。

use std::path::Path;

use log::{debug, info};

use crate::epub::config::ReassemblyConfig;
use crate::epub::error::Result;
use crate::epub::fragment::{Fragment, FragmentArchive};
use crate::epub::opf::{PackageMetadata, RenditionHints, RenditionLayout};
use crate::merge::cover::resolve_cover;
use crate::merge::fixed_layout;
use crate::merge::paths::{self, PathKind};
use crate::merge::registry::{Admission, FileRegistry};
use crate::merge::stylesheet::StylesheetAccumulator;
use crate::merge::toc::TocIndex;
use crate::package::synthesize::{MergeOutcome, SynthesizedPackage};

/// 进度回调，参数为本次完成的分片所占的比例
pub type ProgressCallback = Box<dyn FnMut(f64)>;

struct Progress {
    increment: f64,
    callback: ProgressCallback,
}

/// 一次拼装的运行上下文
pub struct Reassembler {
    registry: FileRegistry,
    stylesheets: StylesheetAccumulator,
    metadata: PackageMetadata,
    package_found: bool,
    toc: TocIndex,
    hints: RenditionHints,
    config: ReassemblyConfig,
    progress: Option<Progress>,
    fragments_merged: usize,
}

impl Reassembler {
    /// 创建新的拼装上下文
    ///
    /// # 参数
    /// * `toc` - 获取端提供的目录索引
    /// * `hints` - 包文档之外的渲染提示
    pub fn new(toc: TocIndex, hints: RenditionHints) -> Self {
        Self {
            registry: FileRegistry::new(),
            stylesheets: StylesheetAccumulator::new(),
            metadata: PackageMetadata::new(),
            package_found: false,
            toc,
            hints,
            config: ReassemblyConfig::default_config(),
            progress: None,
            fragments_merged: 0,
        }
    }

    pub fn with_config(mut self, config: ReassemblyConfig) -> Self {
        self.config = config;
        self
    }

    /// 设置进度回调，每合并完一个分片调用一次，参数为 1/total
    pub fn with_progress<F>(mut self, total: usize, callback: F) -> Self
    where
        F: FnMut(f64) + 'static,
    {
        self.progress = Some(Progress {
            increment: 1.0 / total.max(1) as f64,
            callback: Box::new(callback),
        });
        self
    }

    /// 合并一个已解密的分片（内存中的字节）
    pub fn push_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        let fragment = Fragment::from_bytes(bytes)?;
        self.push_fragment(fragment)
    }

    /// 合并磁盘上的一个已解密分片
    pub fn push_path<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let fragment = Fragment::from_path(path)?;
        self.push_fragment(fragment)
    }

    /// 合并后无论成功与否都删除工作副本
    fn push_fragment(&mut self, mut fragment: Fragment) -> Result<()> {
        let merged = self.merge_fragment(&mut fragment);
        let closed = fragment.close();
        merged?;
        closed
    }

    /// 合并一个分片
    ///
    /// 顺序固定：先提取包文档元数据（整个运行只做一次），再合并样式表，
    /// 最后按大小规则登记页面和其他资源
    pub fn merge_fragment<F: FragmentArchive + ?Sized>(&mut self, fragment: &mut F) -> Result<()> {
        let listing = fragment.paths()?;
        info!("合并第 {} 个分片: {} 个条目", self.fragments_merged + 1, listing.len());

        if !self.package_found {
            if let Some(opf_path) = fragment.package_document(&listing) {
                let content = fragment.read(&opf_path)?;
                let (metadata, recovered) = PackageMetadata::extract(&content);
                if !recovered {
                    debug!("包文档 {} 中没有可用的元数据", opf_path);
                }
                self.metadata.absorb(metadata);
                self.package_found = true;
            }
        }

        for path in listing.iter().filter(|path| paths::classify(path) == PathKind::Stylesheet) {
            let content = fragment.read(path)?;
            self.stylesheets.merge(path, &content);
        }

        let pre_paginated = self.layout() == Some(RenditionLayout::PrePaginated);

        for path in &listing {
            let is_page = match paths::classify(path) {
                PathKind::Page => true,
                PathKind::Resource => false,
                _ => continue,
            };

            let size = fragment.size(path)?;
            if self.registry.decide(path, size) == Admission::Kept {
                debug!("跳过 {}: {} 字节不大于已保存的版本", path, size);
                continue;
            }

            let mut content = fragment.read(path)?;
            if is_page && pre_paginated {
                content = self.repair_page(path, content);
            }

            let admission = self.registry.store(path, content, size);
            if is_page && admission == Admission::Inserted {
                self.registry.track_page(path, self.toc.title_for(path));
            }
        }

        self.fragments_merged += 1;
        if let Some(progress) = self.progress.as_mut() {
            (progress.callback)(progress.increment);
        }
        Ok(())
    }

    /// 用配套样式表修复固定版式页面，没有样式表时原样返回
    fn repair_page(&self, page_path: &str, content: Vec<u8>) -> Vec<u8> {
        let Some(css) = paths::companion_stylesheet(page_path)
            .and_then(|css_path| self.stylesheets.get(&css_path))
        else {
            return content;
        };

        let repaired = match fixed_layout::repair_page(&content, css) {
            std::borrow::Cow::Owned(repaired) => Some(repaired),
            std::borrow::Cow::Borrowed(_) => None,
        };
        if repaired.is_some() {
            debug!("修复固定版式页面 {}", page_path);
        }
        repaired.unwrap_or(content)
    }

    /// 当前的渲染版式：包文档优先，其次是渲染提示
    pub fn layout(&self) -> Option<RenditionLayout> {
        self.metadata.rendition_layout.or(self.hints.layout)
    }

    pub fn metadata(&self) -> &PackageMetadata {
        &self.metadata
    }

    pub fn registry(&self) -> &FileRegistry {
        &self.registry
    }

    pub fn stylesheets(&self) -> &StylesheetAccumulator {
        &self.stylesheets
    }

    pub fn fragments_merged(&self) -> usize {
        self.fragments_merged
    }

    /// 结束拼装：决定封面并合成最终的包
    pub fn finish(self) -> SynthesizedPackage {
        if self.fragments_merged == 0 {
            info!("没有合并任何分片，输出空包");
            return SynthesizedPackage::empty();
        }

        let layout = self.layout();
        let cover = resolve_cover(&self.metadata, layout, &self.registry, &self.config);

        SynthesizedPackage::assemble(
            MergeOutcome {
                registry: self.registry,
                stylesheets: self.stylesheets.into_stylesheets(),
                metadata: self.metadata,
                hints: self.hints,
                cover,
            },
            &self.config,
        )
    }
}

/// 依次合并内存中的全部分片并合成包
///
/// 没有分片时返回空包，不是错误
pub fn reassemble<I, B>(fragments: I, toc: TocIndex, hints: RenditionHints) -> Result<SynthesizedPackage>
where
    I: IntoIterator<Item = B>,
    B: AsRef<[u8]>,
{
    let mut reassembler = Reassembler::new(toc, hints);
    for fragment in fragments {
        reassembler.push_bytes(fragment.as_ref())?;
    }
    Ok(reassembler.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::epub::fragment::fragment_bytes;
    use crate::epub::opf::CoverProvenance;
    use std::cell::RefCell;
    use std::rc::Rc;

    const FIXED_LAYOUT_OPF: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" version="3.0">
  <metadata>
    <meta property="rendition:layout">pre-paginated</meta>
  </metadata>
  <manifest>
    <item id="p1" href="page1.xhtml" media-type="application/xhtml+xml"/>
  </manifest>
  <spine>
    <itemref idref="p1" properties="page-spread-right"/>
  </spine>
</package>"#;

    fn padded_page(len: usize) -> Vec<u8> {
        let mut page = b"<html><head></head><body><div style=\"width:px; height:px;\"></div></body></html>".to_vec();
        assert!(page.len() <= len);
        page.resize(len, b' ');
        page
    }

    #[test]
    fn test_metadata_is_taken_from_first_package_only() {
        let first = fragment_bytes(&[("OEBPS/content.opf", FIXED_LAYOUT_OPF.as_bytes())]);
        let reflowable = FIXED_LAYOUT_OPF.replace("pre-paginated", "reflowable");
        let second = fragment_bytes(&[("OEBPS/content.opf", reflowable.as_bytes())]);

        let mut reassembler = Reassembler::new(TocIndex::new(), RenditionHints::default());
        reassembler.push_bytes(&first).unwrap();
        reassembler.push_bytes(&second).unwrap();

        assert_eq!(reassembler.layout(), Some(RenditionLayout::PrePaginated));
        assert_eq!(reassembler.metadata().spine_properties.len(), 1);
    }

    #[test]
    fn test_size_wins_and_page_is_repaired() {
        let fragments = [
            fragment_bytes(&[
                ("OEBPS/content.opf", FIXED_LAYOUT_OPF.as_bytes()),
                ("OEBPS/page1.xhtml", b""),
                ("OEBPS/page1.css", b"body{width:600px;height:800px;}"),
            ]),
            fragment_bytes(&[
                ("OEBPS/page1.xhtml", &padded_page(120)),
                ("OEBPS/page1.css", b"body{width:600px;height:800px;color:red;}"),
            ]),
            fragment_bytes(&[("OEBPS/page1.xhtml", &padded_page(100)[..45])]),
        ];

        let mut reassembler = Reassembler::new(TocIndex::new(), RenditionHints::default());
        for fragment in &fragments {
            reassembler.push_bytes(fragment).unwrap();
        }

        let kept = reassembler.registry().get("OEBPS/page1.xhtml").unwrap();
        assert_eq!(kept.size, 120);
        let html = String::from_utf8(kept.content.clone()).unwrap();
        assert!(html.contains("content=\"width=600, height=800\""));
        assert!(html.contains("style=\"width:600px; height:800px;\""));
        assert_eq!(
            reassembler.stylesheets().get("OEBPS/page1.css"),
            Some(&b"body{width:600px;height:800px;color:red;}"[..])
        );
    }

    #[test]
    fn test_reflowable_pages_are_not_repaired() {
        let page = padded_page(90);
        let fragment = fragment_bytes(&[
            ("page1.css", b"body{width:600px;height:800px;}"),
            ("page1.xhtml", &page),
        ]);

        let mut reassembler = Reassembler::new(TocIndex::new(), RenditionHints::default());
        reassembler.push_bytes(&fragment).unwrap();
        assert_eq!(reassembler.registry().get("page1.xhtml").unwrap().content, page);
    }

    #[test]
    fn test_excluded_paths_are_not_stored() {
        let fragment = fragment_bytes(&[
            ("mimetype", b"application/epub+zip"),
            ("META-INF/container.xml", b"<container/>"),
            ("OEBPS/", b""),
            ("OEBPS/content.opf", b"<package/>"),
            ("OEBPS/toc.ncx", b"<ncx/>"),
            ("OEBPS/style.css", b"p{margin:0}"),
            ("OEBPS/Images/p1.jpg", b"jpg"),
        ]);

        let mut reassembler = Reassembler::new(TocIndex::new(), RenditionHints::default());
        reassembler.push_bytes(&fragment).unwrap();

        let stored: Vec<&str> = reassembler.registry().iter().map(|file| file.path.as_str()).collect();
        assert_eq!(stored, vec!["OEBPS/Images/p1.jpg"]);
        assert_eq!(reassembler.stylesheets().len(), 1);
    }

    #[test]
    fn test_same_fragment_twice_is_idempotent() {
        let fragment = fragment_bytes(&[
            ("a.xhtml", b"<html>a</html>"),
            ("b.xhtml", b""),
            ("s.css", b"p{margin:0}\nbody{color:red}"),
        ]);

        let mut once = Reassembler::new(TocIndex::new(), RenditionHints::default());
        once.push_bytes(&fragment).unwrap();
        let mut twice = Reassembler::new(TocIndex::new(), RenditionHints::default());
        twice.push_bytes(&fragment).unwrap();
        twice.push_bytes(&fragment).unwrap();

        let files = |r: &Reassembler| r.registry().iter().cloned().collect::<Vec<_>>();
        assert_eq!(files(&once), files(&twice));
        assert_eq!(once.registry().spine_order(), twice.registry().spine_order());
        assert_eq!(once.stylesheets().get("s.css"), twice.stylesheets().get("s.css"));
    }

    #[test]
    fn test_toc_title_recorded_on_insertion() {
        let toc: TocIndex = [("Text/chapter1.xhtml#start", "第一章")].into_iter().collect();
        let fragment = fragment_bytes(&[
            ("OEBPS/Text/chapter1.xhtml", b"<html/>"),
            ("OEBPS/Text/chapter2.xhtml", b"<html/>"),
        ]);

        let mut reassembler = Reassembler::new(toc, RenditionHints::default());
        reassembler.push_bytes(&fragment).unwrap();

        let registry = reassembler.registry();
        assert_eq!(registry.toc_title("OEBPS/Text/chapter1.xhtml"), Some("第一章"));
        assert_eq!(registry.toc_title("OEBPS/Text/chapter2.xhtml"), None);
    }

    #[test]
    fn test_progress_reports_fraction_per_fragment() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);

        let mut reassembler = Reassembler::new(TocIndex::new(), RenditionHints::default())
            .with_progress(4, move |fraction| sink.borrow_mut().push(fraction));
        for _ in 0..2 {
            reassembler.push_bytes(&fragment_bytes(&[("a.jpg", b"a")])).unwrap();
        }

        assert_eq!(*seen.borrow(), vec![0.25, 0.25]);
    }

    #[test]
    fn test_invalid_fragment_fails_without_progress() {
        let seen = Rc::new(RefCell::new(0));
        let sink = Rc::clone(&seen);

        let mut reassembler = Reassembler::new(TocIndex::new(), RenditionHints::default())
            .with_progress(1, move |_| *sink.borrow_mut() += 1);
        assert!(reassembler.push_bytes(b"not a zip").is_err());
        assert_eq!(*seen.borrow(), 0);
        assert_eq!(reassembler.fragments_merged(), 0);
    }

    #[test]
    fn test_hint_enables_cover_inference() {
        let page = b"<html><head></head><body><img src=\"../Images/p1.jpg\"/></body></html>";
        let fragment = fragment_bytes(&[
            ("OEBPS/Text/page1.xhtml", page),
            ("OEBPS/Images/p1.jpg", &[7u8; 300]),
        ]);

        let package = reassemble([fragment], TocIndex::new(), RenditionHints::pre_paginated()).unwrap();
        assert_eq!(package.cover.path.as_deref(), Some("OEBPS/Images/p1.jpg"));
        assert_eq!(package.cover.provenance, CoverProvenance::InferredLargestImage);
    }

    #[test]
    fn test_zero_fragments_is_empty_package() {
        let package = reassemble(Vec::<Vec<u8>>::new(), TocIndex::new(), RenditionHints::default()).unwrap();
        assert!(package.is_empty());
        assert_eq!(package.rendition.layout, None);
    }
}
