//! 外部提供的目录索引
//!
//! 目录索引只用来判断哪些页面进入导航文档，拼装过程从不修改它。

use crate::epub::error::{Result, StitchError};
use crate::merge::paths;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// 目录条目：页面引用（可带`#`片段）和显示标题
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TocEntry {
    pub href: String,
    pub title: String,
}

/// 目录索引，保持提供时的顺序
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TocIndex {
    entries: Vec<TocEntry>,
}

impl TocIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加一个条目
    pub fn push(&mut self, href: impl Into<String>, title: impl Into<String>) {
        self.entries.push(TocEntry {
            href: href.into(),
            title: title.into(),
        });
    }

    /// 从YAML文件加载目录索引
    ///
    /// 文件内容为 `{href, title}` 列表
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .map_err(|e| StitchError::TocError(format!("无法读取目录文件: {}", e)))?;

        serde_yml::from_str(&content)
            .map_err(|e| StitchError::TocError(format!("目录文件格式错误: {}", e)))
    }

    pub fn entries(&self) -> &[TocEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 查找页面的目录标题
    ///
    /// 页面的文件名与条目路径部分（`#`之前）的文件名完全相同即视为匹配，
    /// 多个条目匹配时取第一个
    pub fn title_for(&self, page_path: &str) -> Option<&str> {
        let filename = paths::basename(page_path);
        self.entries
            .iter()
            .find(|entry| paths::basename(paths::strip_fragment(&entry.href)) == filename)
            .map(|entry| entry.title.as_str())
    }
}

impl<H: Into<String>, T: Into<String>> FromIterator<(H, T)> for TocIndex {
    fn from_iter<I: IntoIterator<Item = (H, T)>>(iter: I) -> Self {
        let mut index = TocIndex::new();
        for (href, title) in iter {
            index.push(href, title);
        }
        index
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_title_for_matches_basename_before_fragment() {
        let toc: TocIndex = [
            ("page1.xhtml#start", "第一章"),
            ("Text/page3.xhtml", "第二章"),
            ("page1.xhtml#later", "重复条目"),
        ]
        .into_iter()
        .collect();

        assert_eq!(toc.title_for("OEBPS/Text/page1.xhtml"), Some("第一章"));
        assert_eq!(toc.title_for("OEBPS/page3.xhtml"), Some("第二章"));
        assert_eq!(toc.title_for("OEBPS/page2.xhtml"), None);
        assert_eq!(toc.title_for("OEBPS/xpage1.xhtml"), None);
    }

    #[test]
    fn test_from_yaml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("toc.yaml");
        fs::write(
            &path,
            "- href: page1.xhtml\n  title: Opening\n- href: page4.xhtml#s2\n  title: Middle\n",
        )
        .unwrap();

        let toc = TocIndex::from_yaml_file(&path).unwrap();
        assert_eq!(toc.entries().len(), 2);
        assert_eq!(toc.title_for("x/page4.xhtml"), Some("Middle"));
    }

    #[test]
    fn test_bad_yaml_is_toc_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("toc.yaml");
        fs::write(&path, "href: [unterminated\n").unwrap();

        assert!(matches!(TocIndex::from_yaml_file(&path), Err(StitchError::TocError(_))));
    }
}
