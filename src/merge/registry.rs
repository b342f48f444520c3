//! 保留文件登记表
//!
//! 同一路径在多个分片中出现时，只有严格更大的内容才会替换已保存的版本。
//! 上游服务会先发零字节占位文件，稍后的分片再补全，所以非空版本总是胜过空版本；
//! 长度相同时保留先到的版本。

use crate::merge::paths;
use log::debug;
use std::collections::HashMap;

/// 被保留的文件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeptFile {
    pub path: String,
    /// 最终内容（页面可能已经过固定版式修复）
    pub content: Vec<u8>,
    /// 分片中原始内容的字节数，用于和后续版本比较
    pub size: u64,
}

/// 登记表对一个候选版本的处理结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// 第一次见到该路径
    Inserted,
    /// 新版本更大，替换了旧版本
    Replaced,
    /// 保留旧版本
    Kept,
}

/// 路径到保留文件的登记表，保持首次插入顺序
#[derive(Debug, Clone, Default)]
pub struct FileRegistry {
    files: Vec<KeptFile>,
    index: HashMap<String, usize>,
    /// 页面文档的首次插入顺序
    spine: Vec<String>,
    /// 在目录索引中出现的页面及其标题
    toc_titles: HashMap<String, String>,
}

impl FileRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 判断一个给定大小的候选版本会被如何处理，不修改登记表
    pub fn decide(&self, path: &str, size: u64) -> Admission {
        match self.index.get(path) {
            None => Admission::Inserted,
            Some(&i) if size > self.files[i].size => Admission::Replaced,
            Some(_) => Admission::Kept,
        }
    }

    /// 提交一个候选版本
    pub fn store(&mut self, path: &str, content: Vec<u8>, size: u64) -> Admission {
        let admission = self.decide(path, size);
        match admission {
            Admission::Inserted => {
                self.index.insert(path.to_string(), self.files.len());
                self.files.push(KeptFile {
                    path: path.to_string(),
                    content,
                    size,
                });
            }
            Admission::Replaced => {
                let kept = &mut self.files[self.index[path]];
                debug!("替换 {}: {} -> {} 字节", path, kept.size, size);
                kept.content = content;
                kept.size = size;
            }
            Admission::Kept => {}
        }
        admission
    }

    /// 记录新插入的页面文档，以及它的目录标题
    pub fn track_page(&mut self, path: &str, toc_title: Option<&str>) {
        if self.spine.iter().any(|existing| existing == path) {
            return;
        }
        self.spine.push(path.to_string());
        if let Some(title) = toc_title {
            self.toc_titles.insert(path.to_string(), title.to_string());
        }
    }

    pub fn get(&self, path: &str) -> Option<&KeptFile> {
        self.index.get(path).map(|&i| &self.files[i])
    }

    /// 第一个路径以引用结尾的文件
    pub fn find_by_suffix(&self, reference: &str) -> Option<&KeptFile> {
        self.files
            .iter()
            .find(|file| paths::ends_with_reference(&file.path, reference))
    }

    pub fn iter(&self) -> impl Iterator<Item = &KeptFile> {
        self.files.iter()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// 页面文档的首次插入顺序
    pub fn spine_order(&self) -> &[String] {
        &self.spine
    }

    /// 页面在目录索引中的标题
    pub fn toc_title(&self, path: &str) -> Option<&str> {
        self.toc_titles.get(path).map(String::as_str)
    }

    /// 拆解为文件列表，供合成使用
    pub fn into_files(self) -> Vec<KeptFile> {
        self.files
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_larger_replaces_smaller_keeps() {
        let mut registry = FileRegistry::new();
        assert_eq!(registry.store("a.xhtml", vec![], 0), Admission::Inserted);
        assert_eq!(registry.store("a.xhtml", vec![1; 120], 120), Admission::Replaced);
        assert_eq!(registry.store("a.xhtml", vec![2; 45], 45), Admission::Kept);
        assert_eq!(registry.store("a.xhtml", vec![3; 120], 120), Admission::Kept);

        let kept = registry.get("a.xhtml").unwrap();
        assert_eq!(kept.size, 120);
        assert_eq!(kept.content, vec![1; 120]);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_track_page_is_first_insertion_order() {
        let mut registry = FileRegistry::new();
        registry.track_page("p2.xhtml", None);
        registry.track_page("p1.xhtml", Some("第一章"));
        registry.track_page("p2.xhtml", Some("ignored"));

        assert_eq!(registry.spine_order(), ["p2.xhtml", "p1.xhtml"]);
        assert_eq!(registry.toc_title("p1.xhtml"), Some("第一章"));
        assert_eq!(registry.toc_title("p2.xhtml"), None);
    }

    #[test]
    fn test_find_by_suffix_returns_first_match() {
        let mut registry = FileRegistry::new();
        registry.store("A/Images/p1.jpg", vec![1], 1);
        registry.store("B/Images/p1.jpg", vec![1, 2], 2);

        assert_eq!(registry.find_by_suffix("Images/p1.jpg").unwrap().path, "A/Images/p1.jpg");
        assert!(registry.find_by_suffix("Images/p2.jpg").is_none());
    }

    fn snapshot(registry: &FileRegistry) -> Vec<KeptFile> {
        registry.iter().cloned().collect()
    }

    proptest! {
        #[test]
        fn prop_storing_same_batch_twice_is_idempotent(
            batch in prop::collection::vec(("[a-c]\\.xhtml", prop::collection::vec(any::<u8>(), 0..8)), 0..12)
        ) {
            let mut once = FileRegistry::new();
            for (path, content) in &batch {
                once.store(path, content.clone(), content.len() as u64);
            }
            let mut twice = once.clone();
            for (path, content) in &batch {
                twice.store(path, content.clone(), content.len() as u64);
            }
            prop_assert_eq!(snapshot(&once), snapshot(&twice));
        }

        #[test]
        fn prop_non_empty_beats_empty_in_either_order(
            content in prop::collection::vec(any::<u8>(), 1..64),
            empty_first in any::<bool>()
        ) {
            let mut registry = FileRegistry::new();
            let versions = if empty_first {
                [Vec::new(), content.clone()]
            } else {
                [content.clone(), Vec::new()]
            };
            for version in versions {
                let size = version.len() as u64;
                registry.store("page1.xhtml", version, size);
            }
            prop_assert_eq!(&registry.get("page1.xhtml").unwrap().content, &content);
        }
    }
}
