//! 导航地图
//!
//! 目录索引只有一层，所以导航点没有子节点。

use quick_xml::escape::escape;

/// NCX文档的命名空间
pub const NCX_NAMESPACE: &str = "http://www.daisy.org/z3986/2005/ncx/";

/// 导航点
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavPoint {
    /// 唯一标识符
    pub id: String,
    /// 播放顺序，从1开始
    pub play_order: u32,
    /// 显示标题
    pub label: String,
    /// 指向的页面，相对于导航文档
    pub src: String,
}

/// 导航地图
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NavMap {
    /// 书名，写入NCX的docTitle和导航文档的title
    pub doc_title: String,
    /// 与包文档dc:identifier一致的uid
    pub uid: String,
    pub nav_points: Vec<NavPoint>,
}

impl NavMap {
    pub fn new(doc_title: impl Into<String>, uid: impl Into<String>) -> Self {
        Self {
            doc_title: doc_title.into(),
            uid: uid.into(),
            nav_points: Vec::new(),
        }
    }

    /// 按顺序追加一个导航点，ID和播放顺序自动编号
    pub fn push(&mut self, label: impl Into<String>, src: impl Into<String>) {
        let play_order = self.nav_points.len() as u32 + 1;
        self.nav_points.push(NavPoint {
            id: format!("navPoint-{}", play_order),
            play_order,
            label: label.into(),
            src: src.into(),
        });
    }

    pub fn len(&self) -> usize {
        self.nav_points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nav_points.is_empty()
    }

    /// 序列化为NCX文档
    pub fn to_ncx(&self) -> String {
        let mut ncx = String::new();
        ncx.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        ncx.push_str(&format!(
            "<ncx xmlns=\"{}\" version=\"2005-1\">\n  <head>\n",
            NCX_NAMESPACE
        ));
        ncx.push_str(&format!(
            "    <meta name=\"dtb:uid\" content=\"{}\"/>\n",
            escape(self.uid.as_str())
        ));
        ncx.push_str(&format!(
            "    <meta name=\"dtb:depth\" content=\"{}\"/>\n",
            if self.nav_points.is_empty() { 0 } else { 1 }
        ));
        ncx.push_str("    <meta name=\"dtb:totalPageCount\" content=\"0\"/>\n");
        ncx.push_str("    <meta name=\"dtb:maxPageNumber\" content=\"0\"/>\n");
        ncx.push_str("  </head>\n");
        ncx.push_str(&format!(
            "  <docTitle>\n    <text>{}</text>\n  </docTitle>\n",
            escape(self.doc_title.as_str())
        ));
        ncx.push_str("  <navMap>\n");
        for point in &self.nav_points {
            ncx.push_str(&format!(
                "    <navPoint id=\"{}\" playOrder=\"{}\">\n      <navLabel>\n        <text>{}</text>\n      </navLabel>\n      <content src=\"{}\"/>\n    </navPoint>\n",
                escape(point.id.as_str()),
                point.play_order,
                escape(point.label.as_str()),
                escape(point.src.as_str()),
            ));
        }
        ncx.push_str("  </navMap>\n</ncx>\n");
        ncx
    }

    /// 序列化为EPUB 3的XHTML导航文档
    pub fn to_nav_xhtml(&self, language: &str) -> String {
        let mut nav = String::new();
        nav.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<!DOCTYPE html>\n");
        nav.push_str(&format!(
            "<html xmlns=\"http://www.w3.org/1999/xhtml\" xmlns:epub=\"http://www.idpf.org/2007/ops\" xml:lang=\"{0}\" lang=\"{0}\">\n",
            escape(language)
        ));
        nav.push_str(&format!(
            "<head>\n  <title>{}</title>\n</head>\n<body>\n",
            escape(self.doc_title.as_str())
        ));
        nav.push_str("  <nav epub:type=\"toc\" id=\"toc\">\n    <ol>\n");
        for point in &self.nav_points {
            nav.push_str(&format!(
                "      <li><a href=\"{}\">{}</a></li>\n",
                escape(point.src.as_str()),
                escape(point.label.as_str()),
            ));
        }
        nav.push_str("    </ol>\n  </nav>\n</body>\n</html>\n");
        nav
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> NavMap {
        let mut map = NavMap::new("书 & 名", "urn:test:1");
        map.push("第一章", "Text/chapter1.xhtml");
        map.push("A < B", "Text/chapter2.xhtml#s1");
        map
    }

    #[test]
    fn test_push_numbers_points() {
        let map = sample();
        assert_eq!(map.len(), 2);
        assert_eq!(map.nav_points[1].id, "navPoint-2");
        assert_eq!(map.nav_points[1].play_order, 2);
    }

    #[test]
    fn test_ncx_output() {
        let ncx = sample().to_ncx();
        assert!(ncx.contains("<meta name=\"dtb:uid\" content=\"urn:test:1\"/>"));
        assert!(ncx.contains("<text>书 &amp; 名</text>"));
        assert!(ncx.contains("<navPoint id=\"navPoint-1\" playOrder=\"1\">"));
        assert!(ncx.contains("<text>A &lt; B</text>"));
        assert!(ncx.contains("<content src=\"Text/chapter2.xhtml#s1\"/>"));
    }

    #[test]
    fn test_nav_xhtml_output() {
        let nav = sample().to_nav_xhtml("zh");
        assert!(nav.contains("xml:lang=\"zh\""));
        assert!(nav.contains("<nav epub:type=\"toc\" id=\"toc\">"));
        assert!(nav.contains("<li><a href=\"Text/chapter1.xhtml\">第一章</a></li>"));
    }

    #[test]
    fn test_empty_map_has_zero_depth() {
        let map = NavMap::new("t", "u");
        let ncx = map.to_ncx();
        assert!(ncx.contains("<meta name=\"dtb:depth\" content=\"0\"/>"));
        assert!(ncx.contains("<navMap>\n  </navMap>"));
    }
}
