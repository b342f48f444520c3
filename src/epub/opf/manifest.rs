//! 清单模块
//!
//! 提供包文档清单项的结构定义，以及根据扩展名推断媒体类型。

use crate::merge::paths;

/// 清单项信息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestItem {
    /// 项目ID
    pub id: String,
    /// 文件路径(相对于包文档)
    pub href: String,
    /// 媒体类型
    pub media_type: String,
    /// 属性(如nav、cover-image等)，以空格分隔
    pub properties: Option<String>,
}

impl ManifestItem {
    /// 创建新的清单项
    pub fn new(id: String, href: String, media_type: String) -> Self {
        Self {
            id,
            href,
            media_type,
            properties: None,
        }
    }

    /// 检查是否包含指定属性
    pub fn has_property(&self, property: &str) -> bool {
        self.properties
            .as_deref()
            .is_some_and(|properties| properties.split_whitespace().any(|p| p == property))
    }

    /// 添加属性，已存在时不重复添加
    pub fn add_property(&mut self, property: &str) {
        if self.has_property(property) {
            return;
        }
        self.properties = Some(match self.properties.take().filter(|p| !p.trim().is_empty()) {
            Some(existing) => format!("{} {}", existing.trim(), property),
            None => property.to_string(),
        });
    }

    /// 检查是否为封面图片
    pub fn is_cover_image(&self) -> bool {
        self.has_property("cover-image")
    }
}

/// 根据文件扩展名推断媒体类型
pub fn media_type_for(path: &str) -> &'static str {
    let ext = paths::extension(path).map(|ext| ext.to_ascii_lowercase());
    match ext.as_deref() {
        Some("xhtml") | Some("html") | Some("htm") => "application/xhtml+xml",
        Some("css") => "text/css",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("svg") => "image/svg+xml",
        Some("ttf") => "font/ttf",
        Some("otf") => "font/otf",
        Some("woff") => "font/woff",
        Some("woff2") => "font/woff2",
        Some("js") => "application/javascript",
        Some("ncx") => "application/x-dtbncx+xml",
        Some("smil") => "application/smil+xml",
        Some("mp3") => "audio/mpeg",
        Some("mp4") | Some("m4a") => "audio/mp4",
        Some("xml") => "application/xml",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_property_does_not_duplicate() {
        let mut item = ManifestItem::new("c".into(), "cover.jpg".into(), "image/jpeg".into());
        item.add_property("cover-image");
        item.add_property("cover-image");
        assert_eq!(item.properties.as_deref(), Some("cover-image"));

        item.properties = Some("svg".into());
        item.add_property("cover-image");
        assert_eq!(item.properties.as_deref(), Some("svg cover-image"));
        assert!(item.is_cover_image());
    }

    #[test]
    fn test_media_type_for() {
        assert_eq!(media_type_for("Text/page1.XHTML"), "application/xhtml+xml");
        assert_eq!(media_type_for("Images/cover.jpeg"), "image/jpeg");
        assert_eq!(media_type_for("Fonts/serif.woff2"), "font/woff2");
        assert_eq!(media_type_for("blob"), "application/octet-stream");
    }
}
