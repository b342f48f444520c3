//! 固定版式页面修复
//!
//! 从配套样式表的body规则中取出像素宽高，为页面补上viewport，
//! 并修复上游生成的 `style="width:px; height:px;"` 残缺内联样式。
//! 修复是幂等的，对同一页面重复执行不会改变结果。

use once_cell::sync::Lazy;
use regex::Regex;
use std::borrow::Cow;

static BODY_WIDTH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"body\s*\{[^}]*width:\s*(\d+)px").expect("宽度正则表达式无效"));

static BODY_HEIGHT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"body\s*\{[^}]*height:\s*(\d+)px").expect("高度正则表达式无效"));

static HEAD_OPEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<head(?:\s[^>]*)?>").expect("head正则表达式无效"));

static BROKEN_SIZE_STYLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"style="width:px;\s*height:px;""#).expect("内联样式正则表达式无效")
});

/// 页面的像素尺寸
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageDimensions {
    pub width: u32,
    pub height: u32,
}

impl PageDimensions {
    /// 从样式表的body规则中读取宽高，任一缺失时返回 `None`
    pub fn from_stylesheet(css: &str) -> Option<Self> {
        let width = BODY_WIDTH.captures(css)?[1].parse().ok()?;
        let height = BODY_HEIGHT.captures(css)?[1].parse().ok()?;
        Some(Self { width, height })
    }

    fn viewport_tag(&self) -> String {
        format!(
            "<meta name=\"viewport\" content=\"width={}, height={}\"/>",
            self.width, self.height
        )
    }

    fn inline_style(&self) -> String {
        format!(
            "style=\"width:{}px; height:{}px;\"",
            self.width, self.height
        )
    }
}

/// 用配套样式表修复固定版式页面
///
/// 页面或样式表不是UTF-8、样式表中找不到body宽高时，原样返回页面
pub fn repair_page<'a>(page: &'a [u8], stylesheet: &[u8]) -> Cow<'a, [u8]> {
    let (Ok(html), Ok(css)) = (std::str::from_utf8(page), std::str::from_utf8(stylesheet)) else {
        return Cow::Borrowed(page);
    };
    let Some(dimensions) = PageDimensions::from_stylesheet(css) else {
        return Cow::Borrowed(page);
    };

    let mut repaired = Cow::Borrowed(html);

    if !repaired.contains("name=\"viewport\"") {
        if let Some(head) = HEAD_OPEN.find(&repaired) {
            let mut inserted = String::with_capacity(repaired.len() + 64);
            inserted.push_str(&repaired[..head.end()]);
            inserted.push_str("\n    ");
            inserted.push_str(&dimensions.viewport_tag());
            inserted.push_str(&repaired[head.end()..]);
            repaired = Cow::Owned(inserted);
        }
    }

    if BROKEN_SIZE_STYLE.is_match(&repaired) {
        let style = dimensions.inline_style();
        let fixed = BROKEN_SIZE_STYLE
            .replace_all(&repaired, regex::NoExpand(&style))
            .into_owned();
        repaired = Cow::Owned(fixed);
    }

    match repaired {
        Cow::Borrowed(_) => Cow::Borrowed(page),
        Cow::Owned(text) => Cow::Owned(text.into_bytes()),
    }
}
