//! 逻辑路径解析
//!
//! 分片内部路径与包文档中的href不保证拥有相同的根目录，
//! 所以这里的匹配全部基于后缀和文件名，是尽力而为的启发式规则。
//! 脊柱属性关联和封面图片定位都只通过本模块做路径比较。

/// 归档内路径的分类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathKind {
    /// 目录条目、mimetype、META-INF下的文件、NCX：不参与合并
    Excluded,
    /// 包文档（.opf），只用于提取元数据
    PackageDocument,
    /// 样式表，交给样式表合并器
    Stylesheet,
    /// 页面文档（xhtml/html/htm）
    Page,
    /// 其他资源（图片、字体等）
    Resource,
}

/// 保留的元数据容器目录前缀
const METADATA_PREFIX: &str = "META-INF/";

/// 对归档内的路径分类
pub fn classify(path: &str) -> PathKind {
    if path.ends_with('/') || path == "mimetype" || path.starts_with(METADATA_PREFIX) {
        return PathKind::Excluded;
    }
    match extension(path).map(|ext| ext.to_ascii_lowercase()).as_deref() {
        Some("opf") => PathKind::PackageDocument,
        Some("ncx") => PathKind::Excluded,
        Some("css") => PathKind::Stylesheet,
        Some("xhtml") | Some("html") | Some("htm") => PathKind::Page,
        _ => PathKind::Resource,
    }
}

/// 路径的文件名部分
pub fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// 路径的目录部分（不含结尾的`/`），位于根目录时为空串
pub fn parent_dir(path: &str) -> &str {
    match path.rfind('/') {
        Some(index) => &path[..index],
        None => "",
    }
}

/// 文件扩展名（不含`.`）
pub fn extension(path: &str) -> Option<&str> {
    let name = basename(path);
    match name.rfind('.') {
        Some(index) if index > 0 => Some(&name[index + 1..]),
        _ => None,
    }
}

/// 去掉`#`之后的片段标识符
pub fn strip_fragment(reference: &str) -> &str {
    reference.split('#').next().unwrap_or(reference)
}

/// 页面对应的样式表路径：同名，扩展名换成css
///
/// 例如 `OEBPS/page1.xhtml` 对应 `OEBPS/page1.css`
pub fn companion_stylesheet(page_path: &str) -> Option<String> {
    let ext = extension(page_path)?;
    let stem = &page_path[..page_path.len() - ext.len()];
    Some(format!("{}css", stem))
}

/// 把相对引用解析到基准目录下，并规范化`.`与`..`
pub fn resolve(base_dir: &str, reference: &str) -> String {
    let reference = strip_fragment(reference);
    if reference.starts_with('/') || base_dir.is_empty() {
        normalize(reference)
    } else {
        normalize(&format!("{}/{}", base_dir, reference))
    }
}

/// 规范化路径：折叠重复的`/`，移除`.`，消解`..`
///
/// 相对路径开头无法消解的`..`会被保留
pub fn normalize(path: &str) -> String {
    let absolute = path.starts_with('/');
    let mut segments: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => match segments.last() {
                Some(&last) if last != ".." => {
                    segments.pop();
                }
                _ if absolute => {}
                _ => segments.push(".."),
            },
            other => segments.push(other),
        }
    }

    let joined = segments.join("/");
    if absolute {
        format!("/{}", joined)
    } else {
        joined
    }
}

/// 去掉引用开头的`./`、`../`和`/`，得到可用于后缀匹配的部分
///
/// 包文档中的href相对于包文档本身，而分片内部路径从归档根目录开始
pub fn logical_suffix(reference: &str) -> &str {
    let mut rest = strip_fragment(reference);
    loop {
        if let Some(stripped) = rest.strip_prefix("../") {
            rest = stripped;
        } else if let Some(stripped) = rest.strip_prefix("./") {
            rest = stripped;
        } else if let Some(stripped) = rest.strip_prefix('/') {
            rest = stripped;
        } else {
            return rest;
        }
    }
}

/// 已存储路径是否以引用路径结尾（封面图片定位使用）
pub fn ends_with_reference(stored_path: &str, reference: &str) -> bool {
    !reference.is_empty() && stored_path.ends_with(reference)
}

/// 脊柱属性的href是否指向该存储路径
///
/// 存储路径以href结尾，或href以存储路径的文件名结尾，都视为匹配
pub fn matches_spine_href(stored_path: &str, href: &str) -> bool {
    let href = strip_fragment(href);
    if href.is_empty() {
        return false;
    }
    stored_path.ends_with(href) || href.ends_with(basename(stored_path))
}
