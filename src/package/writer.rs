//! 默认打包端
//!
//! 把 [`SynthesizedPackage`] 写成EPUB 3容器：mimetype、container.xml、
//! 包文档、NCX、导航文档，以及全部保留文件和样式表。

use std::collections::hash_map::DefaultHasher;
use std::fs::File;
use std::hash::{Hash, Hasher};
use std::io::{Seek, Write};
use std::path::Path;

use chrono::{SecondsFormat, Utc};
use log::info;
use quick_xml::escape::escape;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::epub::config::ReassemblyConfig;
use crate::epub::container::{CONTAINER_PATH, Container};
use crate::epub::error::Result;
use crate::epub::ncx::NavMap;
use crate::epub::opf::{OPF_NAMESPACE, media_type_for};
use crate::package::synthesize::{NAV_ID, NCX_ID, SynthesizedPackage};

/// 包文档在package_directory中的文件名
pub const PACKAGE_DOCUMENT: &str = "content.opf";

const MIMETYPE: &[u8] = b"application/epub+zip";

/// 获取端在包文档之外提供的书籍描述
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookDescriptor {
    pub title: String,
    pub authors: Vec<String>,
    /// 未提供时使用配置中的语言
    pub language: Option<String>,
    /// 未提供时优先使用ISBN，否则由书名和作者派生
    pub identifier: Option<String>,
    /// dcterms:modified，形如 `2024-01-01T00:00:00Z`，未提供时使用写入时间
    pub modified: Option<String>,
    pub description: Option<String>,
    pub publisher: Option<String>,
    /// 写成带 `opf:scheme="ISBN"` 的dc:identifier
    pub isbn: Option<String>,
    /// 发行日期，写入dc:date
    pub release_date: Option<String>,
    /// 原书名，作为第二个dc:title并标注title-type
    pub original_title: Option<String>,
    pub translators: Vec<String>,
    /// 分类，写成第一个dc:subject
    pub category: Option<String>,
    pub tags: Vec<String>,
    /// 写成Calibre的series元数据
    pub series: Option<String>,
    pub series_index: Option<u32>,
}

impl BookDescriptor {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.authors.push(author.into());
        self
    }

    /// 写入dc:identifier和NCX dtb:uid的值
    pub fn identifier(&self) -> String {
        if let Some(identifier) = &self.identifier {
            return identifier.clone();
        }
        if let Some(isbn) = &self.isbn {
            return format!("urn:isbn:{}", isbn);
        }
        let mut hasher = DefaultHasher::new();
        self.title.hash(&mut hasher);
        self.authors.hash(&mut hasher);
        format!("urn:bookstitch:{:016x}", hasher.finish())
    }
}

/// 把合成好的包序列化为容器的打包端
pub trait PackageWriter {
    fn write_package(&mut self, package: &SynthesizedPackage, book: &BookDescriptor) -> Result<()>;
}

/// 写入ZIP容器的打包端
pub struct ZipPackageWriter<W: Write + Seek> {
    zip: ZipWriter<W>,
    config: ReassemblyConfig,
}

impl<W: Write + Seek> ZipPackageWriter<W> {
    pub fn new(writer: W, config: ReassemblyConfig) -> Self {
        Self {
            zip: ZipWriter::new(writer),
            config,
        }
    }

    /// 写完中央目录并取回底层写入器
    pub fn finish(self) -> Result<W> {
        Ok(self.zip.finish()?)
    }

    fn entry_path(&self, href: &str) -> String {
        if self.config.package_directory.is_empty() {
            href.to_string()
        } else {
            format!("{}/{}", self.config.package_directory.trim_end_matches('/'), href)
        }
    }

    fn write_entry(&mut self, name: &str, content: &[u8], options: SimpleFileOptions) -> Result<()> {
        self.zip.start_file(name, options)?;
        self.zip.write_all(content)?;
        Ok(())
    }
}

impl<W: Write + Seek> PackageWriter for ZipPackageWriter<W> {
    fn write_package(&mut self, package: &SynthesizedPackage, book: &BookDescriptor) -> Result<()> {
        let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        let deflated = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        let identifier = book.identifier();
        let language = book
            .language
            .clone()
            .unwrap_or_else(|| self.config.language.clone());
        let modified = book.modified.clone().unwrap_or_else(modified_now);
        let nav_href = unused_href(package, &self.config.navigation_document);
        let ncx_href = unused_href(package, &self.config.ncx_document);

        // mimetype必须是第一个条目且不压缩
        self.write_entry("mimetype", MIMETYPE, stored)?;

        let opf_path = self.entry_path(PACKAGE_DOCUMENT);
        let container = Container::for_package(opf_path.clone()).to_xml();
        self.write_entry(CONTAINER_PATH, container.as_bytes(), deflated)?;

        let opf = package_document(
            package,
            book,
            &identifier,
            &language,
            &modified,
            &nav_href,
            &ncx_href,
        );
        self.write_entry(&opf_path, opf.as_bytes(), deflated)?;

        let nav_map = navigation_map(package, book, &identifier, &nav_href);
        let ncx_path = self.entry_path(&ncx_href);
        self.write_entry(&ncx_path, nav_map.to_ncx().as_bytes(), deflated)?;
        let nav_path = self.entry_path(&nav_href);
        self.write_entry(&nav_path, nav_map.to_nav_xhtml(&language).as_bytes(), deflated)?;

        for entry in &package.manifest {
            let path = self.entry_path(&entry.item.href);
            self.write_entry(&path, &entry.content, deflated)?;
        }

        info!(
            "写入容器: {} 个文件, {} 个导航条目",
            package.manifest.len(),
            nav_map.len()
        );
        Ok(())
    }
}

/// 把合成好的包写入文件
pub fn write_epub<P: AsRef<Path>>(
    path: P,
    package: &SynthesizedPackage,
    book: &BookDescriptor,
    config: &ReassemblyConfig,
) -> Result<()> {
    let file = File::create(path.as_ref())?;
    let mut writer = ZipPackageWriter::new(file, config.clone());
    writer.write_package(package, book)?;
    writer.finish()?;
    Ok(())
}

/// 生成文件的href，与保留文件重名时加前缀
fn unused_href(package: &SynthesizedPackage, name: &str) -> String {
    let mut href = name.to_string();
    while package.item(&href).is_some() {
        href = format!("stitched-{}", href);
    }
    href
}

/// 当前UTC时间，dcterms:modified格式
fn modified_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// 导航条目为空时用一个指向第一个阅读顺序页面的条目代替，
/// 没有任何页面时指向导航文档本身
fn navigation_map(
    package: &SynthesizedPackage,
    book: &BookDescriptor,
    identifier: &str,
    nav_href: &str,
) -> NavMap {
    let mut nav_map = NavMap::new(book.title.clone(), identifier);
    for entry in &package.navigation {
        nav_map.push(entry.title.clone(), entry.href.clone());
    }
    if nav_map.is_empty() {
        let first_page = package
            .spine
            .iter()
            .find_map(|itemref| package.item_by_id(&itemref.idref))
            .map(|entry| entry.item.href.clone());
        nav_map.push(book.title.clone(), first_page.unwrap_or_else(|| nav_href.to_string()));
    }
    nav_map
}

/// 生成EPUB 3包文档
fn package_document(
    package: &SynthesizedPackage,
    book: &BookDescriptor,
    identifier: &str,
    language: &str,
    modified: &str,
    nav_href: &str,
    ncx_href: &str,
) -> String {
    let mut opf = String::new();
    opf.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    opf.push_str(&format!(
        "<package xmlns=\"{}\" version=\"3.0\" unique-identifier=\"BookId\" prefix=\"rendition: http://www.idpf.org/vocab/rendition/#\">\n",
        String::from_utf8_lossy(OPF_NAMESPACE)
    ));
    opf.push_str(&format!(
        "  <metadata xmlns:dc=\"http://purl.org/dc/elements/1.1/\" xmlns:opf=\"{}\">\n",
        String::from_utf8_lossy(OPF_NAMESPACE)
    ));
    opf.push_str(&format!(
        "    <dc:identifier id=\"BookId\">{}</dc:identifier>\n",
        escape(identifier)
    ));
    book_metadata(&mut opf, book, language);
    opf.push_str(&format!(
        "    <meta property=\"dcterms:modified\">{}</meta>\n",
        escape(modified)
    ));

    let rendition = &package.rendition;
    let rendition_metas = [
        ("rendition:layout", rendition.layout.map(|v| v.as_str())),
        ("rendition:spread", rendition.spread.map(|v| v.as_str())),
        ("rendition:orientation", rendition.orientation.map(|v| v.as_str())),
    ];
    for (property, value) in rendition_metas {
        if let Some(value) = value {
            opf.push_str(&format!("    <meta property=\"{}\">{}</meta>\n", property, value));
        }
    }
    if let Some(cover_id) = &package.cover_id {
        opf.push_str(&format!(
            "    <meta name=\"cover\" content=\"{}\"/>\n",
            escape(cover_id.as_str())
        ));
    }
    opf.push_str("  </metadata>\n  <manifest>\n");

    opf.push_str(&format!(
        "    <item id=\"{}\" href=\"{}\" media-type=\"application/xhtml+xml\" properties=\"nav\"/>\n",
        NAV_ID,
        escape(nav_href)
    ));
    opf.push_str(&format!(
        "    <item id=\"{}\" href=\"{}\" media-type=\"{}\"/>\n",
        NCX_ID,
        escape(ncx_href),
        media_type_for(ncx_href)
    ));
    for entry in &package.manifest {
        let item = &entry.item;
        let properties = item
            .properties
            .as_deref()
            .map(|p| format!(" properties=\"{}\"", escape(p)))
            .unwrap_or_default();
        opf.push_str(&format!(
            "    <item id=\"{}\" href=\"{}\" media-type=\"{}\"{}/>\n",
            escape(item.id.as_str()),
            escape(item.href.as_str()),
            escape(item.media_type.as_str()),
            properties
        ));
    }

    opf.push_str(&format!("  </manifest>\n  <spine toc=\"{}\">\n", NCX_ID));
    for itemref in &package.spine {
        let linear = if itemref.linear { "" } else { " linear=\"no\"" };
        let properties = itemref
            .properties
            .as_deref()
            .map(|p| format!(" properties=\"{}\"", escape(p)))
            .unwrap_or_default();
        opf.push_str(&format!(
            "    <itemref idref=\"{}\"{}{}/>\n",
            escape(itemref.idref.as_str()),
            linear,
            properties
        ));
    }
    opf.push_str("  </spine>\n</package>\n");
    opf
}

/// 书籍描述中的Dublin Core元素和Calibre系列信息
fn book_metadata(opf: &mut String, book: &BookDescriptor, language: &str) {
    if let Some(original_title) = &book.original_title {
        opf.push_str(&format!(
            "    <dc:title id=\"main-title\">{}</dc:title>\n",
            escape(book.title.as_str())
        ));
        opf.push_str(&format!(
            "    <dc:title id=\"original-title\">{}</dc:title>\n",
            escape(original_title.as_str())
        ));
        opf.push_str("    <meta refines=\"#original-title\" property=\"title-type\">original</meta>\n");
    } else {
        opf.push_str(&format!("    <dc:title>{}</dc:title>\n", escape(book.title.as_str())));
    }
    opf.push_str(&format!("    <dc:language>{}</dc:language>\n", escape(language)));

    for author in &book.authors {
        opf.push_str(&format!(
            "    <dc:creator opf:role=\"aut\">{}</dc:creator>\n",
            escape(author.as_str())
        ));
    }
    for translator in &book.translators {
        opf.push_str(&format!(
            "    <dc:contributor opf:role=\"trl\">{}</dc:contributor>\n",
            escape(translator.as_str())
        ));
    }

    let elements = [
        ("dc:description", &book.description),
        ("dc:publisher", &book.publisher),
        ("dc:date", &book.release_date),
    ];
    for (tag, value) in elements {
        if let Some(value) = value.as_deref().filter(|v| !v.is_empty()) {
            opf.push_str(&format!("    <{0}>{1}</{0}>\n", tag, escape(value)));
        }
    }
    if let Some(isbn) = book.isbn.as_deref().filter(|v| !v.is_empty()) {
        opf.push_str(&format!(
            "    <dc:identifier opf:scheme=\"ISBN\">{}</dc:identifier>\n",
            escape(isbn)
        ));
    }

    for subject in book.category.iter().chain(&book.tags) {
        opf.push_str(&format!("    <dc:subject>{}</dc:subject>\n", escape(subject.as_str())));
    }

    if let Some(series) = book.series.as_deref().filter(|v| !v.is_empty()) {
        opf.push_str(&format!(
            "    <meta name=\"calibre:series\" content=\"{}\"/>\n",
            escape(series)
        ));
        if let Some(index) = book.series_index {
            opf.push_str(&format!(
                "    <meta name=\"calibre:series_index\" content=\"{}\"/>\n",
                index
            ));
        }
    }
}
