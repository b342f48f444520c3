//! 包文档元数据提取
//!
//! 从包文档中提取渲染属性、封面引用和脊柱项属性。
//! 提取失败不会报错：包文档无法解析时返回全部未设置的元数据。

use crate::epub::opf::manifest::ManifestItem;
use crate::epub::opf::metadata::{CoverProvenance, PackageMetadata};
use crate::epub::opf::spine::SpineItem;
use log::debug;
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::{Namespace, ResolveResult};
use quick_xml::reader::NsReader;
use std::collections::HashMap;

/// OPF命名空间
pub const OPF_NAMESPACE: &[u8] = b"http://www.idpf.org/2007/opf";

/// 包文档中关心的三个区段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Metadata,
    Manifest,
    Spine,
}

/// 一次流式读取收集到的原始条目
#[derive(Debug, Default)]
struct RawPackage {
    /// (property, 文本)
    properties: Vec<(String, String)>,
    /// `<meta name="cover">` 的content
    cover_id: Option<String>,
    manifest: Vec<ManifestItem>,
    spine: Vec<SpineItem>,
}

impl PackageMetadata {
    /// 从包文档内容提取元数据
    ///
    /// # 返回值
    /// * `(PackageMetadata, bool)` - 提取到的元数据，以及是否恢复出了任何字段
    pub fn extract(content: &[u8]) -> (PackageMetadata, bool) {
        let raw = match std::str::from_utf8(content)
            .map_err(|e| e.to_string())
            .and_then(|text| read_package(text).map_err(|e| e.to_string()))
        {
            Ok(raw) => raw,
            Err(reason) => {
                debug!("包文档解析失败，忽略元数据: {}", reason);
                return (PackageMetadata::new(), false);
            }
        };

        let metadata = resolve(raw);
        let recovered = !metadata.is_empty();
        (metadata, recovered)
    }
}

/// 流式读取包文档，收集metadata、manifest、spine下的条目
fn read_package(xml_content: &str) -> quick_xml::Result<RawPackage> {
    let mut reader = NsReader::from_str(xml_content);
    reader.config_mut().trim_text(true);

    let mut raw = RawPackage::default();
    let mut buf = Vec::new();
    let mut depth = 0usize;
    let mut section: Option<(Section, usize)> = None;
    let mut pending_property: Option<String> = None;
    let mut text_content = String::new();

    loop {
        let (resolved, event) = reader.read_resolved_event_into(&mut buf)?;
        match event {
            Event::Start(ref e) => {
                depth += 1;
                match section {
                    // 区段必须是package根元素的直接子元素
                    None if depth == 2 => {
                        section = section_of(&resolved, e).map(|s| (s, depth));
                    }
                    Some((current, _)) => {
                        if current == Section::Metadata && e.local_name().as_ref() == b"meta" {
                            pending_property = meta_start(e, &mut raw)?;
                            text_content.clear();
                        } else {
                            collect_item(current, e, &mut raw)?;
                        }
                    }
                    None => {}
                }
            }
            Event::Empty(ref e) => {
                if let Some((current, _)) = section {
                    if current == Section::Metadata && e.local_name().as_ref() == b"meta" {
                        meta_start(e, &mut raw)?;
                    } else {
                        collect_item(current, e, &mut raw)?;
                    }
                }
            }
            Event::Text(e) => {
                if pending_property.is_some() {
                    text_content.push_str(&e.unescape()?);
                }
            }
            Event::End(ref e) => {
                if e.local_name().as_ref() == b"meta" {
                    if let Some(property) = pending_property.take() {
                        raw.properties.push((property, text_content.trim().to_string()));
                    }
                }
                if matches!(section, Some((_, start)) if start == depth) {
                    section = None;
                }
                depth = depth.saturating_sub(1);
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(raw)
}

/// 区段元素可以带OPF命名空间，也可以不带命名空间
fn section_of(resolved: &ResolveResult, e: &BytesStart) -> Option<Section> {
    let namespace_ok = match resolved {
        ResolveResult::Bound(Namespace(ns)) => *ns == OPF_NAMESPACE,
        ResolveResult::Unbound => true,
        ResolveResult::Unknown(_) => false,
    };
    if !namespace_ok {
        return None;
    }
    match e.local_name().as_ref() {
        b"metadata" => Some(Section::Metadata),
        b"manifest" => Some(Section::Manifest),
        b"spine" => Some(Section::Spine),
        _ => None,
    }
}

/// 读取元素的全部属性（按本地名）
fn attributes_of(e: &BytesStart) -> quick_xml::Result<HashMap<String, String>> {
    let mut attributes = HashMap::new();
    for attr_result in e.attributes() {
        let attr = attr_result.map_err(quick_xml::Error::InvalidAttr)?;
        let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).to_string();
        let value = attr.unescape_value()?.to_string();
        attributes.insert(key, value);
    }
    Ok(attributes)
}

/// 处理meta标签，返回需要等待文本内容的property
fn meta_start(e: &BytesStart, raw: &mut RawPackage) -> quick_xml::Result<Option<String>> {
    let mut attributes = attributes_of(e)?;

    if attributes.get("name").map(String::as_str) == Some("cover") {
        if let Some(content) = attributes.remove("content") {
            raw.cover_id = Some(content);
        }
    }

    Ok(attributes.remove("property").filter(|p| !p.is_empty()))
}

/// 收集清单项和脊柱项
fn collect_item(section: Section, e: &BytesStart, raw: &mut RawPackage) -> quick_xml::Result<()> {
    match (section, e.local_name().as_ref()) {
        (Section::Manifest, b"item") => {
            let mut attributes = attributes_of(e)?;
            let id = attributes.remove("id").unwrap_or_default();
            let href = attributes.remove("href").unwrap_or_default();
            if id.is_empty() || href.is_empty() {
                return Ok(());
            }
            let mut item = ManifestItem::new(
                id,
                href,
                attributes.remove("media-type").unwrap_or_default(),
            );
            item.properties = attributes.remove("properties");
            raw.manifest.push(item);
        }
        (Section::Spine, b"itemref") => {
            let mut attributes = attributes_of(e)?;
            if let Some(idref) = attributes.remove("idref") {
                let mut item = SpineItem::new(idref);
                item.linear = attributes.get("linear").map(String::as_str) != Some("no");
                item.properties = attributes.remove("properties").filter(|p| !p.is_empty());
                raw.spine.push(item);
            }
        }
        _ => {}
    }
    Ok(())
}

/// 把原始条目整理成元数据
fn resolve(raw: RawPackage) -> PackageMetadata {
    let mut metadata = PackageMetadata::new();

    for (property, value) in &raw.properties {
        match property.as_str() {
            "rendition:layout" => metadata.rendition_layout = parse_keyword(property, value),
            "rendition:spread" => metadata.rendition_spread = parse_keyword(property, value),
            "rendition:orientation" => {
                metadata.rendition_orientation = parse_keyword(property, value)
            }
            _ => {}
        }
    }

    metadata.cover_id = raw.cover_id;

    // 先出现的匹配项胜出：ID匹配或cover-image属性
    let mut id_to_href = HashMap::new();
    for item in &raw.manifest {
        id_to_href.insert(item.id.as_str(), item.href.as_str());

        if metadata.cover_href.is_some() {
            continue;
        }
        if metadata.cover_id.as_deref() == Some(item.id.as_str()) {
            metadata.cover_href = Some(item.href.clone());
            metadata.cover_provenance = Some(CoverProvenance::ExplicitMetadata);
        } else if item.is_cover_image() {
            metadata.cover_href = Some(item.href.clone());
            metadata.cover_id = Some(item.id.clone());
            metadata.cover_provenance = Some(CoverProvenance::CoverImageProperty);
        }
    }

    for item in &raw.spine {
        if let (Some(properties), Some(href)) = (&item.properties, id_to_href.get(item.idref.as_str())) {
            metadata
                .spine_properties
                .insert(href.to_string(), properties.clone());
        }
    }

    metadata
}

fn parse_keyword<T: std::str::FromStr>(property: &str, value: &str) -> Option<T> {
    match value.parse() {
        Ok(keyword) => Some(keyword),
        Err(_) => {
            debug!("忽略无法识别的{}取值: {:?}", property, value);
            None
        }
    }
}
