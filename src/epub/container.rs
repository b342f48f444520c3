use crate::epub::error::{Result, StitchError};
use quick_xml::events::Event;
use quick_xml::reader::Reader;

/// 包文档的标准媒体类型
pub const PACKAGE_MEDIA_TYPE: &str = "application/oebps-package+xml";

/// container.xml在归档中的固定位置
pub const CONTAINER_PATH: &str = "META-INF/container.xml";

/// Container.xml中的rootfile信息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootFile {
    pub full_path: String,
    pub media_type: String,
}

/// Container.xml的解析结果
#[derive(Debug, Clone)]
pub struct Container {
    pub rootfiles: Vec<RootFile>,
}

impl Container {
    /// 创建只指向一个包文档的container
    pub fn for_package(full_path: impl Into<String>) -> Self {
        Self {
            rootfiles: vec![RootFile {
                full_path: full_path.into(),
                media_type: PACKAGE_MEDIA_TYPE.to_string(),
            }],
        }
    }

    /// 解析container.xml内容
    ///
    /// # 参数
    /// * `xml_content` - container.xml的文件内容
    ///
    /// # 返回值
    /// * `Result<Container>` - 解析后的Container信息，没有任何rootfile时返回错误
    pub fn parse_xml(xml_content: &str) -> Result<Container> {
        let mut reader = Reader::from_str(xml_content);
        reader.config_mut().trim_text(true);

        let mut rootfiles = Vec::new();
        let mut buf = Vec::new();
        let mut in_rootfiles = false;

        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Start(ref e) if e.local_name().as_ref() == b"rootfiles" => {
                    in_rootfiles = true;
                }
                Event::Start(ref e) | Event::Empty(ref e)
                    if in_rootfiles && e.local_name().as_ref() == b"rootfile" =>
                {
                    let mut full_path = String::new();
                    let mut media_type = String::new();

                    for attr_result in e.attributes() {
                        let attr = attr_result
                            .map_err(|err| StitchError::XmlError(quick_xml::Error::InvalidAttr(err)))?;
                        let value = String::from_utf8_lossy(&attr.value).to_string();
                        match attr.key.local_name().as_ref() {
                            b"full-path" => full_path = value,
                            b"media-type" => media_type = value,
                            _ => {}
                        }
                    }

                    if !full_path.is_empty() {
                        rootfiles.push(RootFile { full_path, media_type });
                    }
                }
                Event::End(ref e) if e.local_name().as_ref() == b"rootfiles" => {
                    in_rootfiles = false;
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        if rootfiles.is_empty() {
            return Err(StitchError::ContainerParseError(
                "没有找到任何rootfile条目".to_string(),
            ));
        }

        Ok(Container { rootfiles })
    }

    /// 获取主要的包文档路径
    ///
    /// 优先返回媒体类型为包文档的rootfile，否则返回第一个rootfile
    pub fn package_path(&self) -> Option<&str> {
        self.rootfiles
            .iter()
            .find(|rootfile| rootfile.media_type == PACKAGE_MEDIA_TYPE)
            .or_else(|| self.rootfiles.first())
            .map(|rootfile| rootfile.full_path.as_str())
    }

    /// 序列化为container.xml
    pub fn to_xml(&self) -> String {
        let mut xml = String::from(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
             <container version=\"1.0\" xmlns=\"urn:oasis:names:tc:opendocument:xmlns:container\">\n  <rootfiles>\n",
        );
        for rootfile in &self.rootfiles {
            xml.push_str(&format!(
                "    <rootfile full-path=\"{}\" media-type=\"{}\"/>\n",
                quick_xml::escape::escape(rootfile.full_path.as_str()),
                quick_xml::escape::escape(rootfile.media_type.as_str()),
            ));
        }
        xml.push_str("  </rootfiles>\n</container>\n");
        xml
    }
}
