use std::io;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, StitchError>;

/// 分片拼装相关的错误类型
///
/// 只有资源类错误（临时文件、ZIP读写、输出写入）会向上传播；
/// 包文档、样式表、页面的解析问题一律降级处理，不会出现在这里。
#[derive(Error, Debug)]
pub enum StitchError {
    #[error("IO错误: {0}")]
    Io(#[from] io::Error),

    #[error("Zip文件错误: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("XML解析错误: {0}")]
    XmlError(#[from] quick_xml::Error),

    #[error("container.xml解析错误: {0}")]
    ContainerParseError(String),

    #[error("分片不是有效的归档: {0}")]
    InvalidFragment(String),

    #[error("配置文件错误: {0}")]
    ConfigError(String),

    #[error("目录索引错误: {0}")]
    TocError(String),
}
