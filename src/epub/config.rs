//! 拼装配置模块
//!
//! 提供拼装过程的配置管理功能，支持从YAML文件加载配置。

use crate::epub::error::{Result, StitchError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// 默认配置文件路径
pub const DEFAULT_CONFIG_PATH: &str = "bookstitch.yaml";

/// 拼装配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReassemblyConfig {
    /// 被识别为导航文档的文件名（不区分大小写）
    pub navigation_filenames: Vec<String>,
    /// 输出容器中存放包文档的目录
    pub package_directory: String,
    /// 生成的导航文档文件名
    pub navigation_document: String,
    /// 生成的NCX文件名
    pub ncx_document: String,
    /// 书籍未提供语言时使用的dc:language
    pub language: String,
}

impl Default for ReassemblyConfig {
    fn default() -> Self {
        Self::default_config()
    }
}

impl ReassemblyConfig {
    /// 获取默认配置
    pub fn default_config() -> Self {
        Self {
            navigation_filenames: ["nav.xhtml", "nav.html", "toc.xhtml", "toc.html"]
                .iter()
                .map(|name| name.to_string())
                .collect(),
            package_directory: "EPUB".to_string(),
            navigation_document: "nav.xhtml".to_string(),
            ncx_document: "toc.ncx".to_string(),
            language: "en".to_string(),
        }
    }

    /// 从指定的YAML文件加载配置
    ///
    /// 文件中缺失的字段使用默认值
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .map_err(|e| StitchError::ConfigError(format!("无法读取配置文件: {}", e)))?;

        serde_yml::from_str(&content)
            .map_err(|e| StitchError::ConfigError(format!("配置文件格式错误: {}", e)))
    }

    /// 生成默认配置文件
    ///
    /// # 参数
    /// * `path` - 配置文件写入位置
    pub fn generate_default_config<P: AsRef<Path>>(path: P) -> Result<()> {
        let yaml_content = serde_yml::to_string(&Self::default_config())
            .map_err(|e| StitchError::ConfigError(format!("序列化配置失败: {}", e)))?;

        let content_with_header = format!(
            "# bookstitch 拼装配置文件\n# navigation_filenames: 被视为导航文档的文件名\n# package_directory: 输出容器中包文档所在目录\n\n{}",
            yaml_content
        );

        fs::write(path.as_ref(), content_with_header)
            .map_err(|e| StitchError::ConfigError(format!("写入配置文件失败: {}", e)))?;

        Ok(())
    }

    /// 指定了路径时从文件加载，否则使用默认配置
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default_config()),
        }
    }

    /// 判断文件名是否为导航文档
    pub fn is_navigation_filename(&self, basename: &str) -> bool {
        self.navigation_filenames
            .iter()
            .any(|name| name.eq_ignore_ascii_case(basename))
    }
}
