pub mod epub;
pub mod merge;
pub mod package;

// === 核心API重新导出 ===

/// 拼装运行上下文（主要接口）
pub use merge::{Reassembler, reassemble};

/// 错误处理
pub use epub::{Result, StitchError};

/// 配置
pub use epub::ReassemblyConfig;

// === 数据结构 ===

/// 分片
pub use epub::{Fragment, FragmentArchive};

/// 包文档元数据
pub use epub::{
    CoverProvenance,
    PackageMetadata,
    RenditionHints,
    RenditionLayout,
    RenditionOrientation,
    RenditionSpread,
};

/// 目录索引和封面
pub use merge::{CoverDecision, TocEntry, TocIndex};

/// 合成结果和打包
pub use package::{
    BookDescriptor,
    NavigationEntry,
    PackageItem,
    PackageWriter,
    Rendition,
    SynthesizedPackage,
    ZipPackageWriter,
    write_epub,
};

// === 库信息 ===

/// bookstitch库的版本信息
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// bookstitch库的描述
pub const DESCRIPTION: &str = "把多个已解密的EPUB分片拼装成一本完整的书";
