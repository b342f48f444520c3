pub mod config;
pub mod container;
pub mod error;
pub mod fragment;
pub mod ncx;
pub mod opf;

// 重新导出错误处理
pub use error::{Result, StitchError};

// 重新导出配置
pub use config::ReassemblyConfig;

// 重新导出容器相关
pub use container::{Container, RootFile};

// 重新导出分片
pub use fragment::{Fragment, FragmentArchive};

// 重新导出OPF相关
pub use opf::{
    CoverProvenance,
    ManifestItem,
    PackageMetadata,
    RenditionHints,
    RenditionLayout,
    RenditionOrientation,
    RenditionSpread,
    SpineItem,
    SpineProperties,
};

// 重新导出NCX相关
pub use ncx::{NavMap, NavPoint};
