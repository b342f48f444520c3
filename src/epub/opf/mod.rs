//! OPF（Open Packaging Format）包文档模块
//!
//! 此模块提供包文档的元数据提取，以及合成新包文档时使用的清单、脊柱结构。

mod extract;
mod manifest;
mod metadata;
mod spine;

pub use extract::OPF_NAMESPACE;
pub use manifest::{ManifestItem, media_type_for};
pub use metadata::{
    CoverProvenance,
    PackageMetadata,
    RenditionHints,
    RenditionLayout,
    RenditionOrientation,
    RenditionSpread,
    SpineProperties,
    UnknownRenditionValue,
};
pub use spine::SpineItem;
