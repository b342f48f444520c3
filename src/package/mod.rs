//! 包合成与打包
//!
//! `synthesize` 把拼装结果整理成清单、脊柱和导航，
//! `writer` 把它们序列化成容器。

pub mod synthesize;
pub mod writer;

pub use synthesize::{
    MergeOutcome, NavigationEntry, PackageItem, Rendition, SynthesizedPackage,
};
pub use writer::{BookDescriptor, PackageWriter, ZipPackageWriter, write_epub};
