//! NCX（Navigation Control file for XML）与导航文档模块
//!
//! 合成的包同时带有EPUB 2的NCX和EPUB 3的XHTML导航文档，
//! 两者由同一份导航地图生成。

mod navigation;

pub use navigation::{NCX_NAMESPACE, NavMap, NavPoint};
