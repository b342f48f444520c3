//! 分片合并
//!
//! 按到达顺序合并分片：选择重复文件的保留版本、逐条合并样式表、
//! 修复固定版式页面，最后推断封面。

pub mod cover;
pub mod engine;
pub mod fixed_layout;
pub mod paths;
pub mod registry;
pub mod stylesheet;
pub mod toc;

pub use cover::{CoverDecision, resolve_cover};
pub use engine::{ProgressCallback, Reassembler, reassemble};
pub use fixed_layout::{PageDimensions, repair_page};
pub use registry::{Admission, FileRegistry, KeptFile};
pub use stylesheet::{RuleSet, StylesheetAccumulator};
pub use toc::{TocEntry, TocIndex};
