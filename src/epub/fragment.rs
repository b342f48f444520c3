use std::fs::File;
use std::io::{self, Read, Seek, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use zip::ZipArchive;

use crate::epub::container::{CONTAINER_PATH, Container};
use crate::epub::error::{Result, StitchError};
use crate::merge::paths::{self, PathKind};

/// 一个分片：可以列出路径、按路径读取内容的归档
pub trait FragmentArchive {
    /// 按归档中的顺序列出所有条目
    fn paths(&mut self) -> Result<Vec<String>>;

    /// 条目未压缩时的字节长度
    fn size(&mut self, path: &str) -> Result<u64> {
        Ok(self.read(path)?.len() as u64)
    }

    /// 读取条目内容
    fn read(&mut self, path: &str) -> Result<Vec<u8>>;

    /// 查找分片中的包文档
    ///
    /// 优先使用META-INF/container.xml中的rootfile，
    /// 否则返回列表中第一个包文档
    fn package_document(&mut self, listing: &[String]) -> Option<String> {
        if listing.iter().any(|path| path == CONTAINER_PATH) {
            let from_container = self
                .read(CONTAINER_PATH)
                .ok()
                .and_then(|bytes| String::from_utf8(bytes).ok())
                .and_then(|xml| Container::parse_xml(&xml).ok())
                .and_then(|container| container.package_path().map(str::to_string))
                .filter(|path| listing.contains(path));
            if from_container.is_some() {
                return from_container;
            }
        }

        listing
            .iter()
            .find(|path| paths::classify(path) == PathKind::PackageDocument)
            .cloned()
    }
}

impl<R: Read + Seek> FragmentArchive for ZipArchive<R> {
    fn paths(&mut self) -> Result<Vec<String>> {
        let mut files = Vec::with_capacity(self.len());
        for i in 0..self.len() {
            let file = self.by_index(i)?;
            files.push(file.name().to_string());
        }
        Ok(files)
    }

    fn size(&mut self, path: &str) -> Result<u64> {
        Ok(self.by_name(path)?.size())
    }

    fn read(&mut self, path: &str) -> Result<Vec<u8>> {
        let mut file = self.by_name(path)?;
        let declared = file.size();
        Ok(read_declared(&mut file, declared)?)
    }
}

/// 单个条目预分配的上限
const MAX_PREALLOCATION: u64 = 1 << 20;

/// 读取条目全部内容，归档声明的长度只作为预分配的参考
fn read_declared<R: Read>(reader: &mut R, declared: u64) -> io::Result<Vec<u8>> {
    let mut buffer = Vec::with_capacity(declared.min(MAX_PREALLOCATION) as usize);
    reader.read_to_end(&mut buffer)?;
    Ok(buffer)
}

/// 已解密的分片，内容保存在临时工作副本中
///
/// 工作副本在 `close` 或析构时删除；`close` 会把删除失败作为错误返回
pub struct Fragment {
    archive: ZipArchive<File>,
    working_copy: NamedTempFile,
}

impl Fragment {
    /// 把分片字节写入临时工作副本并打开
    ///
    /// # 参数
    /// * `bytes` - 已解密的分片内容
    ///
    /// # 返回值
    /// * `Result<Fragment>` - 工作副本无法创建或内容不是有效归档时返回错误
    pub fn from_bytes(bytes: &[u8]) -> Result<Fragment> {
        Self::from_reader(bytes)
    }

    /// 从磁盘上的分片文件创建工作副本
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Fragment> {
        let file = File::open(path)?;
        Self::from_reader(file)
    }

    fn from_reader<R: Read>(mut reader: R) -> Result<Fragment> {
        let mut working_copy = NamedTempFile::new()?;
        io::copy(&mut reader, &mut working_copy)?;
        working_copy.flush()?;

        let archive = ZipArchive::new(working_copy.reopen()?)
            .map_err(|e| StitchError::InvalidFragment(e.to_string()))?;

        Ok(Fragment { archive, working_copy })
    }

    /// 工作副本在磁盘上的位置
    pub fn working_path(&self) -> &Path {
        self.working_copy.path()
    }

    /// 关闭归档并删除工作副本
    pub fn close(self) -> Result<()> {
        let Fragment { archive, working_copy } = self;
        drop(archive);
        working_copy.close()?;
        Ok(())
    }
}

impl FragmentArchive for Fragment {
    fn paths(&mut self) -> Result<Vec<String>> {
        self.archive.paths()
    }

    fn size(&mut self, path: &str) -> Result<u64> {
        self.archive.size(path)
    }

    fn read(&mut self, path: &str) -> Result<Vec<u8>> {
        self.archive.read(path)
    }
}

/// 测试用：在内存中构建一个分片
#[cfg(test)]
pub(crate) fn fragment_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    use zip::ZipWriter;
    use zip::write::SimpleFileOptions;

    let mut zip = ZipWriter::new(io::Cursor::new(Vec::new()));
    for (name, content) in entries {
        if name.ends_with('/') {
            zip.add_directory(name.trim_end_matches('/'), SimpleFileOptions::default())
                .unwrap();
        } else {
            zip.start_file(*name, SimpleFileOptions::default()).unwrap();
            zip.write_all(content).unwrap();
        }
    }
    zip.finish().unwrap().into_inner()
}
