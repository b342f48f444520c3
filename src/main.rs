use bookstitch::epub::config::DEFAULT_CONFIG_PATH;
use bookstitch::{
    BookDescriptor, Reassembler, ReassemblyConfig, RenditionHints, RenditionLayout, Result,
    TocIndex, write_epub,
};
use clap::Parser;
use log::warn;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::mpsc;
use std::thread::{self, JoinHandle};
use tracing_subscriber::filter::LevelFilter;

/// 🧵 bookstitch - EPUB分片拼装工具
#[derive(Parser)]
#[command(name = "bookstitch")]
#[command(about = "把多个已解密的EPUB分片拼装成一本完整的书")]
#[command(version)]
struct Args {
    /// 已解密的分片文件，按到达顺序排列
    #[arg(help = "已解密的分片文件（按顺序）", required_unless_present = "generate_config")]
    fragments: Vec<PathBuf>,

    /// 输出文件
    #[arg(short, long, help = "输出的EPUB文件路径", required_unless_present = "generate_config")]
    output: Option<PathBuf>,

    /// 目录索引
    #[arg(long, help = "目录索引YAML文件（{href, title} 列表）")]
    toc: Option<PathBuf>,

    /// 书名
    #[arg(long, default_value = "Untitled", help = "书名")]
    title: String,

    /// 作者
    #[arg(long = "author", help = "作者（可重复）")]
    authors: Vec<String>,

    /// 译者
    #[arg(long = "translator", help = "译者（可重复）")]
    translators: Vec<String>,

    /// 原书名
    #[arg(long, help = "原书名")]
    original_title: Option<String>,

    /// 语言
    #[arg(long, help = "dc:language，默认取配置文件中的语言")]
    language: Option<String>,

    /// 简介
    #[arg(long, help = "书籍简介")]
    description: Option<String>,

    /// 出版社
    #[arg(long, help = "出版社")]
    publisher: Option<String>,

    /// ISBN
    #[arg(long, help = "ISBN，同时作为书籍标识符")]
    isbn: Option<String>,

    /// 发行日期
    #[arg(long, help = "发行日期（YYYY-MM-DD）")]
    release_date: Option<String>,

    /// 分类
    #[arg(long, help = "分类")]
    category: Option<String>,

    /// 标签
    #[arg(long = "tag", help = "标签（可重复）")]
    tags: Vec<String>,

    /// 系列
    #[arg(long, help = "系列名称")]
    series: Option<String>,

    /// 系列序号
    #[arg(long, help = "在系列中的序号", requires = "series")]
    series_index: Option<u32>,

    /// 渲染版式提示
    #[arg(long, value_enum, help = "包文档没有声明时使用的版式")]
    layout: Option<LayoutArg>,

    /// 配置文件
    #[arg(long, help = "配置文件路径")]
    config: Option<PathBuf>,

    /// 生成默认配置文件
    #[arg(long, help = "生成默认配置文件后退出")]
    generate_config: bool,

    /// 详细输出模式
    #[arg(short, long, help = "显示每个文件的合并决定")]
    verbose: bool,
}

/// 版式提示
#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum LayoutArg {
    /// 可重排
    Reflowable,
    /// 固定版式
    PrePaginated,
}

impl From<LayoutArg> for RenditionLayout {
    fn from(layout: LayoutArg) -> Self {
        match layout {
            LayoutArg::Reflowable => RenditionLayout::Reflowable,
            LayoutArg::PrePaginated => RenditionLayout::PrePaginated,
        }
    }
}

fn main() {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(if args.verbose { LevelFilter::DEBUG } else { LevelFilter::INFO })
        .with_target(false)
        .init();

    if args.generate_config {
        let path = args
            .config
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
        match ReassemblyConfig::generate_default_config(&path) {
            Ok(()) => println!("📝 已生成默认配置文件: {}", path.display()),
            Err(e) => {
                eprintln!("❌ 错误: {}", e);
                std::process::exit(1);
            }
        }
        return;
    }

    println!("🧵 bookstitch - EPUB分片拼装工具");
    println!("正在拼装 {} 个分片", args.fragments.len());

    match run(args) {
        Ok(output) => println!("🎉 拼装完成: {}", output.display()),
        Err(e) => {
            eprintln!("❌ 错误: {}", e);
            std::process::exit(1);
        }
    }
}

fn run(args: Args) -> Result<PathBuf> {
    let config = ReassemblyConfig::load_or_default(args.config.as_deref())?;
    let toc = match &args.toc {
        Some(path) => TocIndex::from_yaml_file(path)?,
        None => TocIndex::new(),
    };
    let hints = RenditionHints {
        layout: args.layout.map(RenditionLayout::from),
        ..RenditionHints::default()
    };

    let total = args.fragments.len();
    let mut done = 0.0;
    let mut reassembler = Reassembler::new(toc, hints)
        .with_config(config.clone())
        .with_progress(total, move |fraction| {
            done += fraction;
            println!("📦 进度: {:.0}%", done * 100.0);
        });

    // 读取线程预先载入下一个分片，合并只在当前线程进行
    let (sender, receiver) = mpsc::sync_channel(1);
    let fragments = args.fragments.clone();
    let loader = thread::spawn(move || {
        for path in fragments {
            let loaded = fs::read(&path).map(|bytes| (path, bytes));
            let failed = loaded.is_err();
            if sender.send(loaded).is_err() || failed {
                break;
            }
        }
    });

    for loaded in receiver {
        let (path, bytes) = loaded?;
        if args.verbose {
            println!("🔍 合并分片: {}", path.display());
        }
        reassembler.push_bytes(&bytes)?;
    }
    join_loader(loader)?;

    let package = reassembler.finish();
    if let Some(cover) = &package.cover.path {
        println!("🖼️ 封面: {} ({:?})", cover, package.cover.provenance);
    }

    let book = BookDescriptor {
        authors: args.authors,
        language: args.language,
        description: args.description,
        publisher: args.publisher,
        isbn: args.isbn,
        release_date: args.release_date,
        original_title: args.original_title,
        translators: args.translators,
        category: args.category,
        tags: args.tags,
        series: args.series,
        series_index: args.series_index,
        ..BookDescriptor::new(args.title)
    };

    let output = args.output.unwrap_or_else(|| PathBuf::from("output.epub"));
    write_epub(&output, &package, &book, &config)?;
    Ok(output)
}

/// 等待读取线程结束，线程崩溃时作为错误返回
fn join_loader(loader: JoinHandle<()>) -> Result<()> {
    loader.join().map_err(|_| {
        warn!("分片读取线程异常退出");
        io::Error::other("分片读取线程异常退出").into()
    })
}
