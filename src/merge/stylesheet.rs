//! 样式表合并
//!
//! 同一路径的样式表按规则逐条合并：规则以选择器为键，
//! `@font-face` 规则的键还包含其font-family；同一键只保留最长的规则文本，
//! 长度相同保留先出现的。没有font-family的 `@font-face` 规则会被丢弃。
//!
//! 拆分方式很朴素：按 `}` 切分，含有 `{` 的片段视为一条规则。
//! 嵌套的at规则（如 `@media`）不会被正确识别。

use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

static FONT_FAMILY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"font-family:\s*["']?([^"';}]+)"#).expect("font-family正则表达式无效")
});

/// 计算规则的键
///
/// 返回 `None` 表示该规则应被丢弃
pub fn rule_key(rule_text: &str) -> Option<String> {
    let selector = rule_text.split('{').next().unwrap_or_default().trim();
    if selector == "@font-face" {
        return FONT_FAMILY
            .captures(rule_text)
            .map(|captures| format!("@font-face:{}", captures[1].trim()));
    }
    if selector.is_empty() {
        None
    } else {
        Some(selector.to_string())
    }
}

/// 按键索引的规则集合，保持键的首次出现顺序
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleSet {
    order: Vec<String>,
    rules: HashMap<String, String>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// 把样式表文本拆分为规则
    pub fn parse(css: &str) -> Self {
        let mut set = RuleSet::new();
        for chunk in css.split('}') {
            if !chunk.contains('{') {
                continue;
            }
            match rule_key(chunk) {
                Some(key) => {
                    set.offer(key, format!("{}}}", chunk.trim()));
                }
                None => debug!("丢弃没有键的规则: {:?}", chunk.trim()),
            }
        }
        set
    }

    /// 提交一条候选规则，只有更长的文本才会替换已有规则
    ///
    /// 返回该候选是否被采用
    pub fn offer(&mut self, key: String, rule: String) -> bool {
        match self.rules.get_mut(&key) {
            Some(existing) if rule.len() > existing.len() => {
                *existing = rule;
                true
            }
            Some(_) => false,
            None => {
                self.order.push(key.clone());
                self.rules.insert(key, rule);
                true
            }
        }
    }

    /// 合并另一组规则：已有键按长度竞争，新键追加在末尾
    pub fn merge(&mut self, other: RuleSet) {
        let RuleSet { order, mut rules } = other;
        for key in order {
            if let Some(rule) = rules.remove(&key) {
                self.offer(key, rule);
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.rules.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// 按顺序重新拼接为样式表文本
    pub fn to_css(&self) -> String {
        self.order
            .iter()
            .filter_map(|key| self.rules.get(key))
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// 每个样式表路径的累积内容
#[derive(Debug, Clone)]
struct AccumulatedStylesheet {
    path: String,
    content: Vec<u8>,
}

/// 样式表累加器：路径 -> 合并后的内容
#[derive(Debug, Clone, Default)]
pub struct StylesheetAccumulator {
    sheets: Vec<AccumulatedStylesheet>,
    index: HashMap<String, usize>,
}

impl StylesheetAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// 合并一个分片中的样式表
    ///
    /// 空内容被忽略；第一次出现的非空版本原样保存，
    /// 之后的版本与已保存内容逐条合并
    pub fn merge(&mut self, path: &str, content: &[u8]) {
        if content.is_empty() {
            debug!("忽略空样式表 {}", path);
            return;
        }

        let Some(&i) = self.index.get(path) else {
            self.index.insert(path.to_string(), self.sheets.len());
            self.sheets.push(AccumulatedStylesheet {
                path: path.to_string(),
                content: content.to_vec(),
            });
            return;
        };

        let sheet = &mut self.sheets[i];
        if sheet.content == content {
            return;
        }

        let mut rules = RuleSet::parse(&String::from_utf8_lossy(&sheet.content));
        rules.merge(RuleSet::parse(&String::from_utf8_lossy(content)));
        sheet.content = rules.to_css().into_bytes();
        debug!("合并样式表 {}: {} 条规则", path, rules.len());
    }

    /// 当前累积的内容
    pub fn get(&self, path: &str) -> Option<&[u8]> {
        self.index
            .get(path)
            .map(|&i| self.sheets[i].content.as_slice())
    }

    pub fn len(&self) -> usize {
        self.sheets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sheets.is_empty()
    }

    /// 按首次出现顺序输出最终的 路径 -> 内容
    pub fn into_stylesheets(self) -> Vec<(String, Vec<u8>)> {
        self.sheets
            .into_iter()
            .map(|sheet| (sheet.path, sheet.content))
            .collect()
    }
}
