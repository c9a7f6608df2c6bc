// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! 保密名称规则：命中任一 glob 模式的路径段既不会被提供，也不会出现在目录列表中。

use log::warn;
use regex::Regex;

/// 一组有序的 glob 模式。
///
/// 支持 `*`、`?` 与 `[...]` 字符组，通配符不跨越 `/`。
#[derive(Debug, Clone)]
pub struct NondisclosurePolicy {
    patterns: Vec<(String, Regex)>,
}

impl NondisclosurePolicy {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Self {
        let patterns = patterns
            .iter()
            .filter_map(|p| {
                let p = p.as_ref();
                glob_to_regex(p).map(|re| (p.to_string(), re))
            })
            .collect();
        Self { patterns }
    }

    /// 判断单个名字（不含 `/`）是否命中任一模式
    pub fn matches(&self, name: &str) -> bool {
        self.matching_pattern(name).is_some()
    }

    /// 返回第一个命中的模式
    pub fn matching_pattern(&self, name: &str) -> Option<&str> {
        self.patterns
            .iter()
            .find(|(_, re)| re.is_match(name))
            .map(|(p, _)| p.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

fn glob_to_regex(pattern: &str) -> Option<Regex> {
    let mut re = String::from("^");
    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' => re.push_str("[^/]*"),
            '?' => re.push_str("[^/]"),
            '[' => {
                let mut class = String::new();
                let mut raw = String::from("[");
                let mut closed = false;
                if let Some(&first) = chars.peek() {
                    if first == '!' || first == '^' {
                        chars.next();
                        class.push('^');
                        raw.push(first);
                    }
                }
                for c in chars.by_ref() {
                    if c == ']' && !class.is_empty() && class != "^" {
                        closed = true;
                        break;
                    }
                    raw.push(c);
                    if matches!(c, '\\' | '[' | '&' | '~') || (c == '-' && class.is_empty()) {
                        class.push('\\');
                    }
                    class.push(c);
                }
                if closed {
                    re.push('[');
                    re.push_str(&class);
                    re.push(']');
                } else {
                    // 没有闭合的 `[` 按字面量处理
                    re.push_str(&regex::escape(&raw));
                }
            }
            '\\' => {
                if let Some(next) = chars.next() {
                    re.push_str(&regex::escape(&next.to_string()));
                }
            }
            _ => re.push_str(&regex::escape(&c.to_string())),
        }
    }
    re.push('$');
    match Regex::new(&re) {
        Ok(r) => Some(r),
        Err(e) => {
            warn!("无法编译保密名称模式 `{}'：{}，按字面量匹配", pattern, e);
            Regex::new(&format!("^{}$", regex::escape(pattern))).ok()
        }
    }
}
