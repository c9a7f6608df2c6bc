// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use lazy_static::lazy_static;
use regex::Regex;

use crate::param::{DEFAULT_MIME, MIME_TYPES, STATUS_CODES};

lazy_static! {
    static ref PRIMARY_SUFFIX: Regex = Regex::new(r"\.(\w+)$").unwrap();
    static ref SECONDARY_SUFFIX: Regex = Regex::new(r"\.(\w+)\.[\w\-]+$").unwrap();
    static ref HEADER_VALUE: Regex = Regex::new(r#"(?:"(?:\\.|[^"])+?"|[^",]+)+"#).unwrap();
    static ref QVALUE: Regex =
        Regex::new(r"^([^\s,;]+?)(?:;\s*q=(\d+(?:\.\d+)?))?$").unwrap();
}

/// 错误页面生成器
pub struct HtmlBuilder {
    title: String,
    css: String,
    body: String,
}

impl HtmlBuilder {
    pub fn from_status_code(code: u16, note: Option<&str>) -> Self {
        let title = format!("{}", code);
        let css = r"
            body {
                width: 35em;
                margin: 0 auto;
                font-family: Tahoma, Verdana, Arial, sans-serif;
            }
            "
        .to_string();
        let reason = STATUS_CODES.get(&code).copied().unwrap_or("Unknown Status");
        let description = match note {
            Some(n) => escape_html(n),
            None => reason.to_string(),
        };
        let body = format!(
            r"
            <h1>{} {}</h1>
            <p>{}</p>
            ",
            code, reason, description
        );
        Self { title, css, body }
    }

    pub fn build(&self) -> String {
        format!(
            r##"<!DOCTYPE html>
            <html>
                <head>
                    <meta charset="utf-8">
                    <title>{}</title>
                    <style>{}</style>
                </head>
                <body>
                {}
                </body>
            </html>"##,
            self.title, self.css, self.body
        )
    }
}

/// HTML 转义，用于把文件名、路径等不可信文本放进页面
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// 对路径做百分号编码，只保留 RFC 3986 中在路径段里安全的字符
pub fn escape_path(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for b in text.bytes() {
        if b.is_ascii_alphanumeric() || b"-._~!$'()*+,=:@/".contains(&b) {
            out.push(b as char);
        } else {
            out.push_str(&format!("%{:02X}", b));
        }
    }
    out
}

/// 百分号解码。非法的转义序列原样保留，解码后的非 UTF-8 字节会被替换。
pub fn unescape(text: &str) -> String {
    unescape_bytes(text, false)
}

/// 表单编码解码：在 [`unescape`] 的基础上把 `+` 视为空格
pub fn unescape_form(text: &str) -> String {
    unescape_bytes(text, true)
}

fn unescape_bytes(text: &str, plus_as_space: bool) -> String {
    let bytes = text.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'%' if i + 2 < bytes.len() => {
                match (hex_value(bytes[i + 1]), hex_value(bytes[i + 2])) {
                    (Some(h), Some(l)) => {
                        out.push(h * 16 + l);
                        i += 3;
                        continue;
                    }
                    _ => out.push(b'%'),
                }
            }
            b'+' if plus_as_space => out.push(b' '),
            b => out.push(b),
        }
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

/// 格式化为 RFC 1123 形式的 HTTP 日期，例如 `Sun, 06 Nov 1994 08:49:37 GMT`
pub fn format_http_date(date: &DateTime<Utc>) -> String {
    date.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// 解析 HTTP 日期。依次尝试 RFC 1123、RFC 850、asctime 与 RFC 3339。
pub fn parse_http_date(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(d) = DateTime::parse_from_rfc2822(text) {
        return Some(d.with_timezone(&Utc));
    }
    for fmt in ["%A, %d-%b-%y %H:%M:%S GMT", "%a %b %e %H:%M:%S %Y"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, fmt) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    DateTime::parse_from_rfc3339(text)
        .ok()
        .map(|d| d.with_timezone(&Utc))
}

/// 拆分逗号分隔的头部取值，引号内的逗号不作为分隔符
pub fn split_header_value(value: &str) -> Vec<String> {
    HEADER_VALUE
        .find_iter(value)
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// 解析带 q 值的列表（如 `Accept-Language`），按 q 值从高到低返回，q 相同时保持原顺序
pub fn parse_qvalues(value: &str) -> Vec<String> {
    let mut tmp: Vec<(String, f64)> = Vec::new();
    for part in value.split(',') {
        let part = part.trim();
        if let Some(cap) = QVALUE.captures(part) {
            let q = cap
                .get(2)
                .and_then(|m| m.as_str().parse::<f64>().ok())
                .unwrap_or(1.0);
            tmp.push((cap[1].to_string(), q));
        }
    }
    tmp.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    tmp.into_iter().map(|(v, _)| v).collect()
}

/// 提取名字的主后缀与次后缀（均转为小写）。
///
/// `index.html` 的主后缀是 `html`；`index.html.en` 的主后缀是 `en`，次后缀是 `html`。
pub fn suffixes(name: &str) -> (Option<String>, Option<String>) {
    let primary = PRIMARY_SUFFIX
        .captures(name)
        .map(|c| c[1].to_ascii_lowercase());
    let secondary = SECONDARY_SUFFIX
        .captures(name)
        .map(|c| c[1].to_ascii_lowercase());
    (primary, secondary)
}

/// 根据主后缀、次后缀查找 MIME 类型，都查不到时返回 `application/octet-stream`
pub fn mime_type(name: &str) -> &'static str {
    let (primary, secondary) = suffixes(name);
    primary
        .and_then(|s| MIME_TYPES.get(s.as_str()).copied())
        .or_else(|| secondary.and_then(|s| MIME_TYPES.get(s.as_str()).copied()))
        .unwrap_or(DEFAULT_MIME)
}
