// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 协议参数与常量模块
//!
//! 该模块集中放置文件服务核心用到的 HTTP 常量：
//! - 状态码及其原因短语（Reason Phrase）。
//! - 文件后缀到 MIME 类型的映射表。
//! - 核心所识别的 HTTP 方法。

use std::collections::HashMap;
use std::fmt;

use lazy_static::lazy_static;

/// 服务器名称标识，用于 `Server` 响应头以及目录列表页脚
pub const SERVER_NAME: &str = "shaneyale-filehandler";

/// HTTP 协议规定的换行符
pub const CRLF: &str = "\r\n";

/// 无法识别后缀时使用的兜底 MIME 类型
pub const DEFAULT_MIME: &str = "application/octet-stream";

lazy_static! {
    /// HTTP 状态码与其标准原因短语的映射表（RFC 9110）。
    ///
    /// 只收录核心和宿主服务器实际会产生的状态码。
    pub static ref STATUS_CODES: HashMap<u16, &'static str> = {
        let mut map = HashMap::new();
        map.insert(200, "OK");
        map.insert(204, "No Content");
        map.insert(206, "Partial Content");
        map.insert(301, "Moved Permanently");
        map.insert(302, "Found");
        map.insert(304, "Not Modified");
        map.insert(400, "Bad Request");
        map.insert(403, "Forbidden");
        map.insert(404, "Not Found");
        map.insert(405, "Method Not Allowed");
        map.insert(416, "Range Not Satisfiable");
        map.insert(500, "Internal Server Error");
        map.insert(501, "Not Implemented");
        map.insert(505, "HTTP Version Not Supported");
        map
    };
}

lazy_static! {
    /// 小写文件后缀（不含点号）到 MIME 类型的映射表。
    pub static ref MIME_TYPES: HashMap<&'static str, &'static str> = {
        let mut map = HashMap::new();
        // 文本
        map.insert("html", "text/html");
        map.insert("htm", "text/html");
        map.insert("xhtml", "application/xhtml+xml");
        map.insert("css", "text/css");
        map.insert("txt", "text/plain");
        map.insert("text", "text/plain");
        map.insert("csv", "text/csv");
        map.insert("xml", "text/xml");
        map.insert("rtf", "application/rtf");
        map.insert("md", "text/markdown");
        // 脚本与数据
        map.insert("js", "text/javascript");
        map.insert("mjs", "text/javascript");
        map.insert("json", "application/json");
        map.insert("wasm", "application/wasm");
        // 图片
        map.insert("png", "image/png");
        map.insert("jpg", "image/jpeg");
        map.insert("jpeg", "image/jpeg");
        map.insert("jpe", "image/jpeg");
        map.insert("gif", "image/gif");
        map.insert("bmp", "image/bmp");
        map.insert("ico", "image/x-icon");
        map.insert("svg", "image/svg+xml");
        map.insert("tif", "image/tiff");
        map.insert("tiff", "image/tiff");
        map.insert("webp", "image/webp");
        // 音视频
        map.insert("mp3", "audio/mpeg");
        map.insert("wav", "audio/wav");
        map.insert("ogg", "audio/ogg");
        map.insert("mp4", "video/mp4");
        map.insert("mpeg", "video/mpeg");
        map.insert("mpg", "video/mpeg");
        map.insert("mov", "video/quicktime");
        map.insert("webm", "video/webm");
        map.insert("avi", "video/x-msvideo");
        // 字体
        map.insert("woff", "font/woff");
        map.insert("woff2", "font/woff2");
        map.insert("ttf", "font/ttf");
        map.insert("otf", "font/otf");
        // 文档与归档
        map.insert("pdf", "application/pdf");
        map.insert("ps", "application/postscript");
        map.insert("zip", "application/zip");
        map.insert("gz", "application/gzip");
        map.insert("tar", "application/x-tar");
        map.insert("bz2", "application/x-bzip2");
        map.insert("7z", "application/x-7z-compressed");
        map.insert("bin", "application/octet-stream");
        map.insert("exe", "application/octet-stream");
        map
    };
}

/// 核心能够区分的 HTTP 请求方法。
///
/// 文件服务核心是只读的，PUT/DELETE/WebDAV 等方法在解析阶段就被拒绝。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpRequestMethod {
    /// 获取资源
    Get,
    /// 获取资源的元数据（不包含响应体）
    Head,
    /// 提交数据，只有注册了后缀处理器的目标才会接受
    Post,
    /// 查询服务器支持的选项
    Options,
}

impl HttpRequestMethod {
    /// 从请求行中的方法名解析，大小写不敏感。
    pub fn parse(method: &str) -> Option<Self> {
        match method.to_ascii_uppercase().as_str() {
            "GET" => Some(HttpRequestMethod::Get),
            "HEAD" => Some(HttpRequestMethod::Head),
            "POST" => Some(HttpRequestMethod::Post),
            "OPTIONS" => Some(HttpRequestMethod::Options),
            _ => None,
        }
    }
}

impl fmt::Display for HttpRequestMethod {
    /// 将枚举格式化为 HTTP 标准大写方法名
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            HttpRequestMethod::Get => write!(f, "GET"),
            HttpRequestMethod::Head => write!(f, "HEAD"),
            HttpRequestMethod::Post => write!(f, "POST"),
            HttpRequestMethod::Options => write!(f, "OPTIONS"),
        }
    }
}
