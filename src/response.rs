// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # HTTP 响应模块
//!
//! `Response` 是文件服务核心的输出端：状态码、头部表与响应体。
//! 头部名称大小写不敏感，后写入的值覆盖先写入的值；响应体可以是空、
//! 内存中的字节、一个已定位好的文件句柄，或者由若干片段组成的 multipart 内容。
//! multipart 内容只保存各分片的头部与文件偏移，文件数据在写出时才读取。
//! 文件句柄归 `Body` 所有，响应体写完或者响应被丢弃时都会随之关闭。

use std::{
    fs::File,
    io::{self, Read, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
};

use bytes::Bytes;
use chrono::Utc;
use log::error;

use crate::{
    exception::Exception,
    param::{CRLF, SERVER_NAME, STATUS_CODES},
    util::{format_http_date, HtmlBuilder},
};

/// 响应体
#[derive(Debug, Default)]
pub enum Body {
    /// 无响应体（304、HEAD 等）
    #[default]
    Empty,
    /// 内存中的完整内容
    Bytes(Bytes),
    /// 已经定位到起始偏移的文件，写出 `length` 个字节后结束
    File { file: File, length: u64 },
    /// multipart/byteranges：依次写出每个分片，最后写出结束分隔符
    Multipart {
        file: File,
        parts: Vec<BytePart>,
        closing: Bytes,
    },
}

/// multipart/byteranges 中的一个分片
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BytePart {
    /// 分隔符行与分片头部，以空行结尾
    pub head: Bytes,
    pub first: u64,
    pub length: u64,
}

impl BytePart {
    /// 分片在响应体中占用的字节数，包括数据后的 CRLF
    pub fn len(&self) -> u64 {
        self.head.len() as u64 + self.length + CRLF.len() as u64
    }
}

impl Body {
    /// 响应体的字节数
    pub fn len(&self) -> u64 {
        match self {
            Body::Empty => 0,
            Body::Bytes(b) => b.len() as u64,
            Body::File { length, .. } => *length,
            Body::Multipart { parts, closing, .. } => {
                parts.iter().map(BytePart::len).sum::<u64>() + closing.len() as u64
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 把响应体写入 `writer`，返回写出的字节数。文件会被逐块复制而不是整体读入内存。
    pub fn write_to<W: Write>(self, writer: &mut W) -> io::Result<u64> {
        match self {
            Body::Empty => Ok(0),
            Body::Bytes(b) => {
                writer.write_all(&b)?;
                Ok(b.len() as u64)
            }
            Body::File { file, length } => {
                let mut reader = file.take(length);
                io::copy(&mut reader, writer)
            }
            Body::Multipart {
                mut file,
                parts,
                closing,
            } => {
                let mut written = 0;
                for part in parts {
                    writer.write_all(&part.head)?;
                    file.seek(SeekFrom::Start(part.first))?;
                    let copied = io::copy(&mut (&mut file).take(part.length), writer)?;
                    if copied < part.length {
                        return Err(io::Error::new(
                            io::ErrorKind::UnexpectedEof,
                            "file truncated while writing byte range",
                        ));
                    }
                    writer.write_all(CRLF.as_bytes())?;
                    written += part.len();
                }
                writer.write_all(&closing)?;
                Ok(written + closing.len() as u64)
            }
        }
    }
}

#[derive(Debug)]
pub struct Response {
    status_code: u16,
    information: String,
    headers: Vec<(String, String)>,
    body: Body,
    filename: Option<PathBuf>,
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}

impl Response {
    pub fn new() -> Self {
        Self {
            status_code: 200,
            information: "OK".to_string(),
            headers: Vec::new(),
            body: Body::Empty,
            filename: None,
        }
    }

    /// 根据异常生成错误响应：状态码、HTML 错误页以及该状态码要求的附加头部。
    pub fn from_exception(exception: &Exception) -> Self {
        let mut response = Self::new();
        response.set_exception(exception);
        response
    }

    /// 用异常覆盖当前响应。已经写入的头部中与内容相关的部分会被替换。
    pub fn set_exception(&mut self, exception: &Exception) -> &mut Self {
        let code = exception.status_code();
        self.set_code(code);
        let note = match exception {
            Exception::NotFound(msg)
            | Exception::Forbidden(msg)
            | Exception::BadRequest(msg)
            | Exception::MethodNotAllowed(msg) => Some(msg.as_str()),
            Exception::RangeNotSatisfiable(_) | Exception::InternalServerError(_) => None,
        };
        for name in ["ETag", "Last-Modified", "Content-Length", "Content-Range"] {
            self.remove_header(name);
        }
        match exception {
            Exception::RangeNotSatisfiable(size) => {
                self.set_header("Content-Range", format!("bytes */{}", size));
            }
            Exception::MethodNotAllowed(_) => {
                self.set_header("Allow", "GET, HEAD, OPTIONS");
            }
            _ => {}
        }
        let html = HtmlBuilder::from_status_code(code, note).build();
        self.set_header("Content-Type", "text/html; charset=utf-8");
        self.set_body(Body::Bytes(Bytes::from(html)));
        self
    }

    pub fn set_code(&mut self, code: u16) -> &mut Self {
        self.status_code = code;
        self.information = match STATUS_CODES.get(&code) {
            Some(&reason) => reason.to_string(),
            None => {
                error!("非法的状态码：{}。这条错误说明代码编写出现了错误。", code);
                "Unknown Status".to_string()
            }
        };
        self
    }

    /// 设置响应头。名称大小写不敏感，已存在的同名头部会被覆盖。
    pub fn set_header<V: ToString>(&mut self, name: &str, value: V) -> &mut Self {
        let value = value.to_string();
        match self
            .headers
            .iter_mut()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
        {
            Some(entry) => entry.1 = value,
            None => self.headers.push((name.to_string(), value)),
        }
        self
    }

    pub fn remove_header(&mut self, name: &str) -> &mut Self {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self
    }

    pub fn set_body(&mut self, body: Body) -> &mut Self {
        self.body = body;
        self
    }

    /// 取出响应体，原位置留下 `Body::Empty`
    pub fn take_body(&mut self) -> Body {
        std::mem::take(&mut self.body)
    }

    pub fn set_filename(&mut self, filename: PathBuf) -> &mut Self {
        self.filename = Some(filename);
        self
    }

    /// 序列化状态行与头部。未显式设置 `Content-Length` 时按响应体长度补齐。
    pub fn head_bytes(&self) -> Vec<u8> {
        let mut head = format!("HTTP/1.1 {} {}{}", self.status_code, self.information, CRLF);
        for (name, value) in &self.headers {
            head.push_str(&[name.as_str(), ": ", value.as_str(), CRLF].concat());
        }
        // 304 与 204 不允许携带 Content-Length
        let bodiless = matches!(self.status_code, 204 | 304);
        if self.header("Content-Length").is_none() && !bodiless {
            head.push_str(&format!("Content-Length: {}{}", self.body.len(), CRLF));
        }
        head.push_str(&["Date: ", &format_http_date(&Utc::now()), CRLF].concat());
        head.push_str(&["Server: ", SERVER_NAME, CRLF].concat());
        head.push_str(CRLF);
        head.into_bytes()
    }

    /// 写出完整响应。`headonly` 为真时（HEAD 请求）只写状态行与头部。
    pub fn write_to<W: Write>(&mut self, writer: &mut W, headonly: bool) -> io::Result<u64> {
        writer.write_all(&self.head_bytes())?;
        let body = self.take_body();
        if headonly {
            return Ok(0);
        }
        body.write_to(writer)
    }
}

impl Response {
    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    pub fn information(&self) -> &str {
        &self.information
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn body(&self) -> &Body {
        &self.body
    }

    /// 解析阶段定位到的本地路径
    pub fn filename(&self) -> Option<&Path> {
        self.filename.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Seek, SeekFrom};

    #[test]
    fn test_response_new() {
        let response = Response::new();
        assert_eq!(response.status_code(), 200);
        assert_eq!(response.information(), "OK");
        assert!(response.body().is_empty());
    }

    #[test]
    fn test_headers_are_case_insensitive_last_write_wins() {
        let mut response = Response::new();
        response.set_header("Content-Type", "text/plain");
        response.set_header("content-type", "text/html");
        assert_eq!(response.header("CONTENT-TYPE"), Some("text/html"));
        assert_eq!(response.headers().len(), 1);

        response.remove_header("Content-type");
        assert_eq!(response.header("content-type"), None);
    }

    #[test]
    fn test_status_code_setter() {
        let mut response = Response::new();
        for (code, expected) in [
            (206, "Partial Content"),
            (304, "Not Modified"),
            (403, "Forbidden"),
            (416, "Range Not Satisfiable"),
        ] {
            response.set_code(code);
            assert_eq!(response.status_code(), code);
            assert_eq!(response.information(), expected);
        }
    }

    #[test]
    fn test_head_bytes_basic() {
        let mut response = Response::new();
        response.set_header("Content-Type", "text/plain");
        response.set_body(Body::Bytes(Bytes::from("Hello")));
        let head = String::from_utf8(response.head_bytes()).unwrap();

        assert!(head.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(head.contains("Content-Type: text/plain\r\n"));
        assert!(head.contains("Content-Length: 5\r\n"));
        assert!(head.contains("Server: shaneyale-filehandler\r\n"));
        assert!(head.contains("Date: "));
        assert!(head.ends_with("\r\n\r\n"));
    }

    #[test]
    fn test_write_to_headonly_skips_body() {
        let mut response = Response::new();
        response.set_body(Body::Bytes(Bytes::from("Hello")));
        let mut out = Vec::new();
        response.write_to(&mut out, true).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Content-Length: 5"));
        assert!(!text.ends_with("Hello"));
    }

    #[test]
    fn test_file_body_streams_only_length_bytes() {
        let mut file = tempfile::tempfile().unwrap();
        file.write_all(b"0123456789").unwrap();
        file.seek(SeekFrom::Start(3)).unwrap();

        let body = Body::File { file, length: 4 };
        assert_eq!(body.len(), 4);
        let mut out = Vec::new();
        assert_eq!(body.write_to(&mut out).unwrap(), 4);
        assert_eq!(out, b"3456");
    }

    #[test]
    fn test_multipart_body_reads_file_while_writing() {
        let mut file = tempfile::tempfile().unwrap();
        file.write_all(b"0123456789").unwrap();
        let part = |head: &'static str, first, length| BytePart {
            head: Bytes::from(head),
            first,
            length,
        };
        let body = Body::Multipart {
            file,
            parts: vec![part("[a]", 7, 3), part("[b]", 0, 2)],
            closing: Bytes::from("end"),
        };
        assert_eq!(body.len(), 3 + 3 + 2 + 3 + 2 + 2 + 3);
        let mut out = Vec::new();
        assert_eq!(body.write_to(&mut out).unwrap(), 18);
        assert_eq!(out, b"[a]789\r\n[b]01\r\nend");
    }

    #[test]
    fn test_multipart_body_detects_truncated_file() {
        let mut file = tempfile::tempfile().unwrap();
        file.write_all(b"0123").unwrap();
        let body = Body::Multipart {
            file,
            parts: vec![BytePart {
                head: Bytes::from("h"),
                first: 2,
                length: 10,
            }],
            closing: Bytes::new(),
        };
        let err = body.write_to(&mut Vec::new()).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn test_no_content_length_for_bodiless_status() {
        for code in [204, 304] {
            let mut response = Response::new();
            response.set_code(code);
            let head = String::from_utf8(response.head_bytes()).unwrap();
            assert!(!head.contains("Content-Length"), "{}", code);
        }
    }

    #[test]
    fn test_from_exception_range_not_satisfiable() {
        let response = Response::from_exception(&Exception::RangeNotSatisfiable(100));
        assert_eq!(response.status_code(), 416);
        assert_eq!(response.header("content-range"), Some("bytes */100"));
    }

    #[test]
    fn test_from_exception_not_found_page() {
        let mut response = Response::from_exception(&Exception::NotFound("`/x' not found.".into()));
        assert_eq!(response.status_code(), 404);
        let mut out = Vec::new();
        response.take_body().write_to(&mut out).unwrap();
        let html = String::from_utf8(out).unwrap();
        assert!(html.contains("404 Not Found"));
    }

    #[test]
    fn test_set_exception_drops_validators() {
        let mut response = Response::new();
        response.set_header("ETag", "\"1-2-3\"");
        response.set_exception(&Exception::BadRequest("bad".into()));
        assert_eq!(response.status_code(), 400);
        assert_eq!(response.header("etag"), None);
    }
}
