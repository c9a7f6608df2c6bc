// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # HTTP 请求模块
//!
//! `Request` 是文件服务核心所看到的请求视图：
//! 1. 方法、原始路径以及查询参数。
//! 2. 大小写不敏感的头部查找（条件请求与 Range 相关的头都从这里读取）。
//! 3. 按 q 值排序后的 `Accept-Language` 列表，用于语言变体协商。
//! 4. `script_name` / `path_info` 的拆分：解析过程中，已经走过的路径段会从
//!    `path_info` 移到 `script_name`，这两个字段只属于当前请求。
//!
//! 宿主服务器既可以用 [`Request::try_from`] 从原始报文构建，也可以用
//! [`Request::new`] 加上 `with_*` 系列方法以编程方式构建。

use std::collections::HashMap;

use log::error;

use crate::{
    exception::Exception,
    param::{HttpRequestMethod, CRLF},
    util::{parse_qvalues, split_header_value, unescape, unescape_form},
};

#[derive(Debug, Clone)]
pub struct Request {
    /// 宿主服务器分配的请求序号，仅用于日志
    id: u128,
    method: HttpRequestMethod,
    /// 解码后的请求路径（不含查询字符串）
    path: String,
    /// 原始查询字符串（不含 `?`）
    query_string: Option<String>,
    /// 小写头部名称到取值的映射，重复的头部以逗号合并
    headers: HashMap<String, String>,
    query: HashMap<String, String>,
    accept_language: Vec<String>,
    script_name: String,
    path_info: String,
}

impl Request {
    /// 以编程方式构建请求。`target` 可以带查询字符串，路径部分会被百分号解码。
    ///
    /// 初始状态下 `script_name` 为空，`path_info` 等于完整路径，
    /// 即挂载在 `/` 上；挂载在其他位置时用 [`Request::mounted_at`] 调整。
    pub fn new(method: HttpRequestMethod, target: &str) -> Self {
        let (raw_path, query_string) = match target.split_once('?') {
            Some((p, q)) => (p, Some(q.to_string())),
            None => (target, None),
        };
        let path = unescape(raw_path);
        let query = query_string
            .as_deref()
            .map(parse_query)
            .unwrap_or_default();
        Self {
            id: 0,
            method,
            path_info: path.clone(),
            path,
            query_string,
            headers: HashMap::new(),
            query,
            accept_language: Vec::new(),
            script_name: String::new(),
        }
    }

    /// 添加一个请求头，名称大小写不敏感；同名头部按 HTTP 规则用逗号合并。
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.add_header(name, value);
        self
    }

    pub fn with_id(mut self, id: u128) -> Self {
        self.id = id;
        self
    }

    /// 指定挂载点。`mount` 必须是 `path` 的前缀，剩余部分成为 `path_info`。
    pub fn mounted_at(mut self, mount: &str) -> Self {
        let mount = mount.trim_end_matches('/');
        if let Some(rest) = self.path.strip_prefix(mount) {
            self.script_name = mount.to_string();
            self.path_info = rest.to_string();
        }
        self
    }

    fn add_header(&mut self, name: &str, value: &str) {
        let key = name.trim().to_ascii_lowercase();
        let value = value.trim();
        self.headers
            .entry(key.clone())
            .and_modify(|v| {
                v.push_str(", ");
                v.push_str(value);
            })
            .or_insert_with(|| value.to_string());
        if key == "accept-language" {
            if let Some(v) = self.headers.get(&key) {
                self.accept_language = parse_qvalues(v);
            }
        }
    }

    /// 从原始字节缓冲区构建 `Request`，供宿主服务器使用。
    ///
    /// 只解析请求行和头部，请求体被忽略。
    pub fn try_from(buffer: &[u8], id: u128) -> Result<Self, Exception> {
        let request_string = match std::str::from_utf8(buffer) {
            Ok(s) => s.trim_end_matches('\0'),
            Err(_) => {
                error!("[ID{}]无法解析HTTP请求，报文不是UTF-8", id);
                return Err(Exception::BadRequest("request is not valid UTF-8".to_string()));
            }
        };
        let head = match request_string.split_once("\r\n\r\n") {
            Some((head, _body)) => head,
            None => request_string,
        };
        let mut lines = head.split(CRLF);
        let request_line = lines.next().unwrap_or_default();

        let parts: Vec<&str> = request_line.split_whitespace().collect();
        if parts.len() != 3 {
            error!("[ID{}]HTTP请求行格式不正确：{}", id, request_line);
            return Err(Exception::BadRequest(format!(
                "bad Request-Line `{}'",
                request_line
            )));
        }

        let method = match HttpRequestMethod::parse(parts[0]) {
            Some(m) => m,
            None => {
                error!("[ID{}]不支持的HTTP请求方法：{}", id, parts[0]);
                return Err(Exception::MethodNotAllowed(format!(
                    "unsupported method `{}'",
                    parts[0]
                )));
            }
        };

        let version = parts[2].to_ascii_uppercase();
        if version != "HTTP/1.1" && version != "HTTP/1.0" {
            error!("[ID{}]不支持的HTTP协议版本：{}", id, &version);
            return Err(Exception::BadRequest(format!(
                "unsupported HTTP version `{}'",
                version
            )));
        }

        let mut request = Self::new(method, parts[1]).with_id(id);
        for line in lines {
            match line.split_once(':') {
                Some((name, value)) => request.add_header(name, value),
                None if line.is_empty() => {}
                None => {
                    error!("[ID{}]无法解析的请求头：{}", id, line);
                    return Err(Exception::BadRequest(format!("bad header `{}'", line)));
                }
            }
        }
        Ok(request)
    }
}

/// 解析 `a=1&b=2` 形式的查询字符串。同名参数保留第一个。
fn parse_query(query: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for pair in query.split(['&', ';']) {
        if pair.is_empty() {
            continue;
        }
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        map.entry(unescape_form(key))
            .or_insert_with(|| unescape_form(value));
    }
    map
}

// --- 访问器 ---

impl Request {
    pub fn id(&self) -> u128 {
        self.id
    }

    pub fn method(&self) -> HttpRequestMethod {
        self.method
    }

    /// 解码后的完整请求路径
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query_string(&self) -> Option<&str> {
        self.query_string.as_deref()
    }

    /// 获取请求头，名称大小写不敏感
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// 获取逗号分隔的头部取值列表（如 `If-None-Match`）
    pub fn header_values(&self, name: &str) -> Vec<String> {
        self.header(name)
            .map(split_header_value)
            .unwrap_or_default()
    }

    pub fn query(&self) -> &HashMap<String, String> {
        &self.query
    }

    /// 按偏好顺序排列的语言标签
    pub fn accept_language(&self) -> &[String] {
        &self.accept_language
    }

    pub fn host(&self) -> Option<&str> {
        self.header("host")
    }

    pub fn script_name(&self) -> &str {
        &self.script_name
    }

    pub fn path_info(&self) -> &str {
        &self.path_info
    }

    pub fn set_script_name(&mut self, script_name: String) {
        self.script_name = script_name;
    }

    pub fn set_path_info(&mut self, path_info: String) {
        self.path_info = path_info;
    }
}
