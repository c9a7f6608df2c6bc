// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # Exception 模块
//!
//! 该模块定义了文件服务核心在处理请求过程中可能产生的两类结果：
//!
//! - **Exception**：携带 HTTP 状态码的失败结果（404、403、400、405、416、500），
//!   由宿主服务器转换为对应的状态行与简短的错误页面。
//! - **Outcome**：成功或“提前结束”的结果（200、206、304、301 以及“未处理”），
//!   这些都是高频且预期内的情况，因此不走错误传播通道。

use std::fmt;

/// 请求处理失败的原因。
///
/// 每个变体都对应一个确定的 HTTP 状态码，详见 [`Exception::status_code`]。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Exception {
    /// 路径无法解析、命中了保密名称规则，或 POST 到了一个不存在的目标。对应 `404 Not Found`。
    NotFound(String),
    /// 请求的是目录列表，但挂载点禁用了目录索引。对应 `403 Forbidden`。
    Forbidden(String),
    /// Range 头无法解析，或者 Range 中没有任何区间。对应 `400 Bad Request`。
    BadRequest(String),
    /// 静态文件处理器不支持该请求方法。对应 `405 Method Not Allowed`。
    MethodNotAllowed(String),
    /// 所有区间在归一化后都不合法。携带文件大小，用于生成 `Content-Range: bytes */size`。
    RangeNotSatisfiable(u64),
    /// 文件已经 stat 成功，但在打开或读取时失败。对应 `500 Internal Server Error`。
    InternalServerError(String),
}

use Exception::*;

impl Exception {
    /// 返回该异常对应的 HTTP 状态码。
    pub fn status_code(&self) -> u16 {
        match self {
            NotFound(_) => 404,
            Forbidden(_) => 403,
            BadRequest(_) => 400,
            MethodNotAllowed(_) => 405,
            RangeNotSatisfiable(_) => 416,
            InternalServerError(_) => 500,
        }
    }
}

impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotFound(msg) => write!(f, "Not found: {}", msg),
            Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            BadRequest(msg) => write!(f, "Bad request: {}", msg),
            MethodNotAllowed(msg) => write!(f, "Method not allowed: {}", msg),
            RangeNotSatisfiable(size) => {
                write!(f, "Requested range not satisfiable (file size {})", size)
            }
            InternalServerError(msg) => write!(f, "Internal server error: {}", msg),
        }
    }
}

impl std::error::Error for Exception {}

/// 处理器正常结束时的结果。
///
/// 响应对象在返回前已经被填充完毕，`Outcome` 只是告诉调用方走了哪条路径。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// `200 OK`，完整内容。
    Ok,
    /// `206 Partial Content`，单区间或 multipart/byteranges。
    PartialContent,
    /// `304 Not Modified`，响应体为空。
    NotModified,
    /// `301 Moved Permanently`，目标地址已写入 `Location` 头。
    Redirect(String),
    /// 没有处理器认领该请求，由宿主服务器给出默认行为（目前只用于 OPTIONS）。
    Declined,
}

impl Outcome {
    /// 返回该结果对应的 HTTP 状态码；`Declined` 没有固定的状态码。
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Outcome::Ok => Some(200),
            Outcome::PartialContent => Some(206),
            Outcome::NotModified => Some(304),
            Outcome::Redirect(_) => Some(301),
            Outcome::Declined => None,
        }
    }
}
