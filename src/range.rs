// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # Range 请求模块
//!
//! 解析 `Range: bytes=...` 头，把每个区间按文件大小归一化，然后生成
//! 单区间的 `206` 响应，或者 `multipart/byteranges` 响应。
//!
//! 单区间与多区间对非法区间的处理不同：单区间时直接返回 416；
//! 多区间时非法区间被静默跳过，只有全部非法才返回 416。

use std::{
    fs::File,
    io::{Read, Seek, SeekFrom},
    path::Path,
    process,
};

use bytes::Bytes;
use chrono::{Local, Timelike};
use lazy_static::lazy_static;
use log::{debug, error};
use regex::Regex;

use crate::{
    exception::{Exception, Outcome},
    param::CRLF,
    request::Request,
    response::{Body, BytePart, Response},
};

lazy_static! {
    static ref RANGE_HEADER: Regex = Regex::new(r"^bytes=(.*)$").unwrap();
    static ref SPEC_SEPARATOR: Regex = Regex::new(r",\s*").unwrap();
    static ref FIRST_LAST: Regex = Regex::new(r"^(\d+)-(\d+)$").unwrap();
    static ref FIRST_ONLY: Regex = Regex::new(r"^(\d+)-$").unwrap();
    static ref SUFFIX: Regex = Regex::new(r"^-(\d+)$").unwrap();
}

/// 归一化之前的一个区间。
///
/// 负数表示从文件末尾倒数：`-500` 解析为 `first = -500, last = -1`，
/// `100-` 解析为 `first = 100, last = -1`。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeSpec {
    pub first: i64,
    pub last: i64,
}

/// 解析 Range 头。语法不合法时返回 `None`；`bytes=` 后为空时返回空列表。
pub fn parse_range_header(value: &str) -> Option<Vec<RangeSpec>> {
    let specs = RANGE_HEADER.captures(value.trim())?.get(1)?.as_str().trim();
    // 列表中的空元素被忽略，`bytes=` 本身得到空列表
    SPEC_SEPARATOR
        .split(specs)
        .filter(|spec| !spec.is_empty())
        .map(|spec| {
            if let Some(c) = FIRST_LAST.captures(spec) {
                Some(RangeSpec {
                    first: c[1].parse().ok()?,
                    last: c[2].parse().ok()?,
                })
            } else if let Some(c) = FIRST_ONLY.captures(spec) {
                Some(RangeSpec {
                    first: c[1].parse().ok()?,
                    last: -1,
                })
            } else if let Some(c) = SUFFIX.captures(spec) {
                let n: i64 = c[1].parse().ok()?;
                Some(RangeSpec { first: -n, last: -1 })
            } else {
                None
            }
        })
        .collect()
}

/// 按文件大小归一化区间，返回闭区间 `(first, last)`。
///
/// `first` 落在 `[0, size)` 之外，或者归一化后 `first > last` 时返回 `None`。
/// `last` 超出文件末尾时被截断到 `size - 1`。
pub fn prepare_range(spec: &RangeSpec, file_size: u64) -> Option<(u64, u64)> {
    let size = i64::try_from(file_size).ok()?;
    let first = if spec.first < 0 {
        size + spec.first
    } else {
        spec.first
    };
    if first < 0 || first >= size {
        return None;
    }
    let last = if spec.last < 0 { size + spec.last } else { spec.last };
    let last = last.min(size - 1);
    if first > last {
        return None;
    }
    Some((first as u64, last as u64))
}

/// multipart 分隔符：当前秒、微秒与进程号。
///
/// 只需要避免与文件内容偶然冲突，不承担任何安全职责。
pub fn multipart_boundary() -> String {
    let now = Local::now();
    format!(
        "{}_{}_{}",
        now.second(),
        now.nanosecond() / 1000,
        process::id()
    )
}

// 带 `bytes ` 单位前缀，与 RFC 9110 的 Content-Range 格式一致
fn content_range(first: u64, last: u64, file_size: u64) -> String {
    format!("bytes {}-{}/{}", first, last, file_size)
}

/// 根据请求中的 Range 头填充 `206` 响应。
///
/// `mime` 是文件本身的类型，单区间时作为 `Content-Type`，多区间时写入每个分片的头部。
pub fn serve_range(
    request: &Request,
    response: &mut Response,
    path: &Path,
    file_size: u64,
    mime: &str,
) -> Result<Outcome, Exception> {
    let id = request.id();
    let header = request.header("range").unwrap_or_default();
    let ranges = match parse_range_header(header) {
        Some(r) => r,
        None => {
            debug!("[ID{}]无法解析的Range头：{}", id, header);
            return Err(Exception::BadRequest(format!(
                "Unrecognized range-spec: \"{}\"",
                header
            )));
        }
    };

    let mut file = File::open(path).map_err(|e| {
        error!("[ID{}]无法打开文件{}: {}", id, path.display(), e);
        Exception::InternalServerError(format!("cannot open `{}'", path.display()))
    })?;

    match ranges.as_slice() {
        [] => {
            debug!("[ID{}]Range头中没有任何区间", id);
            Err(Exception::BadRequest(format!(
                "Unrecognized range-spec: \"{}\"",
                header
            )))
        }
        [spec] => {
            let (first, last) = match prepare_range(spec, file_size) {
                Some(r) => r,
                None => {
                    debug!("[ID{}]区间{:?}超出文件大小{}", id, spec, file_size);
                    return Err(Exception::RangeNotSatisfiable(file_size));
                }
            };
            let length = last - first + 1;
            let body = if last == file_size - 1 {
                seek(&mut file, first, path, id)?;
                Body::File { file, length }
            } else {
                Body::Bytes(read_range(&mut file, first, length, path, id)?)
            };
            debug!(
                "[ID{}]单区间响应: bytes {}-{}/{} ({}字节)",
                id, first, last, file_size, length
            );
            response
                .set_code(206)
                .set_header("Content-Type", mime)
                .set_header("Content-Range", content_range(first, last, file_size))
                .set_header("Content-Length", length)
                .set_body(body);
            Ok(Outcome::PartialContent)
        }
        specs => {
            let boundary = multipart_boundary();
            let mut parts = Vec::new();
            for spec in specs {
                let (first, last) = match prepare_range(spec, file_size) {
                    Some(r) => r,
                    None => {
                        debug!("[ID{}]跳过非法区间{:?}", id, spec);
                        continue;
                    }
                };
                let head = [
                    "--",
                    &boundary,
                    CRLF,
                    "Content-Type: ",
                    mime,
                    CRLF,
                    "Content-Range: ",
                    &content_range(first, last, file_size),
                    CRLF,
                    CRLF,
                ]
                .concat();
                parts.push(BytePart {
                    head: Bytes::from(head),
                    first,
                    length: last - first + 1,
                });
            }
            if parts.is_empty() {
                debug!("[ID{}]所有区间均不合法", id);
                return Err(Exception::RangeNotSatisfiable(file_size));
            }
            let closing = Bytes::from(["--", &boundary, "--", CRLF].concat());
            let body = Body::Multipart {
                file,
                parts,
                closing,
            };
            debug!(
                "[ID{}]多区间响应，分隔符{}，共{}字节",
                id,
                boundary,
                body.len()
            );
            response
                .set_code(206)
                .set_header(
                    "Content-Type",
                    format!("multipart/byteranges; boundary={}", boundary),
                )
                .set_header("Content-Length", body.len())
                .remove_header("Content-Range")
                .set_body(body);
            Ok(Outcome::PartialContent)
        }
    }
}

fn seek(file: &mut File, offset: u64, path: &Path, id: u128) -> Result<(), Exception> {
    file.seek(SeekFrom::Start(offset)).map(|_| ()).map_err(|e| {
        error!("[ID{}]无法定位到文件{}的位置{}: {}", id, path.display(), offset, e);
        Exception::InternalServerError(format!("cannot seek `{}'", path.display()))
    })
}

fn read_range(
    file: &mut File,
    first: u64,
    length: u64,
    path: &Path,
    id: u128,
) -> Result<Bytes, Exception> {
    seek(file, first, path, id)?;
    let mut buffer = Vec::with_capacity(length as usize);
    file.take(length).read_to_end(&mut buffer).map_err(|e| {
        error!("[ID{}]读取Range内容失败: {}", id, e);
        Exception::InternalServerError(format!("cannot read `{}'", path.display()))
    })?;
    if (buffer.len() as u64) < length {
        error!(
            "[ID{}]文件{}在读取过程中被截断，期望{}字节，实际{}字节",
            id,
            path.display(),
            length,
            buffer.len()
        );
        return Err(Exception::InternalServerError(format!(
            "`{}' changed while reading",
            path.display()
        )));
    }
    Ok(Bytes::from(buffer))
}
