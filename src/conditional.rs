// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 条件请求模块
//!
//! 负责 ETag 的生成以及 `If-Range` / `If-Modified-Since` / `If-None-Match`
//! 的判定。文件元数据在每次请求时重新读取，不做跨请求缓存。

use std::{fs::Metadata, time::SystemTime};

use chrono::{DateTime, Utc};
use log::debug;

use crate::{
    request::Request,
    util::{parse_http_date, split_header_value},
};

/// 生成 ETag：`"<inode>-<size>-<mtime 秒>"`，三段均为小写十六进制。
///
/// 同一个未修改的文件多次 stat 得到的 ETag 相同；大小或修改时间变化时 ETag 随之改变。
pub fn etag_for(metadata: &Metadata) -> String {
    let mtime = metadata
        .modified()
        .map(mtime_seconds)
        .unwrap_or_default();
    format!("\"{:x}-{:x}-{:x}\"", inode(metadata), metadata.len(), mtime)
}

#[cfg(unix)]
fn inode(metadata: &Metadata) -> u64 {
    use std::os::unix::fs::MetadataExt;
    metadata.ino()
}

#[cfg(not(unix))]
fn inode(_metadata: &Metadata) -> u64 {
    0
}

fn mtime_seconds(time: SystemTime) -> i64 {
    DateTime::<Utc>::from(time).timestamp()
}

/// 判断是否应当返回 `304 Not Modified`。
///
/// 依次检查：
/// 1. `If-Range`：能解析成日期时，日期不早于 `mtime` 即命中；否则视为实体标签列表，包含当前 ETag 即命中。
/// 2. `If-Modified-Since`：能解析且不早于 `mtime` 即命中。
/// 3. `If-None-Match`：标签列表包含当前 ETag（或为 `*`）即命中。
///
/// 某一项未命中时继续检查下一项。日期比较精确到秒。
pub fn not_modified(request: &Request, mtime: SystemTime, etag: &str) -> bool {
    let mtime = mtime_seconds(mtime);

    if let Some(if_range) = request.header("if-range") {
        match parse_http_date(if_range) {
            Some(date) => {
                if date.timestamp() >= mtime {
                    debug!("If-Range 日期 {} 不早于文件修改时间", if_range);
                    return true;
                }
            }
            None => {
                if split_header_value(if_range).iter().any(|t| t == etag) {
                    debug!("If-Range 实体标签命中 {}", etag);
                    return true;
                }
            }
        }
    }

    if let Some(date) = request.header("if-modified-since").and_then(parse_http_date) {
        if date.timestamp() >= mtime {
            debug!("If-Modified-Since 命中");
            return true;
        }
    }

    if let Some(if_none_match) = request.header("if-none-match") {
        if split_header_value(if_none_match)
            .iter()
            .any(|t| t == etag || t == "*")
        {
            debug!("If-None-Match 命中 {}", etag);
            return true;
        }
    }

    false
}
