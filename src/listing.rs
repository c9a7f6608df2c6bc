// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 目录列表模块
//!
//! 在目录中找不到索引文件、并且挂载点开启了 FancyIndexing 时，生成可排序的 HTML 目录页。
//! 排序由查询参数 `N`（名称）、`M`（修改时间）、`S`（大小）控制，取值 `A` 为升序，
//! 其他值为降序；表头链接总是指向相反的方向。

use std::{cmp::Ordering, fs, path::Path};

use bytes::Bytes;
use chrono::{DateTime, Local};
use log::{debug, error};

use crate::{
    exception::{Exception, Outcome},
    nondisclosure::NondisclosurePolicy,
    param::SERVER_NAME,
    request::Request,
    response::{Body, Response},
    util::{escape_html, escape_path},
};

/// 显示名称的最大长度，超出部分被截断为前 23 个字符加 `..`
const NAME_WIDTH: usize = 25;
const COLUMN_WIDTH: usize = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    Name,
    Modified,
    Size,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

impl SortOrder {
    fn token(self) -> &'static str {
        match self {
            SortOrder::Ascending => "A",
            SortOrder::Descending => "D",
        }
    }

    fn reversed(self) -> Self {
        match self {
            SortOrder::Ascending => SortOrder::Descending,
            SortOrder::Descending => SortOrder::Ascending,
        }
    }
}

/// 目录中的一项。目录名以 `/` 结尾，大小记为 -1；stat 失败时修改时间为空、大小为 -1。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub name: String,
    pub mtime: Option<DateTime<Local>>,
    pub size: i64,
}

/// 从查询参数中读出排序方式，依次检查 `N`、`M`、`S`，都没有时按名称升序
pub fn sort_params(request: &Request) -> (SortKey, SortOrder) {
    let query = request.query();
    let (key, token) = if let Some(t) = query.get("N") {
        (SortKey::Name, t.as_str())
    } else if let Some(t) = query.get("M") {
        (SortKey::Modified, t.as_str())
    } else if let Some(t) = query.get("S") {
        (SortKey::Size, t.as_str())
    } else {
        (SortKey::Name, "A")
    };
    let order = if token == "A" {
        SortOrder::Ascending
    } else {
        SortOrder::Descending
    };
    (key, order)
}

/// 枚举目录项，跳过 `.`、`..` 以及命中保密名称规则的项
pub fn list_entries(
    dir: &Path,
    policy: &NondisclosurePolicy,
    id: u128,
) -> Result<Vec<Entry>, Exception> {
    let read_dir = fs::read_dir(dir).map_err(|e| {
        error!("[ID{}]无法读取目录{}: {}", id, dir.display(), e);
        Exception::InternalServerError(format!("cannot read directory `{}'", dir.display()))
    })?;

    let mut entries = Vec::new();
    for dirent in read_dir {
        let dirent = match dirent {
            Ok(d) => d,
            Err(e) => {
                debug!("[ID{}]读取目录项失败: {}", id, e);
                continue;
            }
        };
        let name = dirent.file_name().to_string_lossy().into_owned();
        if name == "." || name == ".." || policy.matches(&name) {
            continue;
        }
        // 跟随符号链接，与直接访问该文件时看到的元数据一致
        let entry = match fs::metadata(dirent.path()) {
            Ok(meta) if meta.is_dir() => Entry {
                name: name + "/",
                mtime: meta.modified().ok().map(DateTime::<Local>::from),
                size: -1,
            },
            Ok(meta) => Entry {
                name,
                mtime: meta.modified().ok().map(DateTime::<Local>::from),
                size: i64::try_from(meta.len()).unwrap_or(i64::MAX),
            },
            Err(e) => {
                debug!("[ID{}]无法获取{}的元数据: {}", id, dirent.path().display(), e);
                Entry {
                    name,
                    mtime: None,
                    size: -1,
                }
            }
        };
        entries.push(entry);
    }
    Ok(entries)
}

/// 稳定排序：排序值相同的项保持枚举顺序
pub fn sort_entries(entries: &mut [Entry], key: SortKey, order: SortOrder) {
    let compare = |a: &Entry, b: &Entry| -> Ordering {
        match key {
            SortKey::Name => a.name.cmp(&b.name),
            SortKey::Modified => a.mtime.cmp(&b.mtime),
            SortKey::Size => a.size.cmp(&b.size),
        }
    };
    match order {
        SortOrder::Ascending => entries.sort_by(compare),
        SortOrder::Descending => entries.sort_by(|a, b| compare(b, a)),
    }
}

fn display_name(name: &str) -> String {
    if name == ".." {
        "Parent Directory".to_string()
    } else if name.chars().count() > NAME_WIDTH {
        let head: String = name.chars().take(NAME_WIDTH - 2).collect();
        head + ".."
    } else {
        name.to_string()
    }
}

/// 生成目录页并写入响应，状态码为 200
pub fn render(
    request: &Request,
    response: &mut Response,
    dir: &Path,
    policy: &NondisclosurePolicy,
) -> Result<Outcome, Exception> {
    let id = request.id();
    let (key, order) = sort_params(request);
    let mut entries = list_entries(dir, policy, id)?;
    sort_entries(&mut entries, key, order);
    debug!(
        "[ID{}]目录列表{}: {}项，排序{:?} {:?}",
        id,
        dir.display(),
        entries.len(),
        key,
        order
    );

    let parent_mtime = fs::metadata(dir.join(".."))
        .and_then(|m| m.modified())
        .ok()
        .map(DateTime::<Local>::from);
    entries.insert(
        0,
        Entry {
            name: "..".to_string(),
            mtime: parent_mtime,
            size: -1,
        },
    );

    let title = escape_html(request.path());
    let flip = order.reversed().token();
    let mut html = format!(
        "<!DOCTYPE HTML PUBLIC \"-//W3C//DTD HTML 3.2 Final//EN\">\n\
         <HTML>\n  <HEAD><TITLE>Index of {title}</TITLE></HEAD>\n  <BODY>\n    <H1>Index of {title}</H1>\n"
    );
    html.push_str("<PRE>\n");
    html.push_str(&format!(
        " <A HREF=\"?N={flip}\">Name</A>                          \
         <A HREF=\"?M={flip}\">Last modified</A>         \
         <A HREF=\"?S={flip}\">Size</A>\n"
    ));
    html.push_str("<HR>\n");

    for entry in &entries {
        let dname = display_name(&entry.name);
        html.push_str(&format!(
            " <A HREF=\"{}\">{}</A>",
            escape_path(&entry.name),
            escape_html(&dname)
        ));
        html.push_str(&" ".repeat(COLUMN_WIDTH.saturating_sub(dname.chars().count())));
        match entry.mtime {
            Some(t) => html.push_str(&t.format("%Y/%m/%d %H:%M      ").to_string()),
            None => html.push_str(&" ".repeat(22)),
        }
        if entry.size >= 0 {
            html.push_str(&entry.size.to_string());
        } else {
            html.push('-');
        }
        html.push('\n');
    }
    html.push_str("</PRE><HR>");
    html.push_str(&format!(
        "\n    <ADDRESS>\n     {}<BR>\n     at {}\n    </ADDRESS>\n  </BODY>\n</HTML>\n",
        escape_html(SERVER_NAME),
        escape_html(request.host().unwrap_or_default())
    ));

    response
        .set_code(200)
        .set_header("Content-Type", "text/html; charset=utf-8")
        .set_body(Body::Bytes(Bytes::from(html)));
    Ok(Outcome::Ok)
}
