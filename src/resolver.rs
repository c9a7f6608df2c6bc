// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 路径解析模块
//!
//! 把请求的 `path_info` 逐段映射到挂载根目录下的文件或目录。
//!
//! 1. `path_info` 被拆成若干以 `/` 开头的路径段，前面补一个空段代表根目录本身。
//! 2. 每一段先经过保密名称与路径穿越检查，命中即返回 404。
//! 3. 只要累积路径仍是目录就继续前进，被消耗的段从 `path_info` 移到 `script_name`，
//!    并调用 DirectoryCallback。
//! 4. 停下来时，如果剩下的段是 `/`，按 DirectoryIndex 查找索引文件；
//!    否则把这一段当作文件名，按语言变体规则查找。找到文件时调用 FileCallback。
//!
//! 解析结果写入 `Response::filename`，返回值表明它是文件还是目录。

use std::{
    collections::VecDeque,
    ffi::{OsStr, OsString},
    path::{Path, PathBuf},
};

use lazy_static::lazy_static;
use log::{debug, warn};
use regex::Regex;

use crate::{
    config::{Callback, MountOptions},
    exception::Exception,
    nondisclosure::NondisclosurePolicy,
    request::Request,
    response::Response,
};

lazy_static! {
    static ref SEGMENT: Regex = Regex::new(r"/[^/]*").unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolved {
    /// 解析到一个普通文件
    File,
    /// 停在一个目录上（没有找到索引文件）
    Directory,
}

pub struct PathResolver<'a> {
    options: &'a MountOptions,
    policy: &'a NondisclosurePolicy,
}

impl<'a> PathResolver<'a> {
    pub fn new(options: &'a MountOptions, policy: &'a NondisclosurePolicy) -> Self {
        Self { options, policy }
    }

    pub fn resolve(
        &self,
        request: &mut Request,
        response: &mut Response,
        root: &Path,
    ) -> Result<Resolved, Exception> {
        let mut filename: OsString = root.as_os_str().to_owned();
        response.set_filename(PathBuf::from(&filename));

        let mut path_info: VecDeque<String> = SEGMENT
            .find_iter(request.path_info())
            .map(|m| m.as_str().to_string())
            .collect();
        path_info.push_front(String::new());

        while let Some(base) = path_info.front() {
            self.check_filename(request, base)?;
            if base == "/" || !Path::new(&join(&filename, base)).is_dir() {
                break;
            }
            self.shift_path_info(request, response, &mut filename, &mut path_info, None);
            self.call_callback(&self.options.directory_callback, request, response);
        }

        if let Some(base) = path_info.front().cloned() {
            if base == "/" {
                if let Some(file) = self.search_index_file(request, &filename) {
                    self.shift_path_info(request, response, &mut filename, &mut path_info, Some(file));
                    self.call_callback(&self.options.file_callback, request, response);
                    debug!("[ID{}]解析到索引文件{}", request.id(), Path::new(&filename).display());
                    return Ok(Resolved::File);
                }
                self.shift_path_info(request, response, &mut filename, &mut path_info, None);
            } else if let Some(file) = self.search_file(request, &filename, &base) {
                self.shift_path_info(request, response, &mut filename, &mut path_info, Some(file));
                self.call_callback(&self.options.file_callback, request, response);
                debug!("[ID{}]解析到文件{}", request.id(), Path::new(&filename).display());
                return Ok(Resolved::File);
            } else {
                debug!("[ID{}]{}下找不到{}", request.id(), Path::new(&filename).display(), base);
                return Err(not_found(request));
            }
        }

        debug!("[ID{}]解析到目录{}", request.id(), Path::new(&filename).display());
        Ok(Resolved::Directory)
    }

    /// 检查单个路径段（带前导 `/`）
    fn check_filename(&self, request: &Request, segment: &str) -> Result<(), Exception> {
        let name = segment.strip_prefix('/').unwrap_or(segment);
        if name == "." || name == ".." || name.contains('\0') {
            warn!("[ID{}]请求路径{}试图穿越目录", request.id(), request.path());
            return Err(not_found(request));
        }
        if let Some(pattern) = self.policy.matching_pattern(name) {
            warn!(
                "[ID{}]请求涉及保密名称`{}'（规则{}）",
                request.id(),
                name,
                pattern
            );
            return Err(not_found(request));
        }
        Ok(())
    }

    /// 按 DirectoryIndex 的顺序查找索引文件，返回带前导 `/` 的文件名
    fn search_index_file(&self, request: &Request, dir: &OsStr) -> Option<String> {
        self.options
            .directory_index
            .iter()
            .find_map(|index| self.search_file(request, dir, &format!("/{}", index)))
    }

    /// 语言变体查找。
    ///
    /// 原名存在时直接返回；否则先按请求的 Accept-Language 顺序尝试同时被挂载点接受的语言，
    /// 再按挂载点配置的顺序尝试剩余的语言。
    fn search_file(&self, request: &Request, dir: &OsStr, basename: &str) -> Option<String> {
        let path = join(dir, basename);
        if Path::new(&path).is_file() {
            return Some(basename.to_string());
        }
        let langs = &self.options.acceptable_languages;
        if langs.is_empty() {
            return None;
        }
        let requested = request.accept_language();
        let preferred = requested.iter().filter(|lang| langs.contains(lang));
        let remaining = langs.iter().filter(|lang| !requested.contains(lang));
        preferred.chain(remaining).find_map(|lang| {
            let variant = format!("{}.{}", basename, lang);
            if Path::new(&join(dir, &variant)).is_file() {
                debug!("[ID{}]选择语言变体{}", request.id(), variant);
                Some(variant)
            } else {
                None
            }
        })
    }

    /// 把 `path_info` 的第一段移到 `script_name` 与本地路径上。
    /// `found` 是查找得到的实际文件名，可能带有语言后缀。
    fn shift_path_info(
        &self,
        request: &mut Request,
        response: &mut Response,
        filename: &mut OsString,
        path_info: &mut VecDeque<String>,
        found: Option<String>,
    ) {
        let consumed = path_info.pop_front().unwrap_or_default();
        let base = found.unwrap_or(consumed);
        request.set_path_info(path_info.iter().map(String::as_str).collect());
        request.set_script_name(format!("{}{}", request.script_name(), base));
        filename.push(&base);
        response.set_filename(PathBuf::from(&*filename));
    }

    fn call_callback(&self, callback: &Option<Callback>, request: &mut Request, response: &mut Response) {
        if let Some(cb) = callback {
            cb(request, response);
        }
    }
}

fn join(dir: &OsStr, segment: &str) -> OsString {
    let mut path = dir.to_owned();
    path.push(segment);
    path
}

fn not_found(request: &Request) -> Exception {
    Exception::NotFound(format!("`{}' not found.", request.path()))
}
