// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 挂载点文件服务
//!
//! `FileHandler` 把一个本地目录挂载到 URL 空间中，负责：
//! 1. UserDir：`/~user/...` 被映射到用户家目录下的子目录（只对当前请求生效）。
//! 2. 路径解析，之后按后缀选择处理器，默认使用 [`StaticFileHandler`]。
//! 3. 按请求方法决定解析不到文件时的行为：GET/HEAD 回退到目录列表，
//!    POST 返回 404，OPTIONS 交回宿主服务器。

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use bytes::Bytes;
use lazy_static::lazy_static;
use log::{debug, info};
use regex::Regex;

use crate::{
    config::{Callback, MountOptions},
    exception::{Exception, Outcome},
    handler::{get_handler, Handler, HandlerTable},
    listing,
    nondisclosure::NondisclosurePolicy,
    param::HttpRequestMethod,
    request::Request,
    resolver::{PathResolver, Resolved},
    response::{Body, Response},
    static_file::StaticFileHandler,
    util::{escape_path, HtmlBuilder},
};

lazy_static! {
    static ref USER_DIR: Regex = Regex::new(r"^(/~([^/]+))").unwrap();
}

/// 根据用户名查找家目录
pub type HomeLookup = Arc<dyn Fn(&str) -> Option<PathBuf> + Send + Sync>;

pub struct FileHandler {
    root: PathBuf,
    options: MountOptions,
    policy: NondisclosurePolicy,
    global: Arc<HandlerTable>,
    home_lookup: HomeLookup,
}

impl FileHandler {
    /// `global` 是宿主进程持有的全局后缀处理器表，可以被多个挂载点共享。
    pub fn new<P: AsRef<Path>>(root: P, options: MountOptions, global: Arc<HandlerTable>) -> Self {
        let root = root.as_ref();
        let root = std::path::absolute(root).unwrap_or_else(|_| root.to_path_buf());
        let policy = NondisclosurePolicy::new(&options.nondisclosure_name);
        info!("挂载目录{}，目录列表{}", root.display(), options.fancy_indexing);
        Self {
            root,
            options,
            policy,
            global,
            home_lookup: Arc::new(lookup_home),
        }
    }

    /// 替换 UserDir 使用的家目录查找函数
    pub fn with_home_lookup<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<PathBuf> + Send + Sync + 'static,
    {
        self.home_lookup = Arc::new(lookup);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn options(&self) -> &MountOptions {
        &self.options
    }

    /// 挂载点自己的处理器表
    pub fn handler_table(&self) -> &HandlerTable {
        &self.options.handler_table
    }

    pub fn service(&self, request: &mut Request, response: &mut Response) -> Result<Outcome, Exception> {
        let user_root = self.user_dir_root(request);
        let root = user_root.as_deref().unwrap_or(&self.root);

        match request.method() {
            HttpRequestMethod::Get | HttpRequestMethod::Head => {
                match self.exec_handler(request, response, root)? {
                    Some(outcome) => Ok(outcome),
                    None => self.set_dir_list(request, response),
                }
            }
            HttpRequestMethod::Post => match self.exec_handler(request, response, root)? {
                Some(outcome) => Ok(outcome),
                None => Err(Exception::NotFound(format!("`{}' not found.", request.path()))),
            },
            HttpRequestMethod::Options => match self.exec_handler(request, response, root)? {
                Some(outcome) => Ok(outcome),
                None => Ok(Outcome::Declined),
            },
        }
    }

    /// 挂载在 `/` 上且请求以 `/~user` 开头时，返回用户目录作为本次请求的根目录。
    fn user_dir_root(&self, request: &mut Request) -> Option<PathBuf> {
        let user_dir = self.options.user_dir.as_deref()?;
        if !request.script_name().is_empty() {
            return None;
        }
        let (script_name, user, path_info) = {
            let caps = USER_DIR.captures(request.path_info())?;
            let whole = caps.get(0)?;
            (
                caps[1].to_string(),
                caps[2].to_string(),
                request.path_info()[whole.end()..].to_string(),
            )
        };
        match (self.home_lookup)(&user) {
            Some(home) => {
                debug!("[ID{}]UserDir：{}映射到{}", request.id(), user, home.display());
                request.set_script_name(script_name);
                request.set_path_info(path_info);
                Some(home.join(user_dir))
            }
            None => {
                debug!("[ID{}]查找用户{}的家目录失败", request.id(), user);
                None
            }
        }
    }

    /// 解析到文件时交给对应的处理器并返回其结果；停在目录上时返回 `None`。
    fn exec_handler(
        &self,
        request: &mut Request,
        response: &mut Response,
        root: &Path,
    ) -> Result<Option<Outcome>, Exception> {
        let resolver = PathResolver::new(&self.options, &self.policy);
        let resolved = resolver.resolve(request, response, root)?;
        if resolved == Resolved::Directory {
            call_callback(&self.options.handler_callback, request, response);
            return Ok(None);
        }

        let handler = get_handler(
            request.script_name(),
            &self.options.handler_table,
            &self.global,
            request.id(),
        );
        call_callback(&self.options.handler_callback, request, response);
        let local_path = response.filename().map(Path::to_path_buf).unwrap_or_default();
        let outcome = match handler {
            Some(h) => h.service(request, response, &local_path)?,
            None => StaticFileHandler.service(request, response, &local_path)?,
        };
        Ok(Some(outcome))
    }

    fn set_dir_list(&self, request: &mut Request, response: &mut Response) -> Result<Outcome, Exception> {
        if let Some(outcome) = redirect_to_directory_uri(request, response) {
            return Ok(outcome);
        }
        if !self.options.fancy_indexing {
            debug!("[ID{}]{}未开启目录列表", request.id(), request.path());
            return Err(Exception::Forbidden(format!(
                "no access permission to `{}'",
                request.path()
            )));
        }
        let dir = response.filename().map(Path::to_path_buf).unwrap_or_default();
        listing::render(request, response, &dir, &self.policy)
    }
}

/// 目录地址缺少结尾的 `/` 时返回 301，查询字符串原样保留
fn redirect_to_directory_uri(request: &Request, response: &mut Response) -> Option<Outcome> {
    if request.path().ends_with('/') {
        return None;
    }
    let mut location = escape_path(request.path());
    location.push('/');
    if let Some(query) = request.query_string() {
        location.push('?');
        location.push_str(query);
    }
    debug!("[ID{}]目录重定向到{}", request.id(), location);
    let html = HtmlBuilder::from_status_code(301, Some(&location)).build();
    response
        .set_code(301)
        .set_header("Location", &location)
        .set_header("Content-Type", "text/html; charset=utf-8")
        .set_body(Body::Bytes(Bytes::from(html)));
    Some(Outcome::Redirect(location))
}

fn call_callback(callback: &Option<Callback>, request: &mut Request, response: &mut Response) {
    if let Some(cb) = callback {
        cb(request, response);
    }
}

#[cfg(unix)]
fn lookup_home(user: &str) -> Option<PathBuf> {
    match nix::unistd::User::from_name(user) {
        Ok(Some(u)) => Some(u.dir),
        _ => None,
    }
}

#[cfg(not(unix))]
fn lookup_home(_user: &str) -> Option<PathBuf> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::MockHandler;
    use std::{
        fs,
        sync::atomic::{AtomicUsize, Ordering},
    };

    fn tree() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("pub")).unwrap();
        fs::write(dir.path().join("pub/a.txt"), b"aaa").unwrap();
        fs::write(dir.path().join("app.cgi"), b"#!/bin/sh").unwrap();
        dir
    }

    fn mount(root: &Path, options: MountOptions) -> FileHandler {
        FileHandler::new(root, options, Arc::new(HandlerTable::new()))
    }

    fn request(method: HttpRequestMethod, target: &str) -> Request {
        Request::new(method, target)
    }

    fn serve(handler: &FileHandler, mut request: Request) -> (Result<Outcome, Exception>, Response, Request) {
        let mut response = Response::new();
        let result = handler.service(&mut request, &mut response);
        (result, response, request)
    }

    #[test]
    fn test_get_file() {
        let dir = tree();
        let handler = mount(dir.path(), MountOptions::default());
        let (result, response, _) = serve(&handler, request(HttpRequestMethod::Get, "/pub/a.txt"));
        assert_eq!(result, Ok(Outcome::Ok));
        assert_eq!(response.header("content-length"), Some("3"));
    }

    #[test]
    fn test_directory_redirect_comes_before_forbidden() {
        let dir = tree();
        let handler = mount(dir.path(), MountOptions::default());
        let (result, response, _) = serve(&handler, request(HttpRequestMethod::Get, "/pub?S=D"));
        assert_eq!(result, Ok(Outcome::Redirect("/pub/?S=D".to_string())));
        assert_eq!(response.status_code(), 301);
        assert_eq!(response.header("location"), Some("/pub/?S=D"));
    }

    #[test]
    fn test_listing_disabled_is_forbidden() {
        let dir = tree();
        let handler = mount(dir.path(), MountOptions::default());
        let (result, _, _) = serve(&handler, request(HttpRequestMethod::Get, "/pub/"));
        assert!(matches!(result, Err(Exception::Forbidden(_))));
    }

    #[test]
    fn test_listing_enabled() {
        let dir = tree();
        let handler = mount(dir.path(), MountOptions::default().with_fancy_indexing(true));
        let (result, response, _) = serve(&handler, request(HttpRequestMethod::Get, "/pub/"));
        assert_eq!(result, Ok(Outcome::Ok));
        assert_eq!(response.header("content-type"), Some("text/html; charset=utf-8"));
    }

    #[test]
    fn test_post_to_directory_is_not_found() {
        let dir = tree();
        let handler = mount(dir.path(), MountOptions::default().with_fancy_indexing(true));
        let (result, _, _) = serve(&handler, request(HttpRequestMethod::Post, "/pub/"));
        assert!(matches!(result, Err(Exception::NotFound(_))));
    }

    #[test]
    fn test_post_to_static_file_is_not_allowed() {
        let dir = tree();
        let handler = mount(dir.path(), MountOptions::default());
        let (result, _, _) = serve(&handler, request(HttpRequestMethod::Post, "/pub/a.txt"));
        assert!(matches!(result, Err(Exception::MethodNotAllowed(_))));
    }

    #[test]
    fn test_options_on_directory_is_declined() {
        let dir = tree();
        let handler = mount(dir.path(), MountOptions::default());
        let (result, _, _) = serve(&handler, request(HttpRequestMethod::Options, "/pub/"));
        assert_eq!(result, Ok(Outcome::Declined));
    }

    #[test]
    fn test_global_handler_dispatch() {
        let dir = tree();
        let global = Arc::new(HandlerTable::new());
        let mut mock = MockHandler::new();
        mock.expect_service()
            .withf(|request, _, path| {
                request.script_name() == "/app.cgi" && path.ends_with("app.cgi")
            })
            .times(1)
            .returning(|_, _, _| Ok(Outcome::Ok));
        global.add_handler("cgi", mock);

        let handler = FileHandler::new(dir.path(), MountOptions::default(), Arc::clone(&global));
        let (result, _, _) = serve(&handler, request(HttpRequestMethod::Post, "/app.cgi"));
        assert_eq!(result, Ok(Outcome::Ok));
    }

    /// 挂载表中的处理器在运行期间注册后立即生效
    #[test]
    fn test_mount_handler_registered_after_mount() {
        let dir = tree();
        let handler = mount(dir.path(), MountOptions::default());
        let mut mock = MockHandler::new();
        mock.expect_service()
            .times(1)
            .returning(|_, _, _| Ok(Outcome::Declined));
        handler.handler_table().add_handler("txt", mock);

        let (result, _, _) = serve(&handler, request(HttpRequestMethod::Options, "/pub/a.txt"));
        assert_eq!(result, Ok(Outcome::Declined));
    }

    #[test]
    fn test_handler_callback_runs_for_files_and_directories() {
        let dir = tree();
        let count = Arc::new(AtomicUsize::new(0));
        let options = {
            let count = Arc::clone(&count);
            MountOptions::default().with_handler_callback(move |_, _| {
                count.fetch_add(1, Ordering::SeqCst);
            })
        };
        let handler = mount(dir.path(), options);
        serve(&handler, request(HttpRequestMethod::Get, "/pub/a.txt")).0.unwrap();
        let _ = serve(&handler, request(HttpRequestMethod::Get, "/pub/"));
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_user_dir_remap() {
        let dir = tree();
        let home = tempfile::tempdir().unwrap();
        fs::create_dir(home.path().join("public_html")).unwrap();
        fs::write(home.path().join("public_html/me.txt"), b"mine").unwrap();

        let home_path = home.path().to_path_buf();
        let handler = mount(dir.path(), MountOptions::default().with_user_dir("public_html"))
            .with_home_lookup(move |user| (user == "alice").then(|| home_path.clone()));

        let (result, response, request) =
            serve(&handler, Request::new(HttpRequestMethod::Get, "/~alice/me.txt"));
        assert_eq!(result, Ok(Outcome::Ok));
        assert_eq!(response.header("content-length"), Some("4"));
        assert_eq!(request.script_name(), "/~alice/me.txt");
        // 挂载根目录没有被改写
        assert_eq!(handler.root(), std::path::absolute(dir.path()).unwrap());
    }

    /// 查找用户失败时按原根目录继续解析
    #[test]
    fn test_user_dir_lookup_failure_keeps_root() {
        let dir = tree();
        fs::create_dir(dir.path().join("~bob")).unwrap();
        fs::write(dir.path().join("~bob/x.txt"), b"x").unwrap();
        let handler = mount(dir.path(), MountOptions::default().with_user_dir("public_html"))
            .with_home_lookup(|_| None);

        let (result, _, request) = serve(&handler, Request::new(HttpRequestMethod::Get, "/~bob/x.txt"));
        assert_eq!(result, Ok(Outcome::Ok));
        assert_eq!(request.script_name(), "/~bob/x.txt");
    }

    #[test]
    fn test_user_dir_only_at_root_mount() {
        let dir = tree();
        let handler = mount(dir.path(), MountOptions::default().with_user_dir("public_html"))
            .with_home_lookup(|_| panic!("lookup must not run for a nested mount"));
        let request = Request::new(HttpRequestMethod::Get, "/site/~carol/x").mounted_at("/site");
        let (result, _, _) = serve(&handler, request);
        assert!(matches!(result, Err(Exception::NotFound(_))));
    }
}
