// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! 静态文件处理器：没有后缀处理器认领的普通文件都由它提供。

use std::{
    fs::{self, File},
    io,
    path::Path,
};

use chrono::{DateTime, Utc};
use log::{debug, error};

use crate::{
    conditional::{etag_for, not_modified},
    exception::{Exception, Outcome},
    handler::Handler,
    param::HttpRequestMethod,
    range::serve_range,
    request::Request,
    response::{Body, Response},
    util::{format_http_date, mime_type},
};

/// 每次请求都重新 stat 文件，然后依次决定 304、206 或 200。
#[derive(Debug, Default, Clone, Copy)]
pub struct StaticFileHandler;

impl StaticFileHandler {
    fn do_get(
        &self,
        request: &mut Request,
        response: &mut Response,
        local_path: &Path,
    ) -> Result<Outcome, Exception> {
        let id = request.id();
        let metadata = fs::metadata(local_path).map_err(|e| io_error(e, request, local_path))?;
        let mtime = metadata
            .modified()
            .map_err(|e| io_error(e, request, local_path))?;
        let etag = etag_for(&metadata);
        response.set_header("ETag", &etag);

        if not_modified(request, mtime, &etag) {
            debug!("[ID{}]{}未修改，返回304", id, local_path.display());
            response.set_code(304).set_body(Body::Empty);
            return Ok(Outcome::NotModified);
        }

        let mime = mime_type(&local_path.to_string_lossy());
        if request.header("range").is_some() {
            return serve_range(request, response, local_path, metadata.len(), mime);
        }

        let file = File::open(local_path).map_err(|e| io_error(e, request, local_path))?;
        debug!(
            "[ID{}]完整返回{}，{}字节，类型{}",
            id,
            local_path.display(),
            metadata.len(),
            mime
        );
        response
            .set_code(200)
            .set_header("Content-Type", mime)
            .set_header("Content-Length", metadata.len())
            .set_header(
                "Last-Modified",
                format_http_date(&DateTime::<Utc>::from(mtime)),
            )
            .set_body(Body::File {
                file,
                length: metadata.len(),
            });
        Ok(Outcome::Ok)
    }
}

impl Handler for StaticFileHandler {
    fn service(
        &self,
        request: &mut Request,
        response: &mut Response,
        local_path: &Path,
    ) -> Result<Outcome, Exception> {
        match request.method() {
            HttpRequestMethod::Get | HttpRequestMethod::Head => {
                self.do_get(request, response, local_path)
            }
            HttpRequestMethod::Post => Err(Exception::MethodNotAllowed(format!(
                "unsupported method `POST' for `{}'.",
                request.path()
            ))),
            HttpRequestMethod::Options => {
                response
                    .set_code(200)
                    .set_header("Allow", "GET, HEAD, OPTIONS")
                    .set_body(Body::Empty);
                Ok(Outcome::Ok)
            }
        }
    }
}

/// stat 成功之后文件消失按 404 处理，其余 I/O 错误按 500 处理
fn io_error(e: io::Error, request: &Request, local_path: &Path) -> Exception {
    if e.kind() == io::ErrorKind::NotFound {
        debug!("[ID{}]文件{}已不存在", request.id(), local_path.display());
        Exception::NotFound(format!("`{}' not found.", request.path()))
    } else {
        error!(
            "[ID{}]访问文件{}失败: {}",
            request.id(),
            local_path.display(),
            e
        );
        Exception::InternalServerError(format!("cannot access `{}'", request.path()))
    }
}
