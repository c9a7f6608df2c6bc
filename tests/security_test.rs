// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

#[cfg(test)]
mod security_tests {
    //! # 安全回归测试
    //!
    //! 模拟常见的越权访问手法，验证挂载点不会泄露根目录之外的内容或保密文件：
    //! - 路径穿越（明文与百分号编码）
    //! - 空字节注入
    //! - 保密名称（`.ht*`、备份文件、`.git*`）
    //! - 目录列表中的 HTML 注入

    use std::{fs, sync::Arc};

    use filehandler::{
        Exception, FileHandler, HandlerTable, HttpRequestMethod, MountOptions, Outcome, Request,
        Response,
    };

    /// 根目录放在临时目录的子目录中，外层放一个不应被访问到的文件
    fn mount(options: MountOptions) -> (tempfile::TempDir, FileHandler) {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("outside.txt"), b"outside").unwrap();
        let root = dir.path().join("www");
        fs::create_dir(&root).unwrap();
        fs::write(root.join("index.html"), b"<h1>home</h1>").unwrap();
        fs::write(root.join(".htpasswd"), b"admin:secret").unwrap();
        fs::write(root.join("config.php~"), b"<?php $pw = 1;").unwrap();
        fs::create_dir(root.join(".git")).unwrap();
        fs::write(root.join(".git/HEAD"), b"ref: refs/heads/main").unwrap();
        fs::create_dir(root.join("pub")).unwrap();
        fs::write(root.join("pub/<i onmouseover=x>.txt"), b"x").unwrap();
        let handler = FileHandler::new(&root, options, Arc::new(HandlerTable::new()));
        (dir, handler)
    }

    fn status_of(handler: &FileHandler, raw: &str) -> u16 {
        let mut request = match Request::try_from(raw.as_bytes(), 0) {
            Ok(r) => r,
            Err(e) => return e.status_code(),
        };
        let mut response = Response::new();
        match handler.service(&mut request, &mut response) {
            Ok(outcome) => outcome.status_code().unwrap_or(204),
            Err(e) => e.status_code(),
        }
    }

    /// ## 路径穿越
    /// `..` 段无论以明文还是百分号编码出现都返回 404
    #[test]
    fn test_path_traversal() {
        let (_dir, handler) = mount(MountOptions::default());
        let attacks = [
            "GET /../outside.txt HTTP/1.1\r\n\r\n",
            "GET /pub/../../outside.txt HTTP/1.1\r\n\r\n",
            "GET /%2e%2e/outside.txt HTTP/1.1\r\n\r\n",
            "GET /pub/%2E%2E%2F%2E%2E%2Foutside.txt HTTP/1.1\r\n\r\n",
            "GET /./index.html HTTP/1.1\r\n\r\n",
        ];
        for attack in attacks {
            assert_eq!(status_of(&handler, attack), 404, "{:?}", attack);
        }
    }

    /// ## 空字节注入
    #[test]
    fn test_null_byte_injection() {
        let (_dir, handler) = mount(MountOptions::default());
        assert_eq!(
            status_of(&handler, "GET /index.html%00.txt HTTP/1.1\r\n\r\n"),
            404
        );
    }

    /// ## 默认保密名称
    #[test]
    fn test_default_nondisclosure_names() {
        let (_dir, handler) = mount(MountOptions::default());
        assert_eq!(status_of(&handler, "GET /.htpasswd HTTP/1.1\r\n\r\n"), 404);
        assert_eq!(status_of(&handler, "GET /config.php~ HTTP/1.1\r\n\r\n"), 404);
        assert_eq!(status_of(&handler, "GET /index.html HTTP/1.1\r\n\r\n"), 200);
    }

    /// ## `.git*` 出现在路径任意位置
    #[test]
    fn test_git_directory_hidden() {
        let options = MountOptions::default()
            .with_fancy_indexing(true)
            .with_nondisclosure_name(&[".ht*", "*~", ".git*"]);
        let (_dir, handler) = mount(options);
        assert_eq!(status_of(&handler, "GET /.git/HEAD HTTP/1.1\r\n\r\n"), 404);
        assert_eq!(status_of(&handler, "GET /.git/ HTTP/1.1\r\n\r\n"), 404);
        assert_eq!(status_of(&handler, "POST /.git/HEAD HTTP/1.1\r\n\r\n"), 404);
    }

    /// ## 目录列表不会泄露保密文件，文件名中的 HTML 被转义
    #[test]
    fn test_listing_is_sanitized() {
        let options = MountOptions::default()
            .with_fancy_indexing(true)
            .with_nondisclosure_name(&[".ht*", "*~", ".git*"]);
        let (_dir, handler) = mount(options);

        let mut request = Request::new(HttpRequestMethod::Get, "/pub/");
        let mut response = Response::new();
        assert_eq!(handler.service(&mut request, &mut response), Ok(Outcome::Ok));
        let mut out = Vec::new();
        response.take_body().write_to(&mut out).unwrap();
        let html = String::from_utf8(out).unwrap();
        assert!(!html.contains("<i "));
        assert!(html.contains("&lt;i onmouseover=x&gt;.txt"));
        assert!(!html.contains("htpasswd"));
    }

    /// ## 禁用目录列表时返回 403
    #[test]
    fn test_listing_disabled() {
        let (_dir, handler) = mount(MountOptions::default());
        let mut request = Request::new(HttpRequestMethod::Get, "/pub/");
        let mut response = Response::new();
        assert!(matches!(
            handler.service(&mut request, &mut response),
            Err(Exception::Forbidden(_))
        ));
    }

    /// ## 只读：写方法在解析阶段就被拒绝
    #[test]
    fn test_write_methods_rejected() {
        let (_dir, handler) = mount(MountOptions::default());
        for method in ["PUT", "DELETE", "PROPFIND", "MKCOL"] {
            let raw = format!("{} /index.html HTTP/1.1\r\n\r\n", method);
            assert_eq!(status_of(&handler, &raw), 405, "{}", method);
        }
    }
}
