// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 配置模块
//!
//! - [`Config`]：宿主服务器的运行参数，从 TOML 文件读取。
//! - [`MountOptions`]：一个挂载点的文件服务选项。可序列化的部分来自配置文件的
//!   `[mount]` 表，处理器表与三个回调只能以编程方式设置。

use std::{fmt, fs::File, io::prelude::*, sync::Arc};

use log::{error, info};
use serde_derive::{Deserialize, Serialize};

use crate::{handler::HandlerTable, request::Request, response::Response};

/// 解析过程中在特定位置被同步调用的钩子
pub type Callback = Arc<dyn Fn(&mut Request, &mut Response) + Send + Sync>;

#[derive(Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct MountOptions {
    /// 找不到索引文件时是否生成目录列表
    pub fancy_indexing: bool,
    /// 按顺序尝试的索引文件名
    pub directory_index: Vec<String>,
    /// 允许参与语言变体协商的语言标签
    pub acceptable_languages: Vec<String>,
    /// 保密名称的 glob 模式
    pub nondisclosure_name: Vec<String>,
    /// 开启后 `/~user/...` 被映射到 `<user 的家目录>/<user_dir>/...`
    pub user_dir: Option<String>,
    /// 挂载点自己的后缀处理器表，优先于全局表
    #[serde(skip)]
    pub handler_table: Arc<HandlerTable>,
    #[serde(skip)]
    pub directory_callback: Option<Callback>,
    #[serde(skip)]
    pub file_callback: Option<Callback>,
    #[serde(skip)]
    pub handler_callback: Option<Callback>,
}

impl Default for MountOptions {
    fn default() -> Self {
        Self {
            fancy_indexing: false,
            directory_index: vec!["index.html".to_string(), "index.htm".to_string()],
            acceptable_languages: Vec::new(),
            nondisclosure_name: vec![".ht*".to_string(), "*~".to_string()],
            user_dir: None,
            handler_table: Arc::new(HandlerTable::new()),
            directory_callback: None,
            file_callback: None,
            handler_callback: None,
        }
    }
}

impl fmt::Debug for MountOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MountOptions")
            .field("fancy_indexing", &self.fancy_indexing)
            .field("directory_index", &self.directory_index)
            .field("acceptable_languages", &self.acceptable_languages)
            .field("nondisclosure_name", &self.nondisclosure_name)
            .field("user_dir", &self.user_dir)
            .field("handler_table", &self.handler_table)
            .field("directory_callback", &self.directory_callback.is_some())
            .field("file_callback", &self.file_callback.is_some())
            .field("handler_callback", &self.handler_callback.is_some())
            .finish()
    }
}

impl MountOptions {
    pub fn with_fancy_indexing(mut self, enabled: bool) -> Self {
        self.fancy_indexing = enabled;
        self
    }

    pub fn with_acceptable_languages<S: ToString>(mut self, langs: &[S]) -> Self {
        self.acceptable_languages = langs.iter().map(|l| l.to_string()).collect();
        self
    }

    pub fn with_nondisclosure_name<S: ToString>(mut self, patterns: &[S]) -> Self {
        self.nondisclosure_name = patterns.iter().map(|p| p.to_string()).collect();
        self
    }

    pub fn with_directory_index<S: ToString>(mut self, names: &[S]) -> Self {
        self.directory_index = names.iter().map(|n| n.to_string()).collect();
        self
    }

    pub fn with_user_dir(mut self, dir: &str) -> Self {
        self.user_dir = Some(dir.to_string());
        self
    }

    pub fn with_directory_callback<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut Request, &mut Response) + Send + Sync + 'static,
    {
        self.directory_callback = Some(Arc::new(f));
        self
    }

    pub fn with_file_callback<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut Request, &mut Response) + Send + Sync + 'static,
    {
        self.file_callback = Some(Arc::new(f));
        self
    }

    pub fn with_handler_callback<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut Request, &mut Response) + Send + Sync + 'static,
    {
        self.handler_callback = Some(Arc::new(f));
        self
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Config {
    www_root: String,
    port: u16,
    worker_threads: usize,
    local: bool,
    #[serde(default = "default_chunk_size")]
    chunk_size: usize,
    #[serde(default)]
    mount: MountOptions,
}

fn default_chunk_size() -> usize {
    262144 // 256KB
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Self {
        Self {
            www_root: ".".to_string(),
            port: 7878,
            worker_threads: 0,
            local: true,
            chunk_size: default_chunk_size(),
            mount: MountOptions::default(),
        }
    }

    /// 从 TOML 文件读取配置。文件不存在或内容无法解析时记录错误并使用默认配置。
    pub fn from_toml(filename: &str) -> Self {
        let mut str_val = String::new();
        let read = File::open(filename).and_then(|mut f| f.read_to_string(&mut str_val));
        let mut raw_config = match read {
            Ok(_) => Self::from_toml_str(&str_val),
            Err(e) => {
                error!("无法读取配置文件{}：{}，使用默认配置", filename, e);
                Config::new()
            }
        };
        if raw_config.worker_threads == 0 {
            raw_config.worker_threads = num_cpus::get();
        }
        if raw_config.chunk_size == 0 {
            info!("chunk_size被设置为0，改为默认值{}", default_chunk_size());
            raw_config.chunk_size = default_chunk_size();
        }
        raw_config
    }

    fn from_toml_str(text: &str) -> Self {
        match toml::from_str(text) {
            Ok(t) => t,
            Err(e) => {
                error!("无法成功从配置文件构建配置对象：{}，使用默认配置", e);
                Config::new()
            }
        }
    }
}

impl Config {
    pub fn www_root(&self) -> &str {
        &self.www_root
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn worker_threads(&self) -> usize {
        self.worker_threads
    }

    pub fn local(&self) -> bool {
        self.local
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn mount(&self) -> &MountOptions {
        &self.mount
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mount_defaults() {
        let options = MountOptions::default();
        assert!(!options.fancy_indexing);
        assert_eq!(options.directory_index, vec!["index.html", "index.htm"]);
        assert_eq!(options.nondisclosure_name, vec![".ht*", "*~"]);
        assert!(options.acceptable_languages.is_empty());
        assert!(options.user_dir.is_none());
        assert!(options.handler_table.is_empty());
    }

    #[test]
    fn test_parse_full_config() {
        let config = Config::from_toml_str(
            r#"
            www_root = "/srv/www"
            port = 8080
            worker_threads = 4
            local = false
            chunk_size = 4096

            [mount]
            fancy_indexing = true
            acceptable_languages = ["en", "ja"]
            nondisclosure_name = [".git*"]
            user_dir = "public_html"
            "#,
        );
        assert_eq!(config.www_root(), "/srv/www");
        assert_eq!(config.port(), 8080);
        assert_eq!(config.worker_threads(), 4);
        assert!(!config.local());
        assert_eq!(config.chunk_size(), 4096);

        let mount = config.mount();
        assert!(mount.fancy_indexing);
        assert_eq!(mount.acceptable_languages, vec!["en", "ja"]);
        assert_eq!(mount.nondisclosure_name, vec![".git*"]);
        assert_eq!(mount.user_dir.as_deref(), Some("public_html"));
        // 未出现的键保持默认值
        assert_eq!(mount.directory_index, vec!["index.html", "index.htm"]);
    }

    #[test]
    fn test_missing_mount_table_uses_defaults() {
        let config = Config::from_toml_str(
            "www_root = \".\"\nport = 7878\nworker_threads = 0\nlocal = true\n",
        );
        assert_eq!(config.chunk_size(), 262144);
        assert!(!config.mount().fancy_indexing);
    }

    #[test]
    fn test_invalid_config_falls_back() {
        let config = Config::from_toml_str("port = \"not a number\"");
        assert_eq!(config.port(), 7878);
    }

    #[test]
    fn test_missing_file_falls_back() {
        let config = Config::from_toml("/nonexistent/development.toml");
        assert_eq!(config.www_root(), ".");
        assert!(config.worker_threads() > 0);
    }
}
