// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 后缀处理器模块
//!
//! 按文件后缀把解析出的文件交给不同的处理器。处理器表有两层：
//! 挂载点自己的表在前，宿主进程持有的全局表在后，都查不到时使用静态文件处理器。
//! 两层表都可以在运行期间并发地增删与查找。

use std::{fmt, path::Path, sync::Arc};

use dashmap::DashMap;
use log::debug;

use crate::{
    exception::{Exception, Outcome},
    request::Request,
    response::Response,
    util::suffixes,
};

/// 内容处理器。`local_path` 是解析阶段得到的本地文件路径。
#[cfg_attr(test, mockall::automock)]
pub trait Handler: Send + Sync {
    fn service(
        &self,
        request: &mut Request,
        response: &mut Response,
        local_path: &Path,
    ) -> Result<Outcome, Exception>;
}

impl<F> Handler for F
where
    F: Fn(&mut Request, &mut Response, &Path) -> Result<Outcome, Exception> + Send + Sync,
{
    fn service(
        &self,
        request: &mut Request,
        response: &mut Response,
        local_path: &Path,
    ) -> Result<Outcome, Exception> {
        self(request, response, local_path)
    }
}

/// 后缀（小写、不含点）到处理器的映射
#[derive(Default, Clone)]
pub struct HandlerTable {
    handlers: DashMap<String, Arc<dyn Handler>>,
}

impl HandlerTable {
    pub fn new() -> Self {
        Self {
            handlers: DashMap::new(),
        }
    }

    pub fn add_handler<H: Handler + 'static>(&self, suffix: &str, handler: H) {
        self.add_shared(suffix, Arc::new(handler));
    }

    /// 注册一个已经共享的处理器，同名后缀的旧处理器被替换
    pub fn add_shared(&self, suffix: &str, handler: Arc<dyn Handler>) {
        self.handlers.insert(normalize(suffix), handler);
    }

    pub fn remove_handler(&self, suffix: &str) -> Option<Arc<dyn Handler>> {
        self.handlers.remove(&normalize(suffix)).map(|(_, h)| h)
    }

    /// 查找处理器。返回的是克隆出来的 `Arc`，不会在调用方手里持有表的锁。
    pub fn get(&self, suffix: &str) -> Option<Arc<dyn Handler>> {
        self.handlers
            .get(&normalize(suffix))
            .map(|entry| Arc::clone(entry.value()))
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl fmt::Debug for HandlerTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut suffixes: Vec<String> = self.handlers.iter().map(|e| e.key().clone()).collect();
        suffixes.sort();
        f.debug_struct("HandlerTable")
            .field("suffixes", &suffixes)
            .finish()
    }
}

fn normalize(suffix: &str) -> String {
    suffix.trim_start_matches('.').to_ascii_lowercase()
}

/// 根据 `script_name` 的主后缀与次后缀选出处理器。
///
/// 查找顺序：挂载表[主]、挂载表[次]、全局表[主]、全局表[次]。都没有时返回 `None`，
/// 由调用方使用静态文件处理器。
pub fn get_handler(
    script_name: &str,
    mount: &HandlerTable,
    global: &HandlerTable,
    id: u128,
) -> Option<Arc<dyn Handler>> {
    let (primary, secondary) = suffixes(script_name);
    let lookup = |table: &HandlerTable, suffix: &Option<String>| {
        suffix.as_deref().and_then(|s| table.get(s))
    };
    let found = lookup(mount, &primary)
        .map(|h| (h, "挂载表", &primary))
        .or_else(|| lookup(mount, &secondary).map(|h| (h, "挂载表", &secondary)))
        .or_else(|| lookup(global, &primary).map(|h| (h, "全局表", &primary)))
        .or_else(|| lookup(global, &secondary).map(|h| (h, "全局表", &secondary)));
    match found {
        Some((handler, table, suffix)) => {
            debug!(
                "[ID{}]{}使用{}中后缀{:?}的处理器",
                id, script_name, table, suffix
            );
            Some(handler)
        }
        None => {
            debug!("[ID{}]{}使用静态文件处理器", id, script_name);
            None
        }
    }
}
