// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

pub mod conditional;
pub mod config;
pub mod exception;
pub mod file_handler;
pub mod handler;
pub mod listing;
pub mod nondisclosure;
pub mod param;
pub mod range;
pub mod request;
pub mod resolver;
pub mod response;
pub mod static_file;
pub mod util;

pub use config::{Callback, Config, MountOptions};
pub use exception::{Exception, Outcome};
pub use file_handler::FileHandler;
pub use handler::{Handler, HandlerTable};
pub use nondisclosure::NondisclosurePolicy;
pub use param::HttpRequestMethod;
pub use request::Request;
pub use response::{Body, BytePart, Response};
pub use static_file::StaticFileHandler;
pub use util::HtmlBuilder;
