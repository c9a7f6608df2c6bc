// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 静态文件服务器
//!
//! 基于 Tokio 运行时的宿主程序，把配置中的 `www_root` 挂载到 `/`：
//! - 每个连接一个异步任务，请求报文解析后交给 [`FileHandler`] 处理
//! - 文件服务核心是同步的，放到 Tokio 的阻塞线程池中执行
//! - 文件响应体按 `chunk_size` 分块异步写出，不整体读入内存
//! - Ctrl-C 触发停机

use std::{
    io::SeekFrom,
    net::{Ipv4Addr, SocketAddrV4},
    sync::Arc,
    time::Instant,
};

use filehandler::{
    Body, Config, Exception, FileHandler, HandlerTable, HttpRequestMethod, Outcome, Request,
    Response,
};
use log::{debug, error, info, warn};
use tokio::{
    fs::File as TokioFile,
    io::{AsyncRead, AsyncReadExt, AsyncSeekExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
    runtime::Builder,
};

fn main() {
    // 1. 初始化日志系统，配置文件缺失时只在标准错误上提示
    if let Err(e) = log4rs::init_file("config/log4rs.yaml", Default::default()) {
        eprintln!("无法从config/log4rs.yaml初始化日志系统：{}", e);
    }

    // 2. 读取配置
    let config = Config::from_toml("config/development.toml");
    info!("配置文件已载入");
    info!("www root: {}", config.www_root());

    // 3. 根据配置的工作线程数构建运行时
    let runtime = match Builder::new_multi_thread()
        .worker_threads(config.worker_threads())
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("无法创建Tokio运行时：{}", e);
            return;
        }
    };
    runtime.block_on(serve(config));
}

async fn serve(config: Config) {
    // 全局后缀处理器表由宿主持有，挂载点共享
    let global = Arc::new(HandlerTable::new());
    let mount = Arc::new(FileHandler::new(
        config.www_root(),
        config.mount().clone(),
        Arc::clone(&global),
    ));

    let port = config.port();
    let address = match config.local() {
        true => Ipv4Addr::new(127, 0, 0, 1),
        false => Ipv4Addr::new(0, 0, 0, 0),
    };
    info!("服务端将在{}:{}上监听Socket连接", address, port);
    let listener = match TcpListener::bind(SocketAddrV4::new(address, port)).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("无法绑定端口：{}，错误：{}", port, e);
            return;
        }
    };
    info!("端口{}绑定完成", port);

    let chunk_size = config.chunk_size();
    let mut id: u128 = 0;
    loop {
        let accepted = tokio::select! {
            accepted = listener.accept() => accepted,
            _ = tokio::signal::ctrl_c() => {
                info!("接收到停机信号，正在退出...");
                break;
            }
        };
        let (mut stream, addr) = match accepted {
            Ok(pair) => pair,
            Err(e) => {
                error!("接受TCP连接失败：{}", e);
                continue;
            }
        };
        debug!("[ID{}]TCP连接已建立：{}", id, addr);

        let mount = Arc::clone(&mount);
        tokio::spawn(async move {
            handle_connection(&mut stream, id, mount, chunk_size).await;
        });
        id += 1;
    }
}

/// 读取一个请求，交给挂载点处理，然后写回响应
async fn handle_connection(stream: &mut TcpStream, id: u128, mount: Arc<FileHandler>, chunk_size: usize) {
    let mut buffer = vec![0; 8192];

    if let Err(e) = stream.readable().await {
        error!("[ID{}]等待TCPStream可读时遇到错误: {}", id, e);
        return;
    }
    match stream.try_read(&mut buffer) {
        Ok(0) => return,
        Ok(n) => buffer.truncate(n),
        Err(e) => {
            error!("[ID{}]读取TCPStream时遇到错误: {}", id, e);
            return;
        }
    }
    debug!("[ID{}]HTTP请求接收完毕", id);

    let start_time = Instant::now();
    let request = match Request::try_from(&buffer, id) {
        Ok(request) => request,
        Err(e) => {
            warn!("[ID{}]解析HTTP请求失败: {}", id, e);
            let mut response = Response::from_exception(&e);
            send_response(stream, &mut response, false, chunk_size, id).await;
            return;
        }
    };
    let headonly = request.method() == HttpRequestMethod::Head;

    let served = tokio::task::spawn_blocking(move || {
        let mut request = request;
        let mut response = Response::new();
        match mount.service(&mut request, &mut response) {
            Ok(Outcome::Declined) => {
                response
                    .set_code(204)
                    .set_header("Allow", "GET, HEAD, POST, OPTIONS");
            }
            Ok(_) => {}
            Err(e) => report(&e, &request, &mut response),
        }
        (request, response)
    })
    .await;
    let (request, mut response) = match served {
        Ok(pair) => pair,
        Err(e) => {
            error!("[ID{}]处理请求的任务异常终止: {}", id, e);
            let mut response =
                Response::from_exception(&Exception::InternalServerError(e.to_string()));
            send_response(stream, &mut response, headonly, chunk_size, id).await;
            return;
        }
    };

    debug!(
        "[ID{}]HTTP响应构建完成，服务端用时{}ms。",
        id,
        start_time.elapsed().as_millis()
    );
    info!(
        "[ID{}] {}, {}, {}, {}, {}",
        id,
        request.method(),
        request.path(),
        response.status_code(),
        response.information(),
        request.header("user-agent").unwrap_or("-"),
    );

    send_response(stream, &mut response, headonly, chunk_size, id).await;
}

fn report(e: &Exception, request: &Request, response: &mut Response) {
    match e {
        Exception::InternalServerError(_) => error!("[ID{}]{}", request.id(), e),
        _ => debug!("[ID{}]{}: {}", request.id(), request.path(), e),
    }
    response.set_exception(e);
}

async fn send_response(
    stream: &mut TcpStream,
    response: &mut Response,
    headonly: bool,
    chunk_size: usize,
    id: u128,
) {
    if let Err(e) = stream.write_all(&response.head_bytes()).await {
        error!("[ID{}]发送响应头失败: {}", id, e);
        return;
    }
    let body = response.take_body();
    if headonly {
        let _ = stream.flush().await;
        return;
    }

    match body {
        Body::Empty => {}
        Body::Bytes(bytes) => {
            if let Err(e) = stream.write_all(&bytes).await {
                error!("[ID{}]发送响应体失败: {}", id, e);
                return;
            }
        }
        Body::Multipart {
            file,
            parts,
            closing,
        } => {
            let mut file = TokioFile::from_std(file);
            let mut buffer = vec![0u8; chunk_size];
            debug!("[ID{}]开始发送multipart响应，共{}个分片", id, parts.len());
            for part in parts {
                if let Err(e) = stream.write_all(&part.head).await {
                    error!("[ID{}]发送multipart分片头失败: {}", id, e);
                    return;
                }
                if let Err(e) = file.seek(SeekFrom::Start(part.first)).await {
                    error!("[ID{}]定位文件失败: {}", id, e);
                    return;
                }
                match copy_chunked(stream, (&mut file).take(part.length), &mut buffer, id).await {
                    Some(n) if n == part.length => {}
                    Some(n) => {
                        error!(
                            "[ID{}]文件在发送过程中被截断，期望{}字节，实际{}字节",
                            id, part.length, n
                        );
                        return;
                    }
                    None => return,
                }
                if let Err(e) = stream.write_all(b"\r\n").await {
                    error!("[ID{}]发送multipart片段失败: {}", id, e);
                    return;
                }
            }
            if let Err(e) = stream.write_all(&closing).await {
                error!("[ID{}]发送multipart结束分隔符失败: {}", id, e);
                return;
            }
        }
        Body::File { file, length } => {
            // 文件已经定位到起始偏移，只写出 length 个字节
            let file = TokioFile::from_std(file).take(length);
            let mut buffer = vec![0u8; chunk_size];
            debug!("[ID{}]开始流式传输，共{}字节", id, length);
            match copy_chunked(stream, file, &mut buffer, id).await {
                Some(total_sent) => debug!("[ID{}]流式传输完成，共发送{}字节", id, total_sent),
                None => return,
            }
        }
    }
    let _ = stream.flush().await;
}

/// 按 `buffer` 大小把 `reader` 的内容分块写入连接，失败时记录日志并返回 `None`
async fn copy_chunked<R: AsyncRead + Unpin>(
    stream: &mut TcpStream,
    mut reader: R,
    buffer: &mut [u8],
    id: u128,
) -> Option<u64> {
    let mut total_sent = 0u64;
    loop {
        match reader.read(buffer).await {
            Ok(0) => return Some(total_sent),
            Ok(n) => {
                if let Err(e) = stream.write_all(&buffer[..n]).await {
                    error!("[ID{}]流式写入失败: {}", id, e);
                    return None;
                }
                total_sent += n as u64;
            }
            Err(e) => {
                error!("[ID{}]读取文件失败: {}", id, e);
                return None;
            }
        }
    }
}
