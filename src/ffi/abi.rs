use env_logger::Env;

#[unsafe(no_mangle)]
/// ### English
/// Returns the C ABI version.
///
/// ### 中文
/// 返回 C ABI 版本号。
pub extern "C" fn xian_buffer_queue_abi_version() -> u32 {
    super::XIAN_BUFFER_QUEUE_ABI_VERSION
}

#[unsafe(no_mangle)]
/// ### English
/// Installs an `env_logger` backend (filter from `RUST_LOG`, default `info`).
///
/// Returns `false` if a logger was already installed (by this call or by the embedder).
///
/// ### 中文
/// 安装 `env_logger` 日志后端（过滤规则来自 `RUST_LOG`，默认 `info`）。
///
/// 若日志器已被安装（由本调用或宿主安装），返回 `false`。
pub extern "C" fn xian_buffer_queue_init_logging() -> bool {
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .format_timestamp_micros()
        .try_init()
        .is_ok()
}
