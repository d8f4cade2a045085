use anyhow::Context;
use lmv_kernel::config::load_config;
use lmv_logger::Logger;
use lmv_server::Server;

#[lmv_runtime::main(high_performance)]
async fn main() -> anyhow::Result<()> {
    let _log = Logger::builder().name(env!("CARGO_PKG_NAME")).init()?;

    let cfg = load_config().context("Critical: Configuration is malformed")?;

    Server::builder().config(cfg).build().await?.run().await
}
