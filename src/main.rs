use anyhow::{Context, Result};
use filing_scorer::utils::logging;
use filing_scorer::{App, Config};

#[tokio::main]
async fn main() -> Result<()> {
    // 加载配置
    let config = Config::from_env();

    // 初始化日志
    logging::init(config.verbose_logging);

    // 配置错误在派发任何工作项之前终止程序
    config.validate().context("配置无效")?;

    // 初始化并运行应用
    let _summary = App::initialize(config).await?.run().await?;

    Ok(())
}
