use anyhow::Result;
use keyword_funnel::utils::logging;
use keyword_funnel::{App, Config, JobOutcome};

#[tokio::main]
async fn main() -> Result<()> {
    // 初始化日志
    logging::init();

    // 加载配置
    let config = Config::load()?;

    // 初始化并运行应用
    let mut app = App::initialize(config).await?;
    let outcome = app.run().await?;
    app.shutdown().await;

    if let JobOutcome::Failed(failure) = outcome {
        anyhow::bail!(
            "任务终止 (已处理 {}/{}): {}",
            failure.processed,
            failure.total,
            failure.cause
        );
    }

    Ok(())
}
