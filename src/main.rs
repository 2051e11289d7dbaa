use anyhow::Result;
use clap::Parser;

use exam_grader::cli::Cli;
use exam_grader::utils::logging;
use exam_grader::{App, Config};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 加载配置
    let config = Config::load(cli.config.as_deref())?;

    // 初始化日志
    logging::init(cli.verbose || config.verbose_logging);

    // 初始化并运行应用
    let app = App::initialize(config, cli.user)?;
    let success = app.run(cli.command).await?;

    if !success {
        std::process::exit(1);
    }
    Ok(())
}
