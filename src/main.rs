use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use crawler_core::AppConfig;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod app;
mod shutdown;

use app::Application;
use shutdown::ShutdownManager;

#[derive(Debug, Parser)]
#[command(name = "crawler", version, about = "视频资源采集与入库调度引擎")]
struct Cli {
    /// 配置文件路径
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<String>,

    /// 日志级别，覆盖配置文件
    #[arg(
        short,
        long,
        value_name = "LEVEL",
        global = true,
        value_parser = ["trace", "debug", "info", "warn", "error"]
    )]
    log_level: Option<String>,

    /// 日志格式，覆盖配置文件
    #[arg(long, value_name = "FORMAT", global = true, value_parser = ["json", "pretty"])]
    log_format: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// 常驻运行调度器
    Serve,
    /// 在前台执行一次任务
    Run {
        #[arg(long = "task", value_name = "ID")]
        task_id: i64,
    },
    /// 打印资源站分类树
    Categories {
        #[arg(long, value_name = "BASE_URL")]
        url: String,
        #[arg(long, default_value = "nangua")]
        adapter: String,
    },
    /// 按配置的相似度阈值规划标签合并
    Tags {
        /// 标签列表 JSON 文件
        #[arg(long, value_name = "FILE")]
        file: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load(cli.config.as_deref()).with_context(|| match &cli.config {
        Some(path) => format!("加载配置文件失败: {path}"),
        None => "加载配置失败".to_string(),
    })?;

    let log_level = cli
        .log_level
        .as_deref()
        .unwrap_or(&config.observability.log_level);
    let log_format = cli
        .log_format
        .as_deref()
        .unwrap_or(&config.observability.log_format);
    init_logging(log_level, log_format)?;

    match cli.command {
        Commands::Serve => serve(config).await,
        Commands::Run { task_id } => {
            info!("执行任务: {task_id}");
            let app = Application::new(config).await?;
            let result = app.run_task(task_id).await?;
            if result.fail_count > 0 {
                for failure in &result.failures {
                    error!(data = %failure.data, "条目处理失败: {}", failure.error);
                }
            }
            Ok(())
        }
        Commands::Categories { url, adapter } => {
            let categories = app::list_categories(&config, &url, &adapter).await?;
            for node in categories {
                println!("{}\t{}\t{}", node.type_id, node.type_pid, node.type_name);
            }
            Ok(())
        }
        Commands::Tags { file } => {
            let content = std::fs::read_to_string(&file)
                .with_context(|| format!("读取标签文件失败: {file}"))?;
            let threshold = config.crawler.tag_similarity_threshold;
            let merges = app::plan_tag_merges(&content, threshold)?;
            info!(threshold, "待合并标签 {} 组", merges.len());
            for merge in merges {
                println!("{}\t{}", merge.from, merge.into);
            }
            Ok(())
        }
    }
}

async fn serve(config: AppConfig) -> Result<()> {
    info!("启动采集调度服务");
    info!("数据库: {}", config.database.url);

    let app = Arc::new(Application::new(config).await?);
    let shutdown_manager = ShutdownManager::new();

    let app_handle = {
        let app = Arc::clone(&app);
        let shutdown_rx = shutdown_manager.subscribe().await;
        tokio::spawn(async move {
            if let Err(e) = app.serve(shutdown_rx).await {
                error!("应用运行失败: {e:#}");
            }
        })
    };

    shutdown::wait_for_signal().await;
    info!("收到关闭信号，开始优雅关闭...");
    shutdown_manager.shutdown().await;

    match tokio::time::timeout(std::time::Duration::from_secs(30), app_handle).await {
        Ok(Ok(())) => info!("应用已优雅关闭"),
        Ok(Err(e)) => error!("应用关闭时发生错误: {e}"),
        Err(_) => error!("应用关闭超时，强制退出"),
    }
    Ok(())
}

/// 初始化日志系统
fn init_logging(log_level: &str, log_format: &str) -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let registry = tracing_subscriber::registry().with(env_filter);

    match log_format {
        "json" => registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
            .context("初始化JSON日志格式失败")?,
        "pretty" => registry
            .with(tracing_subscriber::fmt::layer().pretty())
            .try_init()
            .context("初始化Pretty日志格式失败")?,
        _ => return Err(anyhow::anyhow!("不支持的日志格式: {log_format}")),
    }

    Ok(())
}
