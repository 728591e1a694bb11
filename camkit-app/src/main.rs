use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use camkit_config::{AppConfig, ConfigError};
use camkit_core::drawing::Drawing;
use camkit_core::toolpath::ToolpathOptions;
use camkit_engine::command::{CommandBus, CommandContext, CommandRequest};
use camkit_io::{DocumentSaver, DxfFacade, loader_for_path};
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

/// 读取 DXF 或 G 代码，按顺序执行变换命令，可选写出 DXF。
#[derive(Debug, Parser)]
#[command(name = "camkit")]
#[command(about = "2D CAD/CAM drawing transformer", long_about = None)]
struct Cli {
    /// 输入文件（.dxf，或 .nc/.ngc/.gcode/.tap 刀路）
    input: PathBuf,
    /// 配置文件路径，缺省时读取 CAMKIT_CONFIG 或 ./config/default.toml
    #[arg(long)]
    config: Option<PathBuf>,
    /// 按出现顺序执行的命令，例如 "rotate 90"、"split 10 x 1"、"trim"
    #[arg(short, long = "command", value_name = "COMMAND")]
    commands: Vec<String>,
    /// 输出 DXF 路径
    #[arg(short, long)]
    output: Option<PathBuf>,
}

impl Cli {
    fn requests(&self) -> Result<Vec<CommandRequest>> {
        self.commands
            .iter()
            .map(|command| {
                let mut words = command.split_whitespace();
                let name = words
                    .next()
                    .with_context(|| format!("空命令：{command:?}"))?;
                Ok(CommandRequest::new(name, words))
            })
            .collect()
    }
}

fn main() {
    let cli = Cli::parse();
    let config = load_configuration(cli.config.clone());
    init_logging(&config);
    info!(input = %cli.input.display(), "启动 camkit");

    match run(&cli, &cli.input, &config) {
        Ok(drawing) => print_summary(&drawing),
        Err(err) => {
            error!(error = ?err, "处理图纸失败");
            std::process::exit(1);
        }
    }
}

fn run(cli: &Cli, input: &Path, config: &AppConfig) -> Result<Drawing> {
    let requests = cli.requests()?;
    let options = ToolpathOptions {
        drill_marker_radius: config.geometry.drill_marker_radius,
        arc_section_length: config.geometry.arc_section_length,
    };
    let mut drawing = loader_for_path(input, options)
        .load(input)
        .with_context(|| format!("读取 {} 失败", input.display()))?;
    info!(
        filename = drawing.filename(),
        entities = drawing.entity_count(),
        "图纸已加载"
    );

    let bus = CommandBus::new();
    let mut context = CommandContext::new(&mut drawing);
    context.arc_section_length = config.geometry.arc_section_length;
    for request in &requests {
        let response = bus
            .dispatch(request, &mut context)
            .with_context(|| format!("命令 {} 执行失败", request.name))?;
        if let Some(message) = response.message {
            info!(command = %request.name, "{message}");
        }
    }

    if let Some(output) = &cli.output {
        DxfFacade::with_layer_fallback(config.export.layer_fallback.clone())
            .save(&drawing, output)
            .with_context(|| format!("写入 {} 失败", output.display()))?;
        info!(output = %output.display(), "图纸已保存");
    }
    Ok(drawing)
}

fn print_summary(drawing: &Drawing) {
    let bounds = drawing.bounds();
    println!(
        "{}: {} 圆, {} 直线, {} 圆弧, {} 多段线, {} 轻量多段线",
        drawing.filename(),
        drawing.circles().len(),
        drawing.lines().len(),
        drawing.arcs().len(),
        drawing.polylines().len(),
        drawing.polylines_lw().len(),
    );
    if bounds.is_empty() {
        println!("范围: 空");
    } else {
        println!(
            "范围: ({:.3}, {:.3}) - ({:.3}, {:.3})",
            bounds.min().x(),
            bounds.min().y(),
            bounds.max().x(),
            bounds.max().y()
        );
    }
}

fn load_configuration(override_path: Option<PathBuf>) -> AppConfig {
    match override_path {
        Some(path) => AppConfig::from_file(&path).unwrap_or_else(|err| {
            warn!(path = %path.display(), error = %err, "加载指定配置失败，使用默认配置");
            AppConfig::default()
        }),
        None => match AppConfig::discover() {
            Ok(cfg) => cfg,
            Err(err) => {
                match &err {
                    ConfigError::Io { path, .. } | ConfigError::Parse { path, .. } => {
                        warn!(path = %path.display(), error = %err, "加载默认配置失败，使用内建默认值");
                    }
                    ConfigError::Context { .. } | ConfigError::Invalid(_) => {
                        warn!(error = %err, "加载默认配置失败，使用内建默认值");
                    }
                }
                AppConfig::default()
            }
        },
    }
}

fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_new(config.logging.level.clone()).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(filter);
    if subscriber.try_init().is_err() {
        // 已初始化，忽略
    }
}
