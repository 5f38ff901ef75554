/// 远程预览 (Remote view)
///
/// 显示图像流最新帧, 按键发送命令:
///   [空格] Space | [r] r | [a] a | [q] q | [s] 订阅/退订
///
/// 主程序入口 - 直接运行: cargo run --bin remote-view --release -- raw
use anyhow::{Context, Result};
use clap::Parser;
use std::io::Write;
use stream_remote::acquisition::{spawn_source, FrameSource, ImageDir, TestPattern};
use stream_remote::keyboard::TerminalInput;
use stream_remote::renderer::TerminalDisplay;
use stream_remote::{
    Args, Bus, CommandDispatcher, DisplaySink, FramePublisher, OutboundCommand, ShutdownSignal,
    SourceSpec, SubscriptionState, ViewerConfig, ViewerContext,
};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

const PATTERN_WIDTH: u32 = 320;
const PATTERN_HEIGHT: u32 = 240;

fn main() -> Result<()> {
    let args = Args::parse();

    // raw 模式下每行需要回车
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format(|buf, record| writeln!(buf, "\r[{}] {}\r", record.level(), record.args()))
        .init();

    let config = ViewerConfig::resolve(&args).context("配置无效")?;

    log::info!("🚀 远程预览启动");
    log::info!("📹 图像: {} ({})", config.topic, config.transport);
    log::info!("📤 命令: {}", config.command_topic);

    let bus = Bus::new();
    let shutdown = ShutdownSignal::new();
    shutdown
        .install_ctrlc()
        .context("无法注册退出信号处理")?;

    // ========== 启动帧来源线程 ==========
    let source: Box<dyn FrameSource> = match config.source_spec() {
        SourceSpec::Pattern => Box::new(TestPattern::new(PATTERN_WIDTH, PATTERN_HEIGHT)),
        SourceSpec::Directory(dir) => Box::new(
            ImageDir::open(&dir).with_context(|| format!("无法打开图片目录 {}", dir.display()))?,
        ),
    };
    let frame_publisher =
        FramePublisher::advertise(&bus, &config.topic).context("无法声明图像 topic")?;
    let source_thread = spawn_source(
        source,
        frame_publisher,
        config.frame_period(),
        shutdown.clone(),
    )
    .context("无法启动帧来源线程")?;

    // ========== 命令出口 ==========
    let commands = bus
        .advertise::<OutboundCommand>(&config.command_topic)
        .context("无法声明命令 topic")?;
    let _echo = if config.echo_commands {
        Some(
            bus.subscribe::<OutboundCommand, _>(&config.command_topic, 10, |cmd| {
                log::info!("📥 上游收到命令: {}", cmd.data);
            })
            .context("无法订阅命令回显")?,
        )
    } else {
        None
    };

    // ========== 订阅图像流 (启动阶段失败即退出) ==========
    let ctx = ViewerContext::new(
        bus.clone(),
        &config.topic,
        &config.transport,
        config.queue_size,
        shutdown.clone(),
    );
    ctx.subscriptions
        .attach()
        .with_context(|| format!("无法订阅 {}", config.topic))?;
    log::info!("✅ subscribed");

    // ========== 主线程: 按键调度 ==========
    let mut display = TerminalDisplay::stdout(config.window_name(), config.autosize);
    display.subscription_changed(SubscriptionState::Attached);
    if let Err(e) = display.set_title() {
        log::debug!("无法设置终端标题: {}", e);
    }
    let input = TerminalInput::new(shutdown.clone()).context("无法进入终端 raw 模式")?;

    let result = CommandDispatcher::new(&ctx, input, display, commands)
        .with_poll_interval(config.poll_interval())
        .run();

    // ========== 退出: 先退订再关总线 ==========
    shutdown.trigger();
    ctx.subscriptions.detach();
    bus.shutdown();
    if source_thread.join().is_err() {
        log::warn!("⚠️  帧来源线程异常退出");
    }
    log::info!("👋 已退出");

    result.context("按键输入失败")
}
