// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 按键命令调度 (Command dispatcher)
///
/// 主线程控制循环, 每一轮:
/// 1. 带超时地读取一个按键 (无按键不是错误)
/// 2. 命令键 → 发布一条命令 (fire-and-forget)
/// 3. `s` → 切换订阅状态 (不发布消息)
/// 4. 交给显示端渲染最新帧
/// 5. 让出时间片, 不饿死投递线程
use crate::bus::Publisher;
use crate::context::ViewerContext;
use crate::error::PublishError;
use crate::frame::CanonicalFrame;
use crate::subscription::SubscriptionState;
use std::io;
use std::thread;
use std::time::Duration;

/// 默认按键轮询间隔
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Space,
    Char(char),
    Other,
}

impl Key {
    pub fn from_char(c: char) -> Self {
        if c == ' ' {
            Key::Space
        } else {
            Key::Char(c)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    EmitCommand(&'static str),
    ToggleSubscription,
}

/// 固定按键表
pub const KEY_BINDINGS: [(Key, KeyAction); 5] = [
    (Key::Space, KeyAction::EmitCommand("Space")),
    (Key::Char('r'), KeyAction::EmitCommand("r")),
    (Key::Char('a'), KeyAction::EmitCommand("a")),
    (Key::Char('q'), KeyAction::EmitCommand("q")),
    (Key::Char('s'), KeyAction::ToggleSubscription),
];

/// 未绑定的按键返回 None (忽略,不报错)
pub fn action_for(key: Key) -> Option<KeyAction> {
    KEY_BINDINGS
        .iter()
        .find(|(bound, _)| *bound == key)
        .map(|(_, action)| *action)
}

/// 发往上游的命令消息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundCommand {
    pub data: String,
}

/// 操作员输入源
pub trait OperatorInput {
    fn poll_key(&mut self, timeout: Duration) -> io::Result<Option<Key>>;
}

/// 显示端
pub trait DisplaySink {
    fn render(&mut self, frame: &CanonicalFrame);

    fn subscription_changed(&mut self, _state: SubscriptionState) {}
}

/// 命令出口
pub trait CommandSink {
    fn send(&mut self, text: &str) -> Result<(), PublishError>;
}

impl CommandSink for Publisher<OutboundCommand> {
    fn send(&mut self, text: &str) -> Result<(), PublishError> {
        self.publish(OutboundCommand {
            data: text.to_string(),
        })
        .map(|_| ())
    }
}

/// 单轮调度结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatched {
    Idle,
    Ignored(Key),
    Emitted(&'static str),
    EmitFailed(&'static str),
    Toggled(SubscriptionState),
    ToggleFailed,
}

pub struct CommandDispatcher<'a, I, D, C> {
    ctx: &'a ViewerContext,
    input: I,
    display: D,
    commands: C,
    poll_interval: Duration,
}

impl<'a, I, D, C> CommandDispatcher<'a, I, D, C>
where
    I: OperatorInput,
    D: DisplaySink,
    C: CommandSink,
{
    pub fn new(ctx: &'a ViewerContext, input: I, display: D, commands: C) -> Self {
        Self {
            ctx,
            input,
            display,
            commands,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn display(&self) -> &D {
        &self.display
    }

    pub fn commands(&self) -> &C {
        &self.commands
    }

    /// 运行到退出信号触发为止; 只有输入源故障会中断循环
    pub fn run(&mut self) -> io::Result<()> {
        log::info!("⌨️  按键: [空格] Space | [r] r | [a] a | [q] q | [s] 订阅/退订");
        while !self.ctx.shutdown.is_triggered() {
            self.tick()?;
        }
        log::info!("✅ 调度循环退出");
        Ok(())
    }

    pub fn tick(&mut self) -> io::Result<Dispatched> {
        let outcome = match self.input.poll_key(self.poll_interval)? {
            None => Dispatched::Idle,
            Some(key) => match action_for(key) {
                Some(action) => self.apply(action),
                None => Dispatched::Ignored(key),
            },
        };

        if let Some(frame) = self.ctx.slot.get() {
            self.display.render(&frame);
        }

        thread::yield_now();
        Ok(outcome)
    }

    fn apply(&mut self, action: KeyAction) -> Dispatched {
        match action {
            KeyAction::EmitCommand(text) => {
                log::info!("📤 Sending \"{}\" to upstream", text);
                match self.commands.send(text) {
                    Ok(()) => Dispatched::Emitted(text),
                    Err(e) => {
                        log::error!("❌ 命令 \"{}\" 发送失败: {}", text, e);
                        Dispatched::EmitFailed(text)
                    }
                }
            }
            KeyAction::ToggleSubscription => match self.ctx.subscriptions.toggle() {
                Ok(state) => {
                    log::info!("🔄 {}", state);
                    self.display.subscription_changed(state);
                    Dispatched::Toggled(state)
                }
                Err(e) => {
                    log::error!("❌ 订阅 {} 失败: {}", self.ctx.subscriptions.topic(), e);
                    Dispatched::ToggleFailed
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::Bus;
    use crate::context::{ShutdownSignal, ViewerContext};
    use crate::frame::{encodings, InboundFrame};
    use crate::transport::FramePublisher;
    use crossbeam_channel::unbounded;
    use std::collections::VecDeque;
    use std::time::Instant;

    /// 按脚本回放按键, 回放完触发退出
    struct ScriptedInput {
        keys: VecDeque<Option<Key>>,
        shutdown: ShutdownSignal,
    }

    impl ScriptedInput {
        fn new(keys: impl IntoIterator<Item = Option<Key>>, shutdown: ShutdownSignal) -> Self {
            Self {
                keys: keys.into_iter().collect(),
                shutdown,
            }
        }
    }

    impl OperatorInput for ScriptedInput {
        fn poll_key(&mut self, _timeout: Duration) -> io::Result<Option<Key>> {
            match self.keys.pop_front() {
                Some(key) => Ok(key),
                None => {
                    self.shutdown.trigger();
                    Ok(None)
                }
            }
        }
    }

    struct BrokenInput;

    impl OperatorInput for BrokenInput {
        fn poll_key(&mut self, _timeout: Duration) -> io::Result<Option<Key>> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "tty gone"))
        }
    }

    #[derive(Default)]
    struct RecordingDisplay {
        rendered: Vec<u64>,
        states: Vec<SubscriptionState>,
    }

    impl DisplaySink for RecordingDisplay {
        fn render(&mut self, frame: &CanonicalFrame) {
            self.rendered.push(frame.sequence);
        }

        fn subscription_changed(&mut self, state: SubscriptionState) {
            self.states.push(state);
        }
    }

    #[derive(Default)]
    struct RecordingCommands {
        sent: Vec<String>,
    }

    impl CommandSink for RecordingCommands {
        fn send(&mut self, text: &str) -> Result<(), PublishError> {
            self.sent.push(text.to_string());
            Ok(())
        }
    }

    struct ClosedCommands;

    impl CommandSink for ClosedCommands {
        fn send(&mut self, _text: &str) -> Result<(), PublishError> {
            Err(PublishError::Closed)
        }
    }

    fn context(bus: &Bus) -> ViewerContext {
        ViewerContext::new(bus.clone(), "preview", "raw", 1, ShutdownSignal::new())
    }

    fn ch(c: char) -> Option<Key> {
        Some(Key::from_char(c))
    }

    fn wait_for(mut cond: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            thread::sleep(Duration::from_millis(2));
        }
        false
    }

    #[test]
    fn key_table_is_exact() {
        assert_eq!(action_for(Key::Space), Some(KeyAction::EmitCommand("Space")));
        assert_eq!(action_for(Key::Char('r')), Some(KeyAction::EmitCommand("r")));
        assert_eq!(action_for(Key::Char('a')), Some(KeyAction::EmitCommand("a")));
        assert_eq!(action_for(Key::Char('q')), Some(KeyAction::EmitCommand("q")));
        assert_eq!(action_for(Key::Char('s')), Some(KeyAction::ToggleSubscription));
        assert_eq!(action_for(Key::Char('x')), None);
        assert_eq!(action_for(Key::Char('R')), None);
        assert_eq!(action_for(Key::Other), None);
        assert_eq!(Key::from_char(' '), Key::Space);
    }

    #[test]
    fn space_emits_exactly_one_command() {
        let bus = Bus::new();
        let ctx = context(&bus);
        let input = ScriptedInput::new([ch(' ')], ctx.shutdown.clone());
        let mut dispatcher = CommandDispatcher::new(
            &ctx,
            input,
            RecordingDisplay::default(),
            RecordingCommands::default(),
        );

        assert_eq!(dispatcher.tick().unwrap(), Dispatched::Emitted("Space"));
        assert_eq!(dispatcher.tick().unwrap(), Dispatched::Idle);
        assert_eq!(dispatcher.commands().sent, vec!["Space".to_string()]);
    }

    #[test]
    fn unknown_key_changes_nothing() {
        let bus = Bus::new();
        let _publisher = FramePublisher::advertise(&bus, "preview").unwrap();
        let ctx = context(&bus);
        let input = ScriptedInput::new([ch('x')], ctx.shutdown.clone());
        let mut dispatcher = CommandDispatcher::new(
            &ctx,
            input,
            RecordingDisplay::default(),
            RecordingCommands::default(),
        );

        assert_eq!(
            dispatcher.tick().unwrap(),
            Dispatched::Ignored(Key::Char('x'))
        );
        assert!(dispatcher.commands().sent.is_empty());
        assert!(dispatcher.display().states.is_empty());
        assert_eq!(ctx.subscriptions.state(), SubscriptionState::Detached);
    }

    #[test]
    fn toggle_round_trip_hides_frames_while_detached() {
        let bus = Bus::new();
        let publisher = FramePublisher::advertise(&bus, "preview").unwrap();
        let ctx = context(&bus);
        let input = ScriptedInput::new([ch('s'), None, ch('s')], ctx.shutdown.clone());
        let mut dispatcher = CommandDispatcher::new(
            &ctx,
            input,
            RecordingDisplay::default(),
            RecordingCommands::default(),
        );

        assert_eq!(
            dispatcher.tick().unwrap(),
            Dispatched::Toggled(SubscriptionState::Attached)
        );
        publisher
            .publish(InboundFrame::new(vec![1; 4], encodings::MONO8, 2, 2, 1))
            .unwrap();
        assert!(wait_for(|| ctx.slot.get().is_some()));
        assert_eq!(dispatcher.tick().unwrap(), Dispatched::Idle);
        assert_eq!(dispatcher.display().rendered, vec![1]);

        assert_eq!(
            dispatcher.tick().unwrap(),
            Dispatched::Toggled(SubscriptionState::Detached)
        );
        publisher
            .publish(InboundFrame::new(vec![2; 4], encodings::MONO8, 2, 2, 2))
            .unwrap();
        thread::sleep(Duration::from_millis(20));
        assert_eq!(ctx.slot.get().unwrap().sequence, 1);
        assert!(dispatcher.commands().sent.is_empty());
        assert_eq!(
            dispatcher.display().states,
            vec![SubscriptionState::Attached, SubscriptionState::Detached]
        );
    }

    #[test]
    fn failed_toggle_is_not_fatal() {
        let bus = Bus::new();
        let ctx = context(&bus);
        let input = ScriptedInput::new([ch('s'), ch(' ')], ctx.shutdown.clone());
        let mut dispatcher = CommandDispatcher::new(
            &ctx,
            input,
            RecordingDisplay::default(),
            RecordingCommands::default(),
        );

        assert_eq!(dispatcher.tick().unwrap(), Dispatched::ToggleFailed);
        assert_eq!(ctx.subscriptions.state(), SubscriptionState::Detached);
        assert_eq!(dispatcher.tick().unwrap(), Dispatched::Emitted("Space"));
    }

    #[test]
    fn failed_publish_is_not_fatal() {
        let bus = Bus::new();
        let ctx = context(&bus);
        let input = ScriptedInput::new([ch('r'), ch('q')], ctx.shutdown.clone());
        let mut dispatcher =
            CommandDispatcher::new(&ctx, input, RecordingDisplay::default(), ClosedCommands);

        assert_eq!(dispatcher.tick().unwrap(), Dispatched::EmitFailed("r"));
        assert_eq!(dispatcher.tick().unwrap(), Dispatched::EmitFailed("q"));
    }

    #[test]
    fn run_stops_on_shutdown() {
        let bus = Bus::new();
        let _publisher = FramePublisher::advertise(&bus, "preview").unwrap();
        let ctx = context(&bus);
        let keys = [ch(' '), ch('r'), None, ch('a'), ch('x'), ch('q'), ch('s')];
        let input = ScriptedInput::new(keys, ctx.shutdown.clone());
        let mut dispatcher = CommandDispatcher::new(
            &ctx,
            input,
            RecordingDisplay::default(),
            RecordingCommands::default(),
        );

        dispatcher.run().unwrap();
        assert!(ctx.shutdown.is_triggered());
        assert_eq!(dispatcher.commands().sent, vec!["Space", "r", "a", "q"]);
        assert!(ctx.subscriptions.is_attached());
    }

    #[test]
    fn input_failure_ends_run() {
        let bus = Bus::new();
        let ctx = context(&bus);
        let mut dispatcher = CommandDispatcher::new(
            &ctx,
            BrokenInput,
            RecordingDisplay::default(),
            RecordingCommands::default(),
        );
        assert_eq!(
            dispatcher.run().unwrap_err().kind(),
            io::ErrorKind::BrokenPipe
        );
    }

    #[test]
    fn commands_reach_bus_subscribers() {
        let bus = Bus::new();
        let ctx = context(&bus);
        let publisher = bus.advertise::<OutboundCommand>("key_pressed").unwrap();
        let (tx, rx) = unbounded();
        let _echo = bus
            .subscribe::<OutboundCommand, _>("key_pressed", 10, move |cmd| {
                let _ = tx.send(cmd.data.clone());
            })
            .unwrap();

        let input = ScriptedInput::new([ch(' ')], ctx.shutdown.clone());
        let mut dispatcher =
            CommandDispatcher::new(&ctx, input, RecordingDisplay::default(), publisher);
        dispatcher.run().unwrap();

        assert_eq!(rx.recv_timeout(Duration::from_secs(2)).unwrap(), "Space");
        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
    }
}
