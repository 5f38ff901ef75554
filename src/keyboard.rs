// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 终端按键输入 (Terminal key input)
///
/// raw 模式下逐键读取, drop 时恢复终端。raw 模式会吞掉 Ctrl-C 信号,
/// 所以这里自己把 Ctrl-C 转成退出信号。
use crate::context::ShutdownSignal;
use crate::dispatch::{Key, OperatorInput};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal;
use std::io;
use std::time::Duration;

pub struct TerminalInput {
    shutdown: ShutdownSignal,
}

impl TerminalInput {
    pub fn new(shutdown: ShutdownSignal) -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(Self { shutdown })
    }
}

impl Drop for TerminalInput {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
        println!();
    }
}

impl OperatorInput for TerminalInput {
    fn poll_key(&mut self, timeout: Duration) -> io::Result<Option<Key>> {
        if !event::poll(timeout)? {
            return Ok(None);
        }
        match event::read()? {
            Event::Key(key) => Ok(translate(key, &self.shutdown)),
            _ => Ok(None),
        }
    }
}

/// 只处理按下事件; Ctrl-C 触发退出, 其余 Ctrl/Alt 组合键不算命令键
fn translate(key: KeyEvent, shutdown: &ShutdownSignal) -> Option<Key> {
    if key.kind != KeyEventKind::Press {
        return None;
    }
    let chord = key
        .modifiers
        .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT);
    match key.code {
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            shutdown.trigger();
            None
        }
        KeyCode::Char(_) if chord => Some(Key::Other),
        KeyCode::Char(c) => Some(Key::from_char(c)),
        _ => Some(Key::Other),
    }
}
