// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 终端显示 (Terminal display sink)
///
/// 在一行状态栏里显示最新帧的元数据, 帧号或订阅状态变化时才重绘。
use crate::dispatch::DisplaySink;
use crate::frame::CanonicalFrame;
use crate::subscription::SubscriptionState;
use crossterm::cursor::MoveToColumn;
use crossterm::style::Print;
use crossterm::terminal::{self, Clear, ClearType, SetTitle};
use crossterm::{execute, queue};
use std::io::{self, Write};
use std::time::Instant;

const FIXED_WIDTH: usize = 80;

pub struct TerminalDisplay<W: Write> {
    out: W,
    window_name: String,
    autosize: bool,
    state: SubscriptionState,
    last_sequence: Option<u64>,
    dirty: bool,

    // 渲染统计
    render_count: u64,
    render_last: Instant,
    render_fps: f64,
}

impl TerminalDisplay<io::Stdout> {
    pub fn stdout(window_name: impl Into<String>, autosize: bool) -> Self {
        Self::new(io::stdout(), window_name, autosize)
    }
}

impl<W: Write> TerminalDisplay<W> {
    pub fn new(out: W, window_name: impl Into<String>, autosize: bool) -> Self {
        Self {
            out,
            window_name: window_name.into(),
            autosize,
            state: SubscriptionState::Detached,
            last_sequence: None,
            dirty: true,
            render_count: 0,
            render_last: Instant::now(),
            render_fps: 0.0,
        }
    }

    /// 把窗口名写到终端标题
    pub fn set_title(&mut self) -> io::Result<()> {
        execute!(self.out, SetTitle(&self.window_name))
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    pub fn status_line(&self, frame: &CanonicalFrame) -> String {
        // 中心像素采样, 便于确认画面在变化
        let centre = match frame.pixel(frame.width / 2, frame.height / 2) {
            Some([b, g, r]) => format!("bgr({},{},{})", b, g, r),
            None => "-".to_string(),
        };
        format!(
            "[{}] {} | #{} {}x{} {} | 中心 {} | {} | 显示 {:.1}fps",
            self.window_name,
            self.state,
            frame.sequence,
            frame.width,
            frame.height,
            frame.source_encoding,
            centre,
            frame.received_at.format("%H:%M:%S%.3f"),
            self.render_fps,
        )
    }

    fn line_width(&self) -> usize {
        if self.autosize {
            terminal::size()
                .map(|(cols, _)| cols as usize)
                .unwrap_or(FIXED_WIDTH)
        } else {
            FIXED_WIDTH
        }
    }

    fn draw(&mut self, line: &str) -> io::Result<()> {
        let width = self.line_width();
        let mut fitted: String = line.chars().take(width).collect();
        if self.autosize {
            let used = fitted.chars().count();
            fitted.extend(std::iter::repeat(' ').take(width.saturating_sub(used)));
        }
        queue!(
            self.out,
            MoveToColumn(0),
            Clear(ClearType::CurrentLine),
            Print(fitted)
        )?;
        self.out.flush()
    }
}

impl<W: Write> DisplaySink for TerminalDisplay<W> {
    fn render(&mut self, frame: &CanonicalFrame) {
        if !self.dirty && self.last_sequence == Some(frame.sequence) {
            return;
        }

        self.render_count += 1;
        if self.render_last.elapsed().as_secs_f64() >= 1.0 {
            self.render_fps = self.render_count as f64 / self.render_last.elapsed().as_secs_f64();
            self.render_last = Instant::now();
            self.render_count = 0;
        }

        let line = self.status_line(frame);
        if let Err(e) = self.draw(&line) {
            log::debug!("状态栏绘制失败: {}", e);
        }
        self.last_sequence = Some(frame.sequence);
        self.dirty = false;
    }

    fn subscription_changed(&mut self, state: SubscriptionState) {
        self.state = state;
        self.dirty = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Local;

    fn frame(sequence: u64) -> CanonicalFrame {
        CanonicalFrame {
            data: vec![0; 12],
            width: 2,
            height: 2,
            sequence,
            source_encoding: "bayer_rggb8".into(),
            received_at: Local::now(),
        }
    }

    #[test]
    fn status_line_names_frame() {
        let display = TerminalDisplay::new(Vec::new(), "vslam/preview", false);
        let line = display.status_line(&frame(42));
        assert!(line.starts_with("[vslam/preview] unsubscribed"));
        assert!(line.contains("#42 2x2 bayer_rggb8"));
        assert!(line.contains("中心 bgr(0,0,0)"));
    }

    #[test]
    fn status_line_samples_centre_pixel() {
        let display = TerminalDisplay::new(Vec::new(), "w", false);
        let mut f = frame(1);
        f.data[9..12].copy_from_slice(&[7, 8, 9]);
        assert!(display.status_line(&f).contains("中心 bgr(7,8,9)"));

        f.data.clear();
        assert!(display.status_line(&f).contains("中心 -"));
    }

    #[test]
    fn redraws_only_on_change() {
        let mut display = TerminalDisplay::new(Vec::new(), "w", false);
        display.render(&frame(1));
        let after_first = display.out.len();
        assert!(after_first > 0);

        display.render(&frame(1));
        assert_eq!(display.out.len(), after_first);

        display.subscription_changed(SubscriptionState::Attached);
        display.render(&frame(1));
        let after_toggle = display.out.len();
        assert!(after_toggle > after_first);

        display.render(&frame(2));
        assert!(display.out.len() > after_toggle);

        let text = String::from_utf8_lossy(&display.into_inner()).into_owned();
        assert!(text.contains("subscribed | #2"));
    }

    #[test]
    fn fixed_width_truncates() {
        let long_name = "x".repeat(200);
        let mut display = TerminalDisplay::new(Vec::new(), long_name, false);
        display.render(&frame(1));
        let text = String::from_utf8_lossy(&display.into_inner()).into_owned();
        assert!(!text.contains(&"x".repeat(FIXED_WIDTH)));
        assert!(text.contains(&"x".repeat(FIXED_WIDTH - 1)));
    }
}
