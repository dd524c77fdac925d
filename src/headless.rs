//! A window without a display, driven by scripted input.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use tessera_core::{Color, DrawCommand, InputEvent, RecordingTarget, RenderTarget, SpriteDraw, View, Window};
use tracing::debug;

/// A key press delivered on a given frame, written `FRAME:KEY`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptedKey {
    pub frame: u64,
    pub key: String,
}

impl FromStr for ScriptedKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (frame, key) = s
            .split_once(':')
            .ok_or_else(|| format!("expected FRAME:KEY, got {s:?}"))?;
        let frame = frame
            .trim()
            .parse()
            .map_err(|err| format!("bad frame number {frame:?}: {err}"))?;
        let key = key.trim();
        if key.is_empty() {
            return Err(format!("missing key in {s:?}"));
        }
        Ok(Self {
            frame,
            key: key.to_owned(),
        })
    }
}

/// Records every frame instead of presenting it.
pub struct HeadlessWindow {
    title: String,
    open: bool,
    target: RecordingTarget,
    events: BTreeMap<u64, Vec<InputEvent>>,
    polled: u64,
    presented: u64,
    clear_color: Color,
}

impl HeadlessWindow {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            open: true,
            target: RecordingTarget::new(),
            events: BTreeMap::new(),
            polled: 0,
            presented: 0,
            clear_color: Color::default(),
        }
    }

    /// Deliver `event` on the `frame`-th poll, counting from zero.
    pub fn queue_event(&mut self, frame: u64, event: InputEvent) {
        self.events.entry(frame).or_default().push(event);
    }

    pub fn press(&mut self, key: &ScriptedKey) {
        self.queue_event(key.frame, InputEvent::KeyPressed(key.key.clone()));
    }

    /// Draw calls of the frame being built, or of the last presented one.
    pub fn commands(&self) -> &[DrawCommand] {
        &self.target.commands
    }

    pub fn frames_presented(&self) -> u64 {
        self.presented
    }

    pub fn clear_color(&self) -> Color {
        self.clear_color
    }
}

impl fmt::Debug for HeadlessWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HeadlessWindow")
            .field("title", &self.title)
            .field("open", &self.open)
            .field("presented", &self.presented)
            .finish_non_exhaustive()
    }
}

impl RenderTarget for HeadlessWindow {
    fn set_view(&mut self, view: &View) {
        self.target.set_view(view);
    }

    fn draw_sprite(&mut self, sprite: &SpriteDraw) {
        self.target.draw_sprite(sprite);
    }

    fn draw_map_layer(&mut self, map: &str, layer: u32, view: &View) {
        self.target.draw_map_layer(map, layer, view);
    }
}

impl Window for HeadlessWindow {
    fn is_open(&self) -> bool {
        self.open
    }

    fn poll_events(&mut self) -> Vec<InputEvent> {
        let events = self.events.remove(&self.polled).unwrap_or_default();
        self.polled += 1;
        events
    }

    fn clear(&mut self, color: Color) {
        self.clear_color = color;
        self.target.clear();
    }

    fn display(&mut self) {
        self.presented += 1;
        debug!(
            frame = self.presented,
            commands = self.target.commands.len(),
            "frame presented"
        );
    }

    fn close(&mut self) {
        self.open = false;
    }

    fn as_target(&mut self) -> &mut dyn RenderTarget {
        self
    }
}
