//! Built-in components.

use std::any::Any;

use glam::Vec2;
use tessera_core::{Value, ValueKind};

use crate::component::{count_field, field_type_error, number_field, Component};
use crate::error::ComponentError;

/// World position. Accepts `[x, y]` or `{ "x": .., "y": .. }`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    pub const NAME: &'static str = "position";

    pub fn vec(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }

    pub fn set_vec(&mut self, v: Vec2) {
        self.x = v.x;
        self.y = v.y;
    }
}

impl Component for Position {
    fn initialize(&mut self, payload: &Value) -> Result<(), ComponentError> {
        let (x, y) = match payload {
            Value::List(items) if items.len() == 2 => (&items[0], &items[1]),
            Value::List(items) => {
                return Err(ComponentError::malformed(
                    Self::NAME,
                    format!("expected 2 coordinates, got {}", items.len()),
                ))
            }
            Value::Map(_) => match (payload.get("x"), payload.get("y")) {
                (Some(x), Some(y)) => (x, y),
                _ => return Err(ComponentError::malformed(Self::NAME, "missing 'x' or 'y'")),
            },
            other => {
                return Err(ComponentError::malformed(
                    Self::NAME,
                    format!("expected a list or a map, got {}", other.kind()),
                ))
            }
        };

        let coordinate = |value: &Value| {
            value.as_number().map(|n| n as f32).ok_or_else(|| {
                ComponentError::malformed(Self::NAME, format!("coordinate is a {}", value.kind()))
            })
        };
        self.x = coordinate(x)?;
        self.y = coordinate(y)?;
        Ok(())
    }

    fn field(&self, name: &str) -> Option<Value> {
        match name {
            "x" => Some(Value::from(self.x)),
            "y" => Some(Value::from(self.y)),
            _ => None,
        }
    }

    fn set_field(&mut self, name: &str, value: Value) -> Result<(), ComponentError> {
        match name {
            "x" => self.x = number_field(Self::NAME, name, &value)? as f32,
            "y" => self.y = number_field(Self::NAME, name, &value)? as f32,
            _ => {
                return Err(ComponentError::UnknownField {
                    component: Self::NAME.to_owned(),
                    field: name.to_owned(),
                })
            }
        }
        Ok(())
    }

    fn type_name(&self) -> &'static str {
        Self::NAME
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// A textured quad drawn by the orthogonal render system.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sprite {
    pub texture: String,
    pub layer: u32,
    pub frame: u32,
}

impl Sprite {
    pub const NAME: &'static str = "sprite";
}

impl Component for Sprite {
    fn initialize(&mut self, payload: &Value) -> Result<(), ComponentError> {
        if payload.as_map().is_none() {
            return Err(ComponentError::malformed(
                Self::NAME,
                format!("expected a map, got {}", payload.kind()),
            ));
        }
        self.texture = payload
            .get("texture")
            .and_then(Value::as_str)
            .ok_or_else(|| ComponentError::malformed(Self::NAME, "'texture' must be a string"))?
            .to_owned();
        if let Some(layer) = payload.get("layer") {
            self.layer = count_field(Self::NAME, "layer", layer)
                .map_err(|err| ComponentError::malformed(Self::NAME, err.to_string()))?;
        }
        if let Some(frame) = payload.get("frame") {
            self.frame = count_field(Self::NAME, "frame", frame)
                .map_err(|err| ComponentError::malformed(Self::NAME, err.to_string()))?;
        }
        Ok(())
    }

    fn field(&self, name: &str) -> Option<Value> {
        match name {
            "texture" => Some(Value::from(self.texture.as_str())),
            "layer" => Some(Value::from(self.layer)),
            "frame" => Some(Value::from(self.frame)),
            _ => None,
        }
    }

    fn set_field(&mut self, name: &str, value: Value) -> Result<(), ComponentError> {
        match name {
            "texture" => match value {
                Value::Str(texture) => self.texture = texture,
                other => return Err(field_type_error(Self::NAME, name, ValueKind::Str, &other)),
            },
            "layer" => self.layer = count_field(Self::NAME, name, &value)?,
            "frame" => self.frame = count_field(Self::NAME, name, &value)?,
            _ => {
                return Err(ComponentError::UnknownField {
                    component: Self::NAME.to_owned(),
                    field: name.to_owned(),
                })
            }
        }
        Ok(())
    }

    fn type_name(&self) -> &'static str {
        Self::NAME
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Positive and finite once narrowed to `f32`.
fn valid_frame_time(frame_time: f32) -> bool {
    frame_time.is_finite() && frame_time > 0.0
}

/// Frame-sheet animation state, advanced by the animation system.
#[derive(Debug, Clone, PartialEq)]
pub struct Animation {
    pub frames: u32,
    /// Seconds per frame
    pub frame_time: f32,
    pub looping: bool,
    pub current: u32,
    pub elapsed: f32,
}

impl Default for Animation {
    fn default() -> Self {
        Self {
            frames: 1,
            frame_time: 0.1,
            looping: true,
            current: 0,
            elapsed: 0.0,
        }
    }
}

impl Animation {
    pub const NAME: &'static str = "animation";

    /// Advance by `dt` seconds. Returns `true` if the frame changed.
    pub fn advance(&mut self, dt: f32) -> bool {
        if self.frames <= 1 || self.is_finished() || !valid_frame_time(self.frame_time) {
            return false;
        }
        self.elapsed += dt.max(0.0);
        if self.elapsed < self.frame_time {
            return false;
        }

        // Saturating cast; `%` keeps the remainder below one frame.
        let steps = (self.elapsed / self.frame_time) as u64;
        self.elapsed %= self.frame_time;

        let before = self.current;
        let frames = u64::from(self.frames);
        let target = u64::from(self.current).saturating_add(steps);
        if self.looping {
            self.current = (target % frames) as u32;
        } else if target >= frames - 1 {
            self.current = self.frames - 1;
            self.elapsed = 0.0;
        } else {
            self.current = target as u32;
        }
        before != self.current
    }

    /// A non-looping animation sitting on its last frame.
    pub fn is_finished(&self) -> bool {
        !self.looping && self.current + 1 >= self.frames
    }
}

impl Component for Animation {
    fn initialize(&mut self, payload: &Value) -> Result<(), ComponentError> {
        if payload.as_map().is_none() {
            return Err(ComponentError::malformed(
                Self::NAME,
                format!("expected a map, got {}", payload.kind()),
            ));
        }
        let frames = payload
            .get("frames")
            .and_then(Value::as_int)
            .filter(|n| *n >= 1)
            .ok_or_else(|| ComponentError::malformed(Self::NAME, "'frames' must be an integer >= 1"))?;
        let frame_time = payload
            .get("frame_time")
            .and_then(Value::as_number)
            .map(|t| t as f32)
            .filter(|t| valid_frame_time(*t))
            .ok_or_else(|| ComponentError::malformed(Self::NAME, "'frame_time' must be a positive number"))?;
        let looping = match payload.get("looping") {
            None => true,
            Some(value) => value
                .as_bool()
                .ok_or_else(|| ComponentError::malformed(Self::NAME, "'looping' must be a boolean"))?,
        };

        self.frames = u32::try_from(frames)
            .map_err(|_| ComponentError::malformed(Self::NAME, "'frames' is out of range"))?;
        self.frame_time = frame_time;
        self.looping = looping;
        self.current = 0;
        self.elapsed = 0.0;
        Ok(())
    }

    fn field(&self, name: &str) -> Option<Value> {
        match name {
            "frames" => Some(Value::from(self.frames)),
            "frame_time" => Some(Value::from(self.frame_time)),
            "looping" => Some(Value::from(self.looping)),
            "current" => Some(Value::from(self.current)),
            _ => None,
        }
    }

    fn set_field(&mut self, name: &str, value: Value) -> Result<(), ComponentError> {
        match name {
            "frames" => self.frames = count_field(Self::NAME, name, &value)?.max(1),
            "frame_time" => {
                let frame_time = number_field(Self::NAME, name, &value)? as f32;
                if !valid_frame_time(frame_time) {
                    return Err(ComponentError::malformed(
                        Self::NAME,
                        format!("'frame_time' must be a positive number, got {value}"),
                    ));
                }
                self.frame_time = frame_time;
            }
            "looping" => {
                self.looping = value
                    .as_bool()
                    .ok_or_else(|| field_type_error(Self::NAME, name, ValueKind::Bool, &value))?
            }
            "current" => {
                self.current = count_field(Self::NAME, name, &value)?.min(self.frames - 1);
                self.elapsed = 0.0;
            }
            _ => {
                return Err(ComponentError::UnknownField {
                    component: Self::NAME.to_owned(),
                    field: name.to_owned(),
                })
            }
        }
        Ok(())
    }

    fn type_name(&self) -> &'static str {
        Self::NAME
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
