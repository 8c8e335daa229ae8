/// Gamepad input tracker using gilrs.
///
/// Button mapping comes from the `[gamepad]` section of config.toml via
/// `load_button_config()`. Defaults:
///   D-pad / Left Stick    →  Move (held) / menu cursor (pressed)
///   B / L1                →  Undo
///   R1                    →  Redo
///   A / Start             →  Confirm / Pause
///   Select                →  Cancel / Back
///   Y                     →  Restart level

#[cfg(feature = "gamepad")]
use gilrs::{Axis, Button, EventType, Gilrs};

use crate::config::GamepadConfig;

#[cfg_attr(not(feature = "gamepad"), allow(dead_code))]
const STICK_DEADZONE: f32 = 0.25;

/// Logical button identifiers (one per physical button).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Btn {
    A,       // South
    B,       // East
    X,       // West
    Y,       // North
    L1,
    R1,
    L2,
    R2,
    Start,
    Select,
}

impl Btn {
    fn from_name(s: &str) -> Option<Btn> {
        match s.to_uppercase().as_str() {
            "A" | "SOUTH" => Some(Btn::A),
            "B" | "EAST" => Some(Btn::B),
            "X" | "WEST" => Some(Btn::X),
            "Y" | "NORTH" => Some(Btn::Y),
            "L1" | "LB" => Some(Btn::L1),
            "R1" | "RB" => Some(Btn::R1),
            "L2" | "LT" => Some(Btn::L2),
            "R2" | "RT" => Some(Btn::R2),
            "START" => Some(Btn::Start),
            "SELECT" | "BACK" => Some(Btn::Select),
            _ => None,
        }
    }

    #[cfg(feature = "gamepad")]
    fn from_gilrs(btn: Button) -> Option<Btn> {
        match btn {
            Button::South => Some(Btn::A),
            Button::East => Some(Btn::B),
            Button::West => Some(Btn::X),
            Button::North => Some(Btn::Y),
            Button::LeftTrigger => Some(Btn::L1),
            Button::RightTrigger => Some(Btn::R1),
            Button::LeftTrigger2 => Some(Btn::L2),
            Button::RightTrigger2 => Some(Btn::R2),
            Button::Start => Some(Btn::Start),
            Button::Select => Some(Btn::Select),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
struct BtnState {
    held: bool,
    just_pressed: bool,
}

impl BtnState {
    fn set(&mut self, held: bool) {
        if held && !self.held {
            self.just_pressed = true;
        }
        self.held = held;
    }
}

/// Four directional inputs (d-pad or digitized stick), indexed U/D/L/R.
#[derive(Clone, Copy, Debug, Default)]
struct Cross {
    dirs: [BtnState; 4],
}

const CROSS_DELTAS: [(i32, i32); 4] = [(0, -1), (0, 1), (-1, 0), (1, 0)];

impl Cross {
    fn held(&self) -> Option<(i32, i32)> {
        self.dirs.iter().position(|b| b.held).map(|i| CROSS_DELTAS[i])
    }

    fn pressed(&self) -> Option<(i32, i32)> {
        self.dirs.iter().position(|b| b.just_pressed).map(|i| CROSS_DELTAS[i])
    }

    fn clear_edges(&mut self) {
        for d in &mut self.dirs {
            d.just_pressed = false;
        }
    }
}

/// Action-to-button mapping.
struct ActionMap {
    undo: Vec<Btn>,
    redo: Vec<Btn>,
    confirm: Vec<Btn>,
    cancel: Vec<Btn>,
    restart: Vec<Btn>,
}

impl Default for ActionMap {
    fn default() -> Self {
        ActionMap {
            undo: vec![Btn::B, Btn::L1],
            redo: vec![Btn::R1],
            confirm: vec![Btn::A, Btn::Start],
            cancel: vec![Btn::Select],
            restart: vec![Btn::Y],
        }
    }
}

pub struct GamepadState {
    #[cfg(feature = "gamepad")]
    gilrs: Option<Gilrs>,

    buttons: [BtnState; 10],
    dpad: Cross,
    stick: Cross,
    #[cfg_attr(not(feature = "gamepad"), allow(dead_code))]
    stick_xy: (f32, f32),

    action_map: ActionMap,

    pub connected: bool,
}

impl GamepadState {
    pub fn new() -> Self {
        #[cfg(feature = "gamepad")]
        let (gilrs, connected) = match Gilrs::new() {
            Ok(g) => {
                let has_pad = g.gamepads().next().is_some();
                (Some(g), has_pad)
            }
            Err(e) => {
                log::warn!("gamepad support unavailable: {e}");
                (None, false)
            }
        };
        #[cfg(not(feature = "gamepad"))]
        let connected = false;

        GamepadState {
            #[cfg(feature = "gamepad")]
            gilrs,
            buttons: [BtnState::default(); 10],
            dpad: Cross::default(),
            stick: Cross::default(),
            stick_xy: (0.0, 0.0),
            action_map: ActionMap::default(),
            connected,
        }
    }

    /// Apply the configured mapping. Empty or unrecognised lists keep
    /// the defaults for that action.
    pub fn load_button_config(&mut self, cfg: &GamepadConfig) {
        fn apply(slot: &mut Vec<Btn>, names: &[String]) {
            let parsed: Vec<Btn> = names.iter().filter_map(|s| Btn::from_name(s)).collect();
            if !parsed.is_empty() {
                *slot = parsed;
            }
        }
        let map = &mut self.action_map;
        apply(&mut map.undo, &cfg.undo);
        apply(&mut map.redo, &cfg.redo);
        apply(&mut map.confirm, &cfg.confirm);
        apply(&mut map.cancel, &cfg.cancel);
        apply(&mut map.restart, &cfg.restart);
    }

    /// Poll once per frame.
    pub fn update(&mut self) {
        for b in &mut self.buttons {
            b.just_pressed = false;
        }
        self.dpad.clear_edges();
        self.stick.clear_edges();

        #[cfg(feature = "gamepad")]
        self.poll_gilrs();
    }

    #[cfg(feature = "gamepad")]
    fn poll_gilrs(&mut self) {
        let Some(gilrs) = &mut self.gilrs else { return };
        let events: Vec<_> = std::iter::from_fn(|| gilrs.next_event()).collect();

        for event in events {
            match event.event {
                EventType::ButtonPressed(btn, _) => {
                    self.connected = true;
                    self.set_button(btn, true);
                }
                EventType::ButtonReleased(btn, _) => self.set_button(btn, false),
                EventType::AxisChanged(Axis::LeftStickX, v, _) => self.stick_xy.0 = v,
                EventType::AxisChanged(Axis::LeftStickY, v, _) => self.stick_xy.1 = v,
                EventType::Connected => self.connected = true,
                EventType::Disconnected => {
                    self.connected = false;
                    self.release_all();
                }
                _ => {}
            }
        }

        // gilrs: stick Y is positive upward
        let (x, y) = self.stick_xy;
        let [up, down, left, right] = &mut self.stick.dirs;
        up.set(y > STICK_DEADZONE);
        down.set(y < -STICK_DEADZONE);
        left.set(x < -STICK_DEADZONE);
        right.set(x > STICK_DEADZONE);
    }

    #[cfg(feature = "gamepad")]
    fn set_button(&mut self, btn: Button, held: bool) {
        let dpad_slot = match btn {
            Button::DPadUp => Some(0),
            Button::DPadDown => Some(1),
            Button::DPadLeft => Some(2),
            Button::DPadRight => Some(3),
            _ => None,
        };
        if let Some(i) = dpad_slot {
            self.dpad.dirs[i].set(held);
        } else if let Some(b) = Btn::from_gilrs(btn) {
            self.buttons[b as usize].set(held);
        }
    }

    #[cfg_attr(not(feature = "gamepad"), allow(dead_code))]
    fn release_all(&mut self) {
        self.buttons = [BtnState::default(); 10];
        self.dpad = Cross::default();
        self.stick = Cross::default();
        self.stick_xy = (0.0, 0.0);
    }

    // ── Action queries ──

    fn any_just_pressed(&self, btns: &[Btn]) -> bool {
        btns.iter().any(|&b| self.buttons[b as usize].just_pressed)
    }

    pub fn undo_pressed(&self) -> bool {
        self.any_just_pressed(&self.action_map.undo)
    }
    pub fn redo_pressed(&self) -> bool {
        self.any_just_pressed(&self.action_map.redo)
    }
    pub fn confirm_pressed(&self) -> bool {
        self.any_just_pressed(&self.action_map.confirm)
    }
    pub fn cancel_pressed(&self) -> bool {
        self.any_just_pressed(&self.action_map.cancel)
    }
    pub fn restart_pressed(&self) -> bool {
        self.any_just_pressed(&self.action_map.restart)
    }

    /// Held movement direction; the d-pad wins over the stick.
    pub fn held_direction(&self) -> Option<(i32, i32)> {
        self.dpad.held().or_else(|| self.stick.held())
    }

    pub fn pressed_direction(&self) -> Option<(i32, i32)> {
        self.dpad.pressed().or_else(|| self.stick.pressed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn button_names_parse_case_insensitively() {
        assert_eq!(Btn::from_name("start"), Some(Btn::Start));
        assert_eq!(Btn::from_name("lb"), Some(Btn::L1));
        assert_eq!(Btn::from_name("Back"), Some(Btn::Select));
        assert_eq!(Btn::from_name("turbo"), None);
    }

    #[test]
    fn config_overrides_only_valid_lists() {
        let mut pad = GamepadState::new();
        let cfg = GamepadConfig {
            undo: vec!["X".into()],
            redo: vec!["nonsense".into()],
            confirm: vec![],
            cancel: vec!["B".into()],
            restart: vec!["Start".into(), "Y".into()],
        };
        pad.load_button_config(&cfg);
        assert_eq!(pad.action_map.undo, vec![Btn::X]);
        assert_eq!(pad.action_map.redo, vec![Btn::R1]);
        assert_eq!(pad.action_map.confirm, vec![Btn::A, Btn::Start]);
        assert_eq!(pad.action_map.restart, vec![Btn::Start, Btn::Y]);
    }

    #[test]
    fn press_is_an_edge_and_hold_persists() {
        let mut pad = GamepadState::new();
        pad.buttons[Btn::B as usize].set(true);
        assert!(pad.undo_pressed());
        pad.update();
        assert!(!pad.undo_pressed());
        assert!(pad.buttons[Btn::B as usize].held);

        pad.dpad.dirs[2].set(true);
        assert_eq!(pad.pressed_direction(), Some((-1, 0)));
        pad.update();
        assert_eq!(pad.pressed_direction(), None);
        assert_eq!(pad.held_direction(), Some((-1, 0)));
    }
}
