/// Keyboard state tracker.
///
/// Movement is hold-to-repeat: the host asks for the held direction every
/// frame and the core swallows it while a step is still animating, so a
/// held key walks one tile per tween. Everything else (undo, menus) is
/// edge-triggered on the initial press.
///
/// Terminals that report key Release events (keyboard enhancement) are
/// honored; elsewhere a key counts as released after HOLD_TIMEOUT without
/// a Press/Repeat.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crossterm::event::{self, poll, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

/// Longer than the typical autorepeat delay so a held key does not flicker.
const HOLD_TIMEOUT: Duration = Duration::from_millis(160);

const DIRECTION_KEYS: [(KeyCode, (i32, i32)); 12] = [
    (KeyCode::Up, (0, -1)),
    (KeyCode::Down, (0, 1)),
    (KeyCode::Left, (-1, 0)),
    (KeyCode::Right, (1, 0)),
    (KeyCode::Char('w'), (0, -1)),
    (KeyCode::Char('s'), (0, 1)),
    (KeyCode::Char('a'), (-1, 0)),
    (KeyCode::Char('d'), (1, 0)),
    (KeyCode::Char('k'), (0, -1)),
    (KeyCode::Char('j'), (0, 1)),
    (KeyCode::Char('h'), (-1, 0)),
    (KeyCode::Char('l'), (1, 0)),
];

pub struct InputState {
    /// Last Press/Repeat per key.
    last_active: HashMap<KeyCode, Instant>,
    /// Keys that went from released to held in the latest drain.
    fresh_presses: Vec<KeyCode>,
    /// Raw key events from the latest drain (menus, text-like input).
    pub raw_events: Vec<KeyEvent>,
    /// Terminal was resized during the latest drain.
    pub resized: bool,
    /// Only true when keyboard enhancement is confirmed working.
    pub honor_release: bool,
}

impl InputState {
    pub fn new() -> Self {
        InputState {
            last_active: HashMap::with_capacity(16),
            fresh_presses: Vec::with_capacity(8),
            raw_events: Vec::with_capacity(8),
            resized: false,
            honor_release: false,
        }
    }

    /// Read every pending terminal event without blocking. Call once per
    /// frame, before `tick`.
    pub fn drain_events(&mut self) {
        self.fresh_presses.clear();
        self.raw_events.clear();
        self.resized = false;

        while poll(Duration::ZERO).unwrap_or(false) {
            match event::read() {
                Ok(Event::Key(key)) => self.record_key(key, Instant::now()),
                Ok(Event::Resize(_, _)) => self.resized = true,
                _ => {}
            }
        }

        let now = Instant::now();
        self.last_active.retain(|_, t| now.duration_since(*t) < HOLD_TIMEOUT);
    }

    fn record_key(&mut self, key: KeyEvent, at: Instant) {
        self.raw_events.push(key);
        match key.kind {
            KeyEventKind::Release if self.honor_release => {
                self.last_active.remove(&key.code);
            }
            KeyEventKind::Release => {}
            _ => {
                let was_held = self.is_held(key.code);
                self.last_active.insert(key.code, at);
                if !was_held {
                    self.fresh_presses.push(key.code);
                }
            }
        }
    }

    pub fn is_held(&self, code: KeyCode) -> bool {
        self.last_active
            .get(&code)
            .is_some_and(|t| t.elapsed() < HOLD_TIMEOUT)
    }

    pub fn was_pressed(&self, code: KeyCode) -> bool {
        self.fresh_presses.contains(&code)
    }

    pub fn any_pressed(&self, codes: &[KeyCode]) -> bool {
        codes.iter().any(|c| self.was_pressed(*c))
    }

    /// Unit vector of the most recently pressed direction key still held.
    pub fn held_direction(&self) -> Option<(i32, i32)> {
        DIRECTION_KEYS
            .iter()
            .filter_map(|(code, d)| self.last_active.get(code).map(|t| (*t, *d)))
            .filter(|(t, _)| t.elapsed() < HOLD_TIMEOUT)
            .max_by_key(|(t, _)| *t)
            .map(|(_, d)| d)
    }

    /// Direction of a key pressed this frame (menus move one row per press).
    pub fn pressed_direction(&self) -> Option<(i32, i32)> {
        DIRECTION_KEYS
            .iter()
            .find(|(code, _)| self.was_pressed(*code))
            .map(|(_, d)| *d)
    }

    pub fn ctrl_c_pressed(&self) -> bool {
        self.raw_events.iter().any(|k| {
            k.modifiers.contains(KeyModifiers::CONTROL)
                && matches!(k.code, KeyCode::Char('c') | KeyCode::Char('C'))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn first_press_is_fresh_repeat_is_not() {
        let mut input = InputState::new();
        input.record_key(press(KeyCode::Char('u')), Instant::now());
        assert!(input.was_pressed(KeyCode::Char('u')));
        input.fresh_presses.clear();
        input.record_key(press(KeyCode::Char('u')), Instant::now());
        assert!(!input.was_pressed(KeyCode::Char('u')));
        assert!(input.is_held(KeyCode::Char('u')));
    }

    #[test]
    fn latest_direction_wins() {
        let mut input = InputState::new();
        let t0 = Instant::now();
        input.record_key(press(KeyCode::Left), t0);
        input.record_key(press(KeyCode::Up), t0 + Duration::from_millis(5));
        assert_eq!(input.held_direction(), Some((0, -1)));
        assert_eq!(input.pressed_direction().map(|(dx, dy)| dx.abs() + dy.abs()), Some(1));
    }

    #[test]
    fn release_only_counts_when_honored() {
        let mut input = InputState::new();
        let mut release = press(KeyCode::Right);
        release.kind = KeyEventKind::Release;

        input.record_key(press(KeyCode::Right), Instant::now());
        input.record_key(release, Instant::now());
        assert!(input.is_held(KeyCode::Right));

        input.honor_release = true;
        input.record_key(release, Instant::now());
        assert!(!input.is_held(KeyCode::Right));
        assert_eq!(input.held_direction(), None);
    }

    #[test]
    fn detects_ctrl_c() {
        let mut input = InputState::new();
        input.record_key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL), Instant::now());
        assert!(input.ctrl_c_pressed());
    }
}
