/// Animation scheduler: an arena of per-entity tweens polled once per frame.
///
/// A tween moves one entity's `render_pos` from a source cell to a
/// destination cell over `duration_ms`, with quadratic in/out easing.
/// When it reaches the end, `advance` commits the logical position, clears
/// the moving flag, bumps the matching counter and reports a completion.
///
/// Boxes are always advanced before the player so that a player completion
/// (which triggers win detection) sees every box of the same move settled.
///
/// Cancelled tweens vanish without completing: no commit, no counters.

use crate::domain::entity::{EntityRegistry, RenderPos};
use crate::domain::grid::{GridPos, LevelGrid};
use crate::domain::mode::ModeState;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum TweenTarget {
    Player,
    Box(usize),
}

#[derive(Clone, Copy, Debug)]
pub struct Tween {
    pub target: TweenTarget,
    pub from: GridPos,
    pub to: GridPos,
    pub start_ms: u64,
    pub duration_ms: u64,
}

impl Tween {
    /// Linear progress in `[0, 1]`.
    pub fn progress(&self, now: u64) -> f32 {
        if self.duration_ms == 0 || now >= self.start_ms + self.duration_ms {
            return 1.0;
        }
        let elapsed = now.saturating_sub(self.start_ms) as f32;
        (elapsed / self.duration_ms as f32).clamp(0.0, 1.0)
    }

    pub fn position(&self, now: u64) -> RenderPos {
        RenderPos::lerp(self.from, self.to, ease_in_out_quad(self.progress(now)))
    }

    pub fn is_done(&self, now: u64) -> bool {
        self.progress(now) >= 1.0
    }
}

/// Quadratic ease-in/ease-out on `[0, 1]`.
pub fn ease_in_out_quad(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    if t < 0.5 {
        2.0 * t * t
    } else {
        let u = -2.0 * t + 2.0;
        1.0 - u * u / 2.0
    }
}

/// A tween that reached its end during `advance`.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct TweenCompletion {
    pub target: TweenTarget,
    pub at: GridPos,
}

#[derive(Clone, Debug, Default)]
pub struct TweenSet {
    tweens: Vec<Tween>,
}

impl TweenSet {
    pub fn new() -> Self {
        TweenSet { tweens: Vec::with_capacity(2) }
    }

    /// Start a tween and mark its entity moving. Any earlier tween for the
    /// same entity is dropped first, so an entity never has two.
    pub fn start(&mut self, tween: Tween, entities: &mut EntityRegistry) {
        self.tweens.retain(|t| t.target != tween.target);
        match tween.target {
            TweenTarget::Player => {
                let p = &mut entities.player;
                p.is_moving = true;
                p.target = Some(tween.to);
                p.render_pos = tween.from.into();
            }
            TweenTarget::Box(id) => {
                if let Some(b) = entities.boxes.get_mut(id) {
                    b.is_moving = true;
                    b.render_pos = tween.from.into();
                }
            }
        }
        self.tweens.push(tween);
    }

    pub fn is_empty(&self) -> bool {
        self.tweens.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tweens.len()
    }

    pub fn has_player_tween(&self) -> bool {
        self.tweens.iter().any(|t| t.target == TweenTarget::Player)
    }

    /// Advance every tween to `now`. Finished tweens commit their entity
    /// and are removed; completions are returned boxes-first.
    pub fn advance(
        &mut self,
        now: u64,
        entities: &mut EntityRegistry,
        grid: &LevelGrid,
        counters: &mut ModeState,
    ) -> Vec<TweenCompletion> {
        // Boxes before the player, stable otherwise.
        self.tweens.sort_by_key(|t| matches!(t.target, TweenTarget::Player));

        let mut done = vec![];
        self.tweens.retain(|tween| {
            let finished = tween.is_done(now);
            match tween.target {
                TweenTarget::Player => {
                    let p = &mut entities.player;
                    if finished {
                        p.grid_pos = tween.to;
                        p.render_pos = tween.to.into();
                        p.is_moving = false;
                        p.target = None;
                        counters.move_count += 1;
                    } else {
                        p.render_pos = tween.position(now);
                    }
                }
                TweenTarget::Box(id) => {
                    let Some(b) = entities.boxes.get_mut(id) else {
                        return false;
                    };
                    if finished {
                        b.snap_to(tween.to, grid);
                        counters.push_count += 1;
                    } else {
                        b.render_pos = tween.position(now);
                    }
                }
            }
            if finished {
                done.push(TweenCompletion { target: tween.target, at: tween.to });
            }
            !finished
        });
        done
    }

    /// Discard every tween without completing it, then snap all entities
    /// onto their logical cells. Returns how many tweens were dropped.
    pub fn cancel_all(&mut self, entities: &mut EntityRegistry) -> usize {
        let dropped = self.tweens.len();
        self.tweens.clear();
        entities.settle_all();
        dropped
    }
}
