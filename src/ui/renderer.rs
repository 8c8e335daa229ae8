/// Presentation layer: double-buffered, diff-based terminal renderer.
///
///   1. Compose the next frame into `front`
///   2. Compare each cell with `back` (previous frame)
///   3. Queue terminal commands only for changed cells, flush once
///   4. Swap front/back
///
/// One grid tile is two terminal columns wide. Entities are drawn at their
/// render position, so a horizontal step passes through the half-tile
/// column in between; vertical steps snap to the nearest row.

use std::io::{self, BufWriter, Write};

use crossterm::{
    cursor::{self, MoveTo},
    execute, queue,
    style::{Color, Print, ResetColor, SetBackgroundColor, SetForegroundColor},
    terminal::{self, Clear, ClearType},
};

use crate::domain::entity::{Direction, RenderPos};
use crate::domain::mode::{format_ms, GameMode, ModeKind};
use crate::domain::rules;
use crate::domain::tile::Tile;
use crate::sim::state::GameState;
use crate::sim::step::{self, Frame};
use crate::sim::world::WorldState;

// ── Cell: the unit of the back-buffer ──

#[derive(Clone, Copy, PartialEq, Eq)]
struct Cell {
    ch: char,
    fg: Color,
    bg: Color,
}

impl Cell {
    /// Every blank cell gets this explicit background so gaps between rows
    /// match on VTE terminals.
    const BASE_BG: Color = Color::Rgb { r: 22, g: 22, b: 35 };

    const BLANK: Cell = Cell { ch: ' ', fg: Color::White, bg: Cell::BASE_BG };

    /// Differs from every real cell; forces a full repaint.
    const INVALID: Cell = Cell { ch: '?', fg: Color::Magenta, bg: Color::Magenta };

    fn new(ch: char, fg: Color, bg: Color) -> Self {
        let bg = match bg {
            Color::Reset => Self::BASE_BG,
            other => other,
        };
        Cell { ch, fg, bg }
    }
}

// ── FrameBuffer: a 2D grid of Cells ──

struct FrameBuffer {
    width: usize,
    height: usize,
    cells: Vec<Cell>,
}

impl FrameBuffer {
    fn new(w: usize, h: usize) -> Self {
        FrameBuffer { width: w, height: h, cells: vec![Cell::BLANK; w * h] }
    }

    fn resize(&mut self, w: usize, h: usize) {
        if self.width != w || self.height != h {
            self.width = w;
            self.height = h;
            self.cells = vec![Cell::BLANK; w * h];
        }
    }

    fn clear(&mut self) {
        self.cells.fill(Cell::BLANK);
    }

    fn set(&mut self, x: usize, y: usize, cell: Cell) {
        if x < self.width && y < self.height {
            self.cells[y * self.width + x] = cell;
        }
    }

    fn get(&self, x: usize, y: usize) -> Cell {
        if x < self.width && y < self.height {
            self.cells[y * self.width + x]
        } else {
            Cell::BLANK
        }
    }

    fn put_str(&mut self, x: usize, y: usize, s: &str, fg: Color, bg: Color) {
        for (i, ch) in s.chars().enumerate() {
            if x + i >= self.width {
                break;
            }
            self.set(x + i, y, Cell::new(ch, fg, bg));
        }
    }

    /// Two-column glyph at a signed position (entities may sit half a tile
    /// left of the origin while animating).
    fn put_pair(&mut self, col: i32, row: i32, glyph: [char; 2], fg: Color, bg: Color) {
        if row < 0 {
            return;
        }
        for (i, ch) in glyph.into_iter().enumerate() {
            let c = col + i as i32;
            if c >= 0 {
                self.set(c as usize, row as usize, Cell::new(ch, fg, bg));
            }
        }
    }

    fn fill_row(&mut self, y: usize, bg: Color) {
        for x in 0..self.width {
            self.set(x, y, Cell::new(' ', Color::White, bg));
        }
    }

    fn fill_rect(&mut self, x: usize, y: usize, w: usize, h: usize, bg: Color) {
        for yy in y..y + h {
            for xx in x..x + w {
                self.set(xx, yy, Cell::new(' ', Color::White, bg));
            }
        }
    }
}

// ── Layout ──

const CELL_W: usize = 2;
const HUD_ROW: usize = 0;
const MAP_ROW: usize = 2;
/// HUD + gap above the map, message + gap + help below it.
const RESERVED_ROWS: usize = MAP_ROW + 4;

const GOLD: Color = Color::Rgb { r: 255, g: 200, b: 50 };
const GREEN: Color = Color::Rgb { r: 80, g: 255, b: 80 };
const CYAN: Color = Color::Rgb { r: 100, g: 200, b: 255 };
const RED: Color = Color::Rgb { r: 255, g: 80, b: 80 };
const HUD_BG: Color = Color::Rgb { r: 20, g: 20, b: 60 };
const MSG_BG: Color = Color::Rgb { r: 200, g: 180, b: 50 };
const FLOOR_BG: Color = Color::Rgb { r: 40, g: 38, b: 52 };
const WALL_FG: Color = Color::Rgb { r: 120, g: 110, b: 140 };
const OVERLAY_BG: Color = Color::Rgb { r: 40, g: 40, b: 40 };

/// Top-left terminal cell of the map: centred horizontally, below the HUD.
fn map_origin(term_w: usize, term_h: usize, grid_w: usize, grid_h: usize) -> (usize, usize) {
    let cols = grid_w * CELL_W;
    let x = term_w.saturating_sub(cols) / 2;
    let room = term_h.saturating_sub(RESERVED_ROWS);
    let y = MAP_ROW + room.saturating_sub(grid_h) / 2;
    (x, y)
}

/// Terminal cell for a render position relative to the map origin.
fn screen_pos(origin: (usize, usize), p: RenderPos) -> (i32, i32) {
    let col = origin.0 as i32 + (p.x * CELL_W as f32).round() as i32;
    let row = origin.1 as i32 + p.y.round() as i32;
    (col, row)
}

/// A settled box wedged into a goal-less corner can never reach a goal.
fn has_stuck_box(w: &WorldState) -> bool {
    !w.won
        && w.entities
            .boxes
            .iter()
            .any(|b| !b.is_moving && rules::is_corner_deadlock(&w.grid, b.grid_pos))
}

fn player_glyph(facing: Direction) -> [char; 2] {
    match facing {
        Direction::Up => ['@', '^'],
        Direction::Down => ['@', 'v'],
        Direction::Left => ['<', '@'],
        Direction::Right => ['@', '>'],
    }
}

fn mode_summary(mode: &GameMode) -> String {
    match mode {
        GameMode::Normal => "Normal".to_string(),
        GameMode::TimeAttack { time_goal_ms } => format!("Time Attack (goal {})", format_ms(*time_goal_ms)),
        GameMode::Challenge(l) => format!("Challenge ({} moves / {})", l.moves_limit, format_ms(l.time_limit_ms)),
    }
}

// ── Renderer ──

pub struct Renderer {
    writer: BufWriter<io::Stdout>,
    front: FrameBuffer,
    back: FrameBuffer,
    term_w: usize,
    term_h: usize,
    last_state: Option<GameState>,
    anim_tick: u32,
}

impl Renderer {
    pub fn new() -> Self {
        Renderer {
            writer: BufWriter::with_capacity(16384, io::stdout()),
            front: FrameBuffer::new(0, 0),
            back: FrameBuffer::new(0, 0),
            term_w: 0,
            term_h: 0,
            last_state: None,
            anim_tick: 0,
        }
    }

    pub fn init(&mut self) -> io::Result<()> {
        terminal::enable_raw_mode()?;
        execute!(
            self.writer,
            terminal::EnterAlternateScreen,
            cursor::Hide,
            SetBackgroundColor(Cell::BASE_BG),
            Clear(ClearType::All)
        )?;
        let (tw, th) = terminal::size().unwrap_or((80, 24));
        self.term_w = tw as usize;
        self.term_h = th as usize;
        self.front.resize(self.term_w, self.term_h);
        self.back.resize(self.term_w, self.term_h);
        self.back.cells.fill(Cell::INVALID);
        Ok(())
    }

    pub fn cleanup(&mut self) -> io::Result<()> {
        execute!(self.writer, ResetColor, cursor::Show, terminal::LeaveAlternateScreen)?;
        terminal::disable_raw_mode()
    }

    pub fn render(&mut self, world: &WorldState, frame: &Frame) -> io::Result<()> {
        self.anim_tick = self.anim_tick.wrapping_add(1);

        let (tw, th) = terminal::size().unwrap_or((80, 24));
        if tw as usize != self.term_w || th as usize != self.term_h {
            self.term_w = tw as usize;
            self.term_h = th as usize;
            self.front.resize(self.term_w, self.term_h);
            self.back.resize(self.term_w, self.term_h);
            self.back.cells.fill(Cell::INVALID);
            queue!(self.writer, SetBackgroundColor(Cell::BASE_BG), Clear(ClearType::All))?;
        }

        let state = world.state();
        if self.last_state != Some(state) {
            self.back.cells.fill(Cell::INVALID);
            queue!(self.writer, SetBackgroundColor(Cell::BASE_BG), Clear(ClearType::All))?;
            self.last_state = Some(state);
        }

        self.front.clear();
        match state {
            GameState::Loading => self.compose_loading(),
            GameState::Intro => self.compose_intro(world),
            GameState::ModeSelect => self.compose_mode_select(world),
            GameState::LevelSelect => self.compose_level_select(world),
            GameState::Play => self.compose_game(world, frame),
            GameState::Win => {
                self.compose_game(world, frame);
                self.compose_win_overlay(world);
            }
            GameState::Paused => {
                self.compose_game(world, frame);
                self.compose_pause_overlay(world);
            }
            GameState::Editor => self.compose_editor(),
        }

        self.flush_diff()?;
        std::mem::swap(&mut self.front, &mut self.back);
        Ok(())
    }

    // ── Diff flush: only write changed cells ──

    fn flush_diff(&mut self) -> io::Result<()> {
        let mut last_fg = Color::White;
        let mut last_bg = Cell::BASE_BG;
        let mut cursor_at: Option<(usize, usize)> = None;

        // Never ResetColor here: the terminal default may differ from BASE_BG.
        queue!(self.writer, SetForegroundColor(last_fg), SetBackgroundColor(last_bg))?;

        for y in 0..self.front.height {
            for x in 0..self.front.width {
                let cell = self.front.get(x, y);
                if cell == self.back.get(x, y) {
                    continue;
                }
                if cursor_at != Some((x, y)) {
                    queue!(self.writer, MoveTo(x as u16, y as u16))?;
                }
                if cell.fg != last_fg {
                    queue!(self.writer, SetForegroundColor(cell.fg))?;
                    last_fg = cell.fg;
                }
                if cell.bg != last_bg {
                    queue!(self.writer, SetBackgroundColor(cell.bg))?;
                    last_bg = cell.bg;
                }
                queue!(self.writer, Print(cell.ch))?;
                cursor_at = Some((x + 1, y));
            }
        }

        self.writer.flush()
    }

    // ── Compose: gameplay ──

    fn compose_game(&mut self, w: &WorldState, frame: &Frame) {
        let stats = step::get_stats(w);

        // HUD
        self.front.fill_row(HUD_ROW, HUD_BG);
        let hud = format!(
            " {:>2}. {:<18} {:<12} Moves:{:<4} Pushes:{:<4} ",
            w.current_level + 1,
            w.level_name,
            w.mode.mode.kind().label(),
            stats.moves,
            stats.pushes,
        );
        self.front.put_str(0, HUD_ROW, &hud, Color::White, HUD_BG);
        let time_fg = if stats.over_time_goal { RED } else { Color::White };
        let time = format!("Time:{}", format_ms(stats.elapsed_ms));
        let time_col = hud.chars().count();
        self.front.put_str(time_col, HUD_ROW, &time, time_fg, HUD_BG);

        let mut extra = format!("  Goals:{}/{}", w.entities.boxes_on_goals(), w.grid.goal_count());
        if let Some((moves_left, ms_left)) = stats.remaining {
            extra.push_str(&format!("  Left:{} / {}", moves_left, format_ms(ms_left)));
        }
        if let Some(best) = stats.best {
            extra.push_str(&format!("  Best:{}m {}p {}", best.moves, best.pushes, format_ms(best.time_ms)));
        }
        extra.push_str(&format!("  [{}]", w.tier.label()));
        self.front.put_str(time_col + time.chars().count(), HUD_ROW, &extra, CYAN, HUD_BG);

        // Map
        let origin = map_origin(self.term_w, self.term_h, w.grid.width(), w.grid.height());
        for gy in 0..w.grid.height() {
            for gx in 0..w.grid.width() {
                self.compose_tile(w, gx as i32, gy as i32, origin);
            }
        }

        for (b, pos) in w.entities.boxes.iter().zip(&frame.box_render_pos) {
            let (col, row) = screen_pos(origin, *pos);
            let fg = if b.on_goal && !b.is_moving { GREEN } else { Color::Rgb { r: 230, g: 150, b: 60 } };
            self.front.put_pair(col, row, ['[', ']'], fg, FLOOR_BG);
        }

        let (col, row) = screen_pos(origin, frame.player_render_pos);
        let player = &w.entities.player;
        let bob = player.idle_eligible() && (self.anim_tick / 20) % 2 == 1;
        let fg = if bob { Color::Rgb { r: 200, g: 230, b: 255 } } else { Color::White };
        self.front.put_pair(col, row, player_glyph(player.facing), fg, FLOOR_BG);

        // Message bar + help
        let below = origin.1 + w.grid.height();
        if !w.message.is_empty() && below + 1 < self.front.height {
            self.front.fill_row(below + 1, MSG_BG);
            self.front.put_str(0, below + 1, &format!(" * {} ", w.message), Color::Black, MSG_BG);
        } else if has_stuck_box(w) && below + 1 < self.front.height {
            self.front.put_str(0, below + 1, " A crate is stuck in a corner: undo or restart", RED, Color::Reset);
        }
        if below + 3 < self.front.height {
            let help = " Arrows/WASD:Move  U/Z:Undo  Y:Redo  R:Restart  P/Esc:Pause  F:Speed";
            self.front.put_str(0, below + 3, help, Color::DarkGrey, Color::Reset);
        }
    }

    fn compose_tile(&mut self, w: &WorldState, gx: i32, gy: i32, origin: (usize, usize)) {
        let col = origin.0 as i32 + gx * CELL_W as i32;
        let row = origin.1 as i32 + gy;
        let goal = w.grid.has_goal(gx, gy);
        match w.grid.tile_at(gx, gy) {
            Tile::Void => {}
            Tile::Wall => self.front.put_pair(col, row, ['█', '█'], WALL_FG, Color::Reset),
            Tile::Floor | Tile::Spawn if goal => self.front.put_pair(col, row, ['(', ')'], GOLD, FLOOR_BG),
            Tile::Floor | Tile::Spawn => self.front.put_pair(col, row, [' ', ' '], Color::White, FLOOR_BG),
        }
    }

    // ── Compose: menus ──

    fn compose_loading(&mut self) {
        self.front.put_str(4, 2, "Loading...", Color::DarkGrey, Color::Reset);
    }

    fn compose_intro(&mut self, w: &WorldState) {
        let title = [
            r"  ___         _    _            ",
            r" | _ \_  _ __| |_ | |__  ___ __ __",
            r" |  _/ || (_-< ' \| '_ \/ _ \\ \ /",
            r" |_|  \_,_/__/_||_|_.__/\___//_\_\",
        ];
        for (i, line) in title.iter().enumerate() {
            self.front.put_str(2, 2 + i, line, GOLD, Color::Reset);
        }
        self.front.put_str(6, 7, "push every crate onto a goal", GREEN, Color::Reset);

        let base = 10;
        self.front.put_str(8, base, "ENTER   Play", GREEN, Color::Reset);
        self.front.put_str(8, base + 1, "  E     Level Editor", Color::White, Color::Reset);
        self.front.put_str(8, base + 2, "  Q     Quit", Color::White, Color::Reset);

        let done = w.progress.completed.len();
        let info = format!("{} levels, {} solved", w.level_count(), done);
        self.front.put_str(8, base + 4, &info, Color::DarkGrey, Color::Reset);
        self.compose_message_bottom(w);
    }

    fn compose_mode_select(&mut self, w: &WorldState) {
        self.front.put_str(2, 1, "SELECT MODE", GOLD, Color::Reset);
        let blurbs = [
            "Solve at your own pace. Best moves, pushes and time are kept.",
            "A goal time per level. The clock turns red once you pass it.",
            "Limited moves and time. Run out and the attempt is over.",
        ];
        for (i, kind) in ModeKind::ALL.iter().enumerate() {
            let row = 4 + i * 3;
            let selected = i == w.mode_cursor;
            let (fg, arrow) = if selected { (GREEN, ">") } else { (Color::White, " ") };
            self.front.put_str(2, row, arrow, fg, Color::Reset);
            self.front.put_str(4, row, kind.label(), fg, Color::Reset);
            self.front.put_str(6, row + 1, blurbs[i], Color::DarkGrey, Color::Reset);
        }
        let footer = 4 + ModeKind::ALL.len() * 3 + 1;
        self.front.put_str(2, footer, "ENTER: Choose   Up/Down: Select   ESC: Back", Color::DarkGrey, Color::Reset);
    }

    fn compose_level_select(&mut self, w: &WorldState) {
        let header = format!("LEVEL SELECT  ({})", w.mode_kind.label());
        self.front.put_str(2, 1, &header, GOLD, Color::Reset);

        let list_top = 3;
        let visible = 16_usize.min(self.front.height.saturating_sub(list_top + 3));
        let total = w.level_count();
        let scroll = w.select_scroll;
        let cursor_bg = Color::Rgb { r: 30, g: 60, b: 30 };

        for i in 0..visible {
            let idx = scroll + i;
            if idx >= total {
                break;
            }
            let row = list_top + i;
            let name = w.levels[idx].display_name(idx);
            let mark = if w.progress.is_completed(idx) { "+" } else { " " };
            let best = w
                .progress
                .best_for(idx, w.mode_kind)
                .map(|b| format!("{:>4}m {:>4}p  {}", b.moves, b.pushes, format_ms(b.time_ms)))
                .unwrap_or_default();
            let line = format!("{} {:>3}. {:<28} {}", mark, idx + 1, name, best);

            if idx == w.select_cursor {
                for x in 0..60.min(self.front.width) {
                    self.front.set(x, row, Cell::new(' ', Color::White, cursor_bg));
                }
                self.front.put_str(1, row, &line, GREEN, cursor_bg);
            } else {
                self.front.put_str(1, row, &line, Color::White, Color::Reset);
            }
        }
        if scroll > 0 {
            self.front.put_str(6, list_top - 1, "^ ^ ^", Color::DarkGrey, Color::Reset);
        }
        if scroll + visible < total {
            self.front.put_str(6, list_top + visible, "v v v", Color::DarkGrey, Color::Reset);
        }
        let footer = list_top + visible + 1;
        self.front.put_str(2, footer, "ENTER: Start   Up/Down: Select", Color::DarkGrey, Color::Reset);
    }

    fn compose_editor(&mut self) {
        self.front.put_str(2, 2, "LEVEL EDITOR", GOLD, Color::Reset);
        self.front.put_str(2, 4, "Edit levels.json directly; the terminal build has no editor.", Color::White, Color::Reset);
        self.front.put_str(2, 6, "ESC: Back", Color::DarkGrey, Color::Reset);
    }

    // ── Compose: overlays ──

    fn overlay_box(&mut self, w: usize, h: usize) -> (usize, usize) {
        let bw = w.min(self.front.width);
        let bh = h.min(self.front.height.saturating_sub(MAP_ROW));
        let x = self.front.width.saturating_sub(bw) / 2;
        let y = MAP_ROW + self.front.height.saturating_sub(MAP_ROW + bh) / 2;
        self.front.fill_rect(x, y, bw, bh, OVERLAY_BG);
        (x, y)
    }

    fn compose_win_overlay(&mut self, w: &WorldState) {
        let stats = step::get_stats(w);
        let (x, y) = self.overlay_box(40, 11);
        self.front.put_str(x + 12, y + 1, "LEVEL SOLVED!", GOLD, OVERLAY_BG);
        let line = format!("{} moves  {} pushes  {}", stats.moves, stats.pushes, format_ms(stats.elapsed_ms));
        self.front.put_str(x + 3, y + 3, &line, Color::White, OVERLAY_BG);
        if let Some(best) = stats.best {
            let b = format!("best {}m {}p {}", best.moves, best.pushes, format_ms(best.time_ms));
            self.front.put_str(x + 3, y + 4, &b, CYAN, OVERLAY_BG);
        }
        let has_next = w.current_level + 1 < w.level_count();
        let next_fg = if has_next { GREEN } else { Color::DarkGrey };
        self.front.put_str(x + 3, y + 6, "N/ENTER  Next level", next_fg, OVERLAY_BG);
        self.front.put_str(x + 3, y + 7, "R        Replay", CYAN, OVERLAY_BG);
        self.front.put_str(x + 3, y + 8, "M/ESC    Mode select", CYAN, OVERLAY_BG);
    }

    fn compose_pause_overlay(&mut self, w: &WorldState) {
        let (x, y) = self.overlay_box(40, 12);
        let blink = (self.anim_tick / 8) % 2 == 0;
        let title = match w.failure {
            Some(reason) => format!("OUT OF {}", reason.label().to_uppercase()),
            None if blink => "> PAUSED <".to_string(),
            None => "  PAUSED  ".to_string(),
        };
        let fg = if w.failure.is_some() { RED } else { GOLD };
        self.front.put_str(x + 14, y + 1, &title, fg, OVERLAY_BG);
        self.front.put_str(x + 3, y + 3, &mode_summary(&w.mode.mode), Color::Rgb { r: 180, g: 180, b: 180 }, OVERLAY_BG);

        let resume = if w.failure.is_some() { "P/ENTER  Try again" } else { "P/ENTER  Resume" };
        self.front.put_str(x + 3, y + 5, resume, CYAN, OVERLAY_BG);
        self.front.put_str(x + 3, y + 6, "R        Restart level", CYAN, OVERLAY_BG);
        self.front.put_str(x + 3, y + 7, "L        Level select", CYAN, OVERLAY_BG);
        self.front.put_str(x + 3, y + 8, "ESC      Title", CYAN, OVERLAY_BG);
    }

    fn compose_message_bottom(&mut self, w: &WorldState) {
        if w.message.is_empty() {
            return;
        }
        let row = self.front.height.saturating_sub(1);
        self.front.fill_row(row, MSG_BG);
        self.front.put_str(0, row, &format!(" * {} ", w.message), Color::Black, MSG_BG);
    }
}
