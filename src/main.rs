/// Entry point and frame loop.
///
/// The loop owns the clock: every frame it drains input, applies
/// commands to the core, calls `step::tick` with the elapsed session time
/// and hands the resulting `Frame` to the renderer.

mod config;
mod domain;
mod sim;
mod ui;

use std::time::{Duration, Instant};

use crossterm::event::KeyCode;
use env_logger::Env;
use log::info;

use config::GameConfig;
use domain::mode::{format_ms, ModeKind};
use sim::event::GameEvent;
use sim::level;
use sim::progress::FileProgressStore;
use sim::state::GameState;
use sim::step::{self, Frame};
use sim::world::WorldState;
use ui::gamepad::GamepadState;
use ui::input::InputState;
use ui::renderer::Renderer;
use ui::sound::SoundEngine;

/// Frames a status message stays on screen.
const MESSAGE_FRAMES: u32 = 90;
const SELECT_VISIBLE: usize = 16;

fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("warn")).init();

    let config = GameConfig::load();
    let levels = level::load_library(&config.levels_file);
    info!("{} levels available", levels.len());

    let store = FileProgressStore::new(config.progress_file.clone());
    let mut world = WorldState::new(&config, levels).with_store(Box::new(store));
    step::transition(&mut world, GameState::Intro);

    let mut renderer = Renderer::new();
    if let Err(e) = renderer.init() {
        eprintln!("Terminal init failed: {e}");
        return;
    }

    let sound = SoundEngine::new();
    let result = game_loop(&mut world, &mut renderer, sound.as_ref(), &config);

    if let Err(e) = renderer.cleanup() {
        eprintln!("Terminal cleanup failed: {e}");
    }
    if let Err(e) = result {
        eprintln!("Game error: {e}");
    }

    println!();
    println!("Thanks for playing Pushbox! {} levels solved.", world.progress.completed.len());
}

fn game_loop(
    world: &mut WorldState,
    renderer: &mut Renderer,
    sound: Option<&SoundEngine>,
    config: &GameConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut kb = InputState::new();
    let mut gp = GamepadState::new();
    gp.load_button_config(&config.gamepad);
    let started = Instant::now();
    let frame_sleep = Duration::from_millis(config.speed.frame_ms);

    loop {
        kb.drain_events();
        gp.update();

        if kb.ctrl_c_pressed() {
            break;
        }
        if kb.resized {
            step::cancel_motion(world);
        }
        if handle_input(world, &kb, &gp) {
            break;
        }

        let now = started.elapsed().as_millis() as u64;
        let frame = step::tick(world, now);
        process_events(world, sound, &frame);

        if world.message_timer > 0 {
            world.message_timer -= 1;
            if world.message_timer == 0 {
                world.message.clear();
            }
        }

        renderer.render(world, &frame)?;
        std::thread::sleep(frame_sleep);
    }

    Ok(())
}

fn process_events(world: &mut WorldState, sound: Option<&SoundEngine>, frame: &Frame) {
    for event in &frame.events {
        match event {
            GameEvent::Cue(cue) => {
                if let Some(sfx) = sound {
                    sfx.play(*cue);
                }
            }
            GameEvent::LevelFallback { index, reason } => {
                world.set_message(&format!("Level {} unusable ({reason}); playing the default", index + 1), MESSAGE_FRAMES);
            }
            GameEvent::LevelWon { new_best: true, time_ms, .. } => {
                world.set_message(&format!("New best! {}", format_ms(*time_ms)), MESSAGE_FRAMES);
            }
            GameEvent::ConstraintFailed(reason) => {
                world.set_message(&format!("Out of {}", reason.label()), MESSAGE_FRAMES);
            }
            GameEvent::ProgressSaveFailed(e) => {
                world.set_message(&format!("Progress not saved: {e}"), MESSAGE_FRAMES);
            }
            _ => {}
        }
    }
}

// ── Key Constants ──

const KEYS_CONFIRM: &[KeyCode] = &[KeyCode::Enter, KeyCode::Char(' ')];
const KEYS_UNDO: &[KeyCode] = &[KeyCode::Char('u'), KeyCode::Char('U'), KeyCode::Char('z'), KeyCode::Char('Z')];
const KEYS_REDO: &[KeyCode] = &[KeyCode::Char('y'), KeyCode::Char('Y')];
const KEYS_RESTART: &[KeyCode] = &[KeyCode::Char('r'), KeyCode::Char('R'), KeyCode::Backspace, KeyCode::F(2)];
const KEYS_PAUSE: &[KeyCode] = &[KeyCode::Char('p'), KeyCode::Char('P'), KeyCode::Esc, KeyCode::F(1)];
const KEYS_SPEED: &[KeyCode] = &[KeyCode::Char('f'), KeyCode::Char('F')];

/// Returns true when the player asked to quit.
fn handle_input(world: &mut WorldState, kb: &InputState, gp: &GamepadState) -> bool {
    let confirm = kb.any_pressed(KEYS_CONFIRM) || gp.confirm_pressed();
    let esc = kb.was_pressed(KeyCode::Esc) || gp.cancel_pressed();

    match world.state() {
        GameState::Loading => {}
        GameState::Intro => {
            if confirm {
                step::transition(world, GameState::ModeSelect);
            } else if kb.any_pressed(&[KeyCode::Char('e'), KeyCode::Char('E')]) {
                step::transition(world, GameState::Editor);
            } else if esc || kb.any_pressed(&[KeyCode::Char('q'), KeyCode::Char('Q')]) {
                return true;
            }
        }
        GameState::ModeSelect => {
            if let Some((_, dy)) = kb.pressed_direction().or_else(|| gp.pressed_direction()) {
                let n = ModeKind::ALL.len() as i32;
                world.mode_cursor = (world.mode_cursor as i32 + dy).rem_euclid(n) as usize;
            }
            if confirm {
                let kind = ModeKind::ALL[world.mode_cursor];
                step::select_mode(world, kind);
                step::transition(world, GameState::LevelSelect);
            } else if esc {
                step::transition(world, GameState::Intro);
            }
        }
        GameState::LevelSelect => {
            if let Some((_, dy)) = kb.pressed_direction().or_else(|| gp.pressed_direction()) {
                move_select_cursor(world, dy);
            }
            // No edge leads back from here; Enter is the only way on.
            if confirm && world.level_count() > 0 {
                let index = world.select_cursor;
                step::start_level(world, index);
            }
        }
        GameState::Play => handle_play(world, kb, gp),
        GameState::Win => {
            if confirm || kb.any_pressed(&[KeyCode::Char('n'), KeyCode::Char('N')]) {
                if !step::next_level(world) {
                    world.set_message("That was the last level!", MESSAGE_FRAMES);
                    step::transition(world, GameState::ModeSelect);
                }
            } else if kb.any_pressed(KEYS_RESTART) || gp.restart_pressed() {
                step::restart_level(world);
            } else if esc || kb.any_pressed(&[KeyCode::Char('m'), KeyCode::Char('M')]) {
                step::transition(world, GameState::ModeSelect);
            }
        }
        GameState::Paused => {
            if confirm || kb.any_pressed(&[KeyCode::Char('p'), KeyCode::Char('P'), KeyCode::F(1)]) {
                step::resume(world);
            } else if kb.any_pressed(KEYS_RESTART) || gp.restart_pressed() {
                step::restart_level(world);
            } else if kb.any_pressed(&[KeyCode::Char('l'), KeyCode::Char('L')]) {
                world.select_cursor = world.current_level;
                step::transition(world, GameState::LevelSelect);
            } else if esc {
                step::transition(world, GameState::Intro);
            }
        }
        GameState::Editor => {
            if esc || confirm {
                step::transition(world, GameState::Intro);
            }
        }
    }
    false
}

fn handle_play(world: &mut WorldState, kb: &InputState, gp: &GamepadState) {
    if kb.any_pressed(KEYS_PAUSE) || gp.cancel_pressed() {
        step::pause(world);
        return;
    }
    if kb.any_pressed(KEYS_UNDO) || gp.undo_pressed() {
        step::undo(world);
        return;
    }
    if kb.any_pressed(KEYS_REDO) || gp.redo_pressed() {
        step::redo(world);
        return;
    }
    if kb.any_pressed(KEYS_RESTART) || gp.restart_pressed() {
        step::restart_level(world);
        world.set_message("Restarted", MESSAGE_FRAMES / 2);
        return;
    }
    if kb.any_pressed(KEYS_SPEED) {
        let tier = world.tier.next();
        step::set_movement_speed(world, tier);
        world.set_message(&format!("Speed: {}", tier.label()), MESSAGE_FRAMES / 2);
        return;
    }
    // Held keys repeat; the core swallows input while a step animates.
    match kb.held_direction().or_else(|| gp.held_direction()) {
        Some((dx, dy)) => {
            step::move_player(world, dx, dy);
        }
        None => step::release_direction(world),
    }
}

/// Move the level-select cursor, keeping it inside the visible window.
fn move_select_cursor(world: &mut WorldState, dy: i32) {
    let total = world.level_count();
    if total == 0 {
        return;
    }
    world.select_cursor = (world.select_cursor as i32 + dy).rem_euclid(total as i32) as usize;
    if world.select_cursor < world.select_scroll {
        world.select_scroll = world.select_cursor;
    } else if world.select_cursor >= world.select_scroll + SELECT_VISIBLE {
        world.select_scroll = world.select_cursor + 1 - SELECT_VISIBLE;
    }
}
