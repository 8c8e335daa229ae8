pub mod event;
pub mod level;
pub mod progress;
pub mod state;
pub mod step;
pub mod tween;
pub mod undo;
pub mod world;
