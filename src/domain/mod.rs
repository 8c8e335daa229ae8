pub mod entity;
pub mod grid;
pub mod mode;
pub mod rules;
pub mod tile;
