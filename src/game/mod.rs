pub mod active;
pub mod autoplay;
pub mod difficulty;
pub mod element;
pub mod judge;
pub mod judgment;
pub mod life;
pub mod mods;
pub mod parsing;
pub mod scheduler;
pub mod score;
pub mod session;
pub mod timeline;
pub mod timing_windows;
