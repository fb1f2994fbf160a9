pub mod cameras;
pub mod control;
pub mod library;
pub mod player;
pub mod preview;
pub mod record;
