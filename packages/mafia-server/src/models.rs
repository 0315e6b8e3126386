pub mod config;
pub mod game;
pub mod notification;
pub mod player;
pub mod role;
pub mod vote;
