#![forbid(unsafe_code)]

pub mod seventv;
pub mod twitch;
