pub mod ban;
pub mod cache;
pub mod cmds;
pub mod core;
pub mod engine;
pub mod events;
pub mod report;

pub fn commands() -> Vec<poise::Command<crate::Data, crate::Error>> {
    vec![cmds::freeloader()]
}
