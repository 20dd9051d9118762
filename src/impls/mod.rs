pub mod discord;
pub mod utils;
