pub mod taskcat;
pub mod tempban_expiry;
