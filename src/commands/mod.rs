pub mod admin;
pub mod export;
pub mod photo;
pub mod settings;
