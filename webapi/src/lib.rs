pub mod framework;
pub mod settings;
pub mod zethus;
