pub mod app;
pub mod cli;
pub mod config;
pub mod gateway;
pub mod note;
pub mod ui;

pub use config::{AppConfig, ConfigLoader, ConfigPaths};
pub use gateway::{GatewayError, HttpGateway, NoteGateway};
pub use note::{ModalMode, Note};
