// Request/response models for the music API

pub mod request;
pub mod song;
pub mod user;
