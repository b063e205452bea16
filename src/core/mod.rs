pub mod ajax;
pub mod error;
pub mod feed;
pub mod keyring;
pub mod models;
pub mod render;
pub mod repository;
pub mod store;
pub mod view;
