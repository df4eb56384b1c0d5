//! Group photo-voting: an HTTP service where group members upload one image
//! per round and vote for each other's, plus the client-side handler that
//! turns a click on the image grid into a vote request and a set of UI
//! patches.

pub mod client;
pub mod config;
pub mod domain;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod repositories;
pub mod rounds;
pub mod routes;
pub mod startup;
pub mod storage;
pub mod view;

use crate::config::Config;
use crate::domain::{DirectoryRepository, FileStorage, GalleryRepository};
use std::sync::Arc;

/// Shared resources for the web server.
#[derive(Clone)]
pub struct AppState {
    pub directory: Arc<dyn DirectoryRepository>,
    pub gallery: Arc<dyn GalleryRepository>,
    pub files: Arc<dyn FileStorage>,
    pub config: Config,
}
