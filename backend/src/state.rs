//! Shared application state handed to every handler through `web::Data`.

use crate::pipeline::pdf::PdfEngine;
use crate::store::repo::Repository;
use crate::store::Store;
use common::model::document::Document;
use common::model::template::Template;
use common::model::user::User;
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub pdf: Arc<dyn PdfEngine>,
    pub pdf_timeout: Duration,
    /// Largest accepted template upload, in bytes.
    pub upload_limit: usize,
}

impl AppState {
    pub fn templates(&self) -> Repository<Template> {
        Repository::new(Arc::clone(&self.store))
    }

    pub fn documents(&self) -> Repository<Document> {
        Repository::new(Arc::clone(&self.store))
    }

    pub fn users(&self) -> Repository<User> {
        Repository::new(Arc::clone(&self.store))
    }
}
