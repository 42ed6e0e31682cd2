pub mod document;
pub mod import;
pub mod template;
pub mod user;
