pub mod document;

pub use document::{default_document_paths, locate_document, ModuleDocument, ModuleSelection};
