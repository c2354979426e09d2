//! Infrastructure layer - remote sheet client, loaders, import and export

pub mod excel_export;
pub mod partition_loader;
pub mod paste_import;
pub mod sheet_client;

pub use sheet_client::SheetClient;
