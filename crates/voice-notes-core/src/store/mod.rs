mod layout;
mod record;
mod record_store;

pub use {layout::StoreLayout, record::Record, record_store::RecordStore};

pub(crate) use record_store::LIST_FILE_NAME;
#[cfg(test)]
pub(crate) use record_store::move_file;
