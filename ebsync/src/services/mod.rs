//! Sync components: Elba and Bitrix24 clients, field mapping, reconciliation

pub mod bitrix_client;
pub mod elba_client;
pub mod field_mapper;
pub mod reconciler;

pub use bitrix_client::BitrixClient;
pub use elba_client::ElbaClient;
pub use field_mapper::FieldMapper;
pub use reconciler::{Reconciler, SyncSummary};
