//! Domain models for the order service.

pub mod local_order;
pub mod session;

pub use local_order::{
    LocalOrder, MetadataEntry, NewLocalOrder, OrderLine, OrderMetadata, UpsellRecord,
};
pub use session::ShopSession;
