pub mod order_key;
pub mod sectioned_store;

pub use order_key::{Derivation, OrderKey, SectionKey, SortKey};
pub use sectioned_store::{
    insertion_index, insertion_index_by_key, Entry, Placement, Removal, Section,
    SectionSnapshot, SectionedStore,
};
