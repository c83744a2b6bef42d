pub mod cascade;
pub mod hierarchy;
pub mod range;

pub use cascade::{apply_cascade, cascade_required};
pub use hierarchy::{
    ResolveOptions, Selection, Selectors, TestSelection, UnresolvedReference, resolve_hierarchy,
};
pub use range::Selector;
