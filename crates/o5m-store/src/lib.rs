#![warn(clippy::pedantic)]

pub mod buffer;
pub mod builder;
pub mod entity;
pub mod error;
pub mod header;
pub mod item;
pub mod kinds;
pub mod location;

pub use buffer::{GrowthPolicy, PackedItemBuffer};
pub use builder::{NodeBuilder, ObjectMeta, RelationBuilder, WayBuilder};
pub use entity::{ItemRef, Member, MemberType, NodeRef, RelationRef, Tag, WayRef};
pub use error::StoreError;
pub use header::{BoundingBox, FileHeader};
pub use item::ItemKind;
pub use kinds::EntityKinds;
pub use location::Location;
