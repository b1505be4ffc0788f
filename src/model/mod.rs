//! # Property Graph Model
//!
//! Plain DTOs for the architecture graph: entities, relationships, their
//! property bags, and the locators that resolve them. These types cross
//! every boundary: storage ↔ engine ↔ caller.
//!
//! This module is pure data: no I/O, no state, no async.

pub mod value;
pub mod property_map;
pub mod labels;
pub mod entity;
pub mod relationship;
pub mod locator;
pub mod bookkeeping;

pub use value::Value;
pub use property_map::{PropertyMap, merge_into, props};
pub use labels::LabelSet;
pub use entity::{Entity, EntityId};
pub use relationship::{Relationship, RelId, Direction};
pub use locator::EntityLocator;
pub use bookkeeping::Bookkeeping;
