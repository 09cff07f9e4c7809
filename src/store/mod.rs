//! Food record storage layer.
//!
//! The [`store::FoodStore`] trait defines the interface the HTTP layer
//! consumes; [`memory::MemoryFoodStore`] is the in-process implementation.

pub mod memory;
pub mod store;
