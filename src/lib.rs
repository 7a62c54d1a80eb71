//! # sovran-pathmap
//!
//! A hierarchical, path-addressed heterogeneous map with strided array views.
//!
//! `sovran-pathmap` lets independently written components exchange typed
//! values through one container. Values live under `/`-separated paths,
//! submaps give a component its own corner of the hierarchy without copying
//! anything, and array data travels as strided views or data blocks so large
//! buffers never have to be duplicated.
//!
//! ## Key Features
//!
//! - **Type-safe**: Values are checked at runtime against the requested type
//! - **Hierarchical**: Keys are normalised paths; `..` can never climb above a submap
//! - **Shared subtrees**: Submaps are handles on the same store, copies are independent
//! - **Zero-copy arrays**: [`ArrayView`] describes shape and strides over a shared [`Buffer`]
//! - **Explicit ownership**: [`DataBlock`] either owns its elements or borrows a buffer
//!
//! The set of storable types is closed: `bool`, `i64`, `f64`, `String`,
//! [`Complex64`], and `ArrayView<E>` / `DataBlock<E>` of each of those. Smaller
//! signed integers and `f32` widen automatically; unsigned integers are
//! rejected at compile time.
//!
//! ## Usage Examples
//!
//! ### Basic Usage
//!
//! ```rust
//! use sovran_pathmap::{MapError, PathMap};
//!
//! fn main() -> Result<(), MapError> {
//!     let map = PathMap::new();
//!
//!     // Store values of different types
//!     map.update("solver/tolerance", 1e-8)?;
//!     map.update("solver/max_iterations", 500)?;
//!     map.update("solver/name", "gmres")?;
//!     map.update("verbose", true)?;
//!
//!     // Retrieve them by type; paths are normalised on every access
//!     assert_eq!(map.get::<f64>("solver/tolerance")?, 1e-8);
//!     assert_eq!(map.get::<i64>("/solver//./max_iterations")?, 500);
//!
//!     // Handle errors properly
//!     match map.get::<bool>("missing") {
//!         Ok(value) => println!("Value: {}", value),
//!         Err(MapError::KeyNotFound(key)) => println!("Key ({}) doesn't exist", key),
//!         Err(e) => println!("Other error: {}", e),
//!     }
//!     match map.get::<i64>("solver/name") {
//!         Err(MapError::TypeMismatch { requested, actual }) => {
//!             println!("Asked for {}, found {}", requested, actual)
//!         }
//!         other => println!("Unexpected: {:?}", other),
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! ### Submaps and Copies
//!
//! ```rust
//! use sovran_pathmap::{MapError, PathMap};
//!
//! fn main() -> Result<(), MapError> {
//!     let map = PathMap::new();
//!     map.update("a", 1)?;
//!
//!     // A submap shares the store
//!     let tree = map.submap("tree");
//!     tree.update("x", 5)?;
//!     assert_eq!(map.get::<i64>("tree/x")?, 5);
//!
//!     // A clone of the root is independent
//!     let copy = map.clone();
//!     copy.update("a", 42)?;
//!     assert_eq!(map.get::<i64>("a")?, 1);
//!
//!     // A clone of a submap is an independent root holding the subtree
//!     let flat = tree.clone();
//!     flat.update("x", 99)?;
//!     assert_eq!(map.get::<i64>("tree/x")?, 5);
//!     assert_eq!(flat.get::<i64>("/x")?, 99);
//!
//!     Ok(())
//! }
//! ```
//!
//! ### Iterating a Subtree
//!
//! ```rust
//! use sovran_pathmap::{MapError, PathMap};
//!
//! fn main() -> Result<(), MapError> {
//!     let map = PathMap::from_entries([("tree/i", 1), ("tree/value", 2), ("other", 3)])?;
//!
//!     for entry in map.iter_at("tree") {
//!         println!("{} = {} ({})", entry.key(), entry.value::<i64>()?, entry.type_name()?);
//!     }
//!
//!     let removed = map.erase_recursive("tree")?;
//!     assert_eq!(removed, 2);
//!     assert_eq!(map.keys()?, vec!["/other"]);
//!
//!     Ok(())
//! }
//! ```
//!
//! ### Array Data
//!
//! ```rust
//! use sovran_pathmap::{strides_c, ArrayView, Buffer, DataBlock, MapError, Memory, PathMap, Selector};
//!
//! fn main() -> Result<(), MapError> {
//!     let map = PathMap::new();
//!
//!     // A 2x3 row-major view over memory owned by the caller
//!     let buffer = Buffer::new((0..6).map(|i| i as f64).collect());
//!     let view = ArrayView::new(&buffer, vec![2, 3], strides_c(&[2, 3]))?;
//!     map.update("field", view)?;
//!
//!     // Writes through the stored view reach the caller's buffer
//!     map.with("field", |v: &ArrayView<f64>| v.set(&[1, 2], -1.0))??;
//!     assert_eq!(buffer.get(5)?, -1.0);
//!
//!     // Select the second column
//!     let column = map.with("field", |v: &ArrayView<f64>| {
//!         v.slice(&[Selector::all(), Selector::Index(1)])
//!     })??;
//!     assert_eq!(column.to_vec()?, vec![1.0, 4.0]);
//!
//!     // An owned block keeps its own copy
//!     let block = DataBlock::from_buffer(&buffer, vec![6], Memory::Owned)?;
//!     buffer.set(0, 100.0)?;
//!     assert_eq!(block.get(0)?, 0.0);
//!     map.update("snapshot", block)?;
//!
//!     Ok(())
//! }
//! ```

mod array;
mod error;
mod iter;
mod map;
mod path;
mod store;
mod value;

pub use array::{
    strides_c, strides_fortran, ArrayView, Buffer, DataBlock, Memory, Owner, OwnerKind, Selector,
    Slice,
};
pub use error::{MapError, Result};
pub use iter::{Entry, Iter};
pub use map::PathMap;
pub use path::{normalize, Location, SEPARATOR};
pub use value::{Element, Supported, Value, ValueCell};

// Re-export the complex type used for complex values
pub use num_complex::Complex64;
