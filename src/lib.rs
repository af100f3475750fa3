//! Flatten nested values into a single dotted-path -> text map.
//!
//! Nested structure (records, sequences, optionals) is linearized into
//! addressable leaf entries, ready for flat key/value sinks such as log
//! fields, metric tags or form-encoded parameters:
//!
//! ```
//! use flatten_core::Value;
//!
//! let v = Value::record([
//!     ("name", Value::from("job")),
//!     ("retries", Value::seq([4i64, 5, 6])),
//! ]);
//! let flat = v.flatten();
//! assert_eq!(flat["name"], "job");
//! assert_eq!(flat["retries.0"], "4");
//! ```
//!
//! Any type implementing `serde::Serialize` flattens directly through
//! [`flatten`] without building a [`Value`] by hand:
//!
//! ```
//! #[derive(serde::Serialize)]
//! struct Job {
//!     name: String,
//!     attempt: u32,
//! }
//!
//! let flat = flatten_core::flatten(&Job { name: "sync".into(), attempt: 0 }).unwrap();
//! assert_eq!(flat["name"], "sync");
//! assert_eq!(flat["attempt"], "0");
//! ```
//!
//! Empty values (absent optionals, empty strings, empty sequences, the zero
//! time-instant) are omitted from the output entirely; numeric zero and
//! `false` are kept. Unsupported shapes are skipped silently, never an
//! error. Inputs must be tree-shaped: there is no cycle detection, and a
//! `Serialize` impl that recurses through shared ownership will not
//! terminate.

pub mod core;
pub mod ser;

pub use crate::core::value::{Kind, Value};
pub use crate::ser::{EncodeError, flatten, to_value};
