//! Orbit API - embedding layer
//!
//! Wraps the engine in a host-friendly interface:
//! - [`Context`]: one engine instance with its entry point, error slot and host bindings
//! - [`Value`]: typed view of engine values, with conversions to and from host types
//! - [`Closure`] / [`Class`] / [`Instance`]: handles to script objects
//! - [`Error`]: unified error type with a serializable [`ErrorReport`]
//!
//! # Usage
//! ```rust
//! use orbit_api::{Context, Value};
//!
//! let ctx = Context::new();
//! ctx.set_func("twice", |_, args| Ok(Value::Int(args[0].get_int()? * 2)));
//! ctx.compile("var answer = twice(21)", None).unwrap();
//! ctx.run_main().unwrap();
//! assert_eq!(ctx.get_var_as::<i64>("answer").unwrap(), 42);
//! ```

mod bridge;
pub mod class;
pub mod closure;
pub mod config;
pub mod context;
pub mod error;
pub mod instance;
pub mod loader;
pub mod value;

pub use class::Class;
pub use closure::Closure;
pub use config::RunConfig;
pub use context::Context;
pub use error::{Error, ErrorReport, LookupError};
pub use instance::Instance;
pub use loader::{SourceLoader, ROOT_FILE_ID};
pub use value::{FromValue, Handle, IntoValue, Value, ValueKind};

// Re-export config types from orbit_config
pub use orbit_config;
pub use orbit_config::{CompilerConfig, LimitConfig, LogConfig, LogLevel, Phase, ProjectConfig};
pub use orbit_vfs::{MemoryFileSystem, NativeFileSystem, VirtualFileSystem};
