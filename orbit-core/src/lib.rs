//! Orbit Core - the embedded scripting engine (pure logic, no IO)
//!
//! Contains lexer, parser, compiler, and virtual machine.
//! Source files are obtained through [`Delegate::load_file`], so this crate
//! never touches the file system; errors are reported through
//! [`Delegate::report_error`].
//!
//! Configuration is passed explicitly via parameters, not via global state.

pub mod compiler;
pub mod kit;
pub mod runtime;

// Re-export common types
pub use runtime::bytecode::chunk::Chunk;
pub use runtime::delegate::{Delegate, EngineError, EngineErrorKind, LoadedFile, NullDelegate, SourcePosition};
pub use runtime::heap::{Heap, ObjRef};
pub use runtime::object::{ClassObj, ClosureObj, FunctionKind, FunctionObj, InstanceObj, Object, ObjectKind};
pub use runtime::session::{Compiler, Program};
pub use runtime::value::Value;
pub use runtime::vm::{RuntimeError, Vm};

// Re-export config types from orbit-config
pub use orbit_config::{CompilerConfig, LimitConfig, Phase};
