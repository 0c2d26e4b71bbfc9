pub mod context;
pub mod error;
pub mod symbol;
pub mod value;

pub use context::{Evaluator, DEFAULT_MAX_COMPILE_DEPTH};
pub use error::{ArityKind, BunnyError, Result};
pub use symbol::{Symbol, SymbolTable};
pub use value::{Closure, Environment, Intrinsic, IntrinsicFn, List, Value};
