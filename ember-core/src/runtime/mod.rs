//! Reference engine: values, statement trees, the interpreter and its binder

pub mod ast;
pub mod binder;
pub mod error;
pub mod function;
pub mod interp;
pub mod value;

pub use ast::{Expr, Stmt};
pub use binder::DefaultBinder;
pub use error::RuntimeError;
pub use function::{Function, FunctionBuilder};
pub use interp::{Generator, GeneratorState, Interpreter};
pub use value::{Native, NativeFn, Object, Value, ValueKind};
