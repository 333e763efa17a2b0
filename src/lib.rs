//! Core runtime for the Asteria scripting language: the lexer, the
//! recursive-descent parser, AIR lowering, the AVMC instruction queue and
//! its execution engine, and the generational cycle collector that owns
//! every Variable.

pub mod air;
pub mod ast;
pub mod avmc;
pub mod context;
pub mod diagnostics;
pub mod gc;
pub mod lexer;
pub mod parser;
pub mod reference;
pub mod repl;
pub mod runtime;
pub mod stdlib;
pub mod value;
pub mod variable;

pub use diagnostics::{AsteriaError, Exception, FrameKind, ParseErrorCode, ParserError};
pub use gc::GcGeneration;
pub use lexer::ParserOptions;
pub use reference::{Modifier, Reference};
pub use repl::Repl;
pub use runtime::{Interpreter, Program};
pub use value::Value;
