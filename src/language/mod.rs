pub mod ast;
pub mod errors;
pub mod lexer;
pub mod parser;
pub mod span;
pub mod tag;
pub mod token;
pub mod typecheck;
pub mod types;
