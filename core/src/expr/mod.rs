//! Flow expression language: AST and parser.
//!
//! ```text
//! A -> B -> C            sequence
//! A -> B ? C : D         B routes to C or D
//! A -> (B, C) -> D       B and C run in parallel, D joins
//! sub = B -> C; A -> sub alias, expanded inline
//! ```

pub mod ast;
pub mod parser;

pub use ast::Node;
pub use parser::parse;
