// flowc — workflow graph compiler
//
// Library root. The Graph IR (`graph`) sits in the middle; every textual
// codec parses into it and serializes out of it.

pub mod ast;
pub mod diag;
pub mod dot;
pub mod error;
pub mod export;
pub mod graph;
pub mod id;
pub mod ident;
pub mod lexer;
pub mod literal;
pub mod markdown;
pub mod naming;
pub mod natural;
pub mod parser;
pub mod pipeline;
pub mod registry;
pub mod sequential;
pub mod staged;
pub mod topo;
pub mod verify;
