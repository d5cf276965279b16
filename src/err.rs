//! Error interface for this crate.
//!
//! Every error in this crate implements [`Error`], which extends
//! [`std::error::Error`] with an optional hint for the operator.
//!
//! The individual error types live next to the code that raises them,
//! and are re-exported here for convenience.
use std::borrow::Cow;

pub use crate::ast::sim::IllegalInstr;
pub use crate::sim::SimErr;
pub use crate::dbg::DbgErr;
pub use crate::dbg::cmd::CmdErr;
pub use crate::dbg::lex::LexErr;

/// Unified error interface for all errors in this crate.
pub trait Error: std::error::Error {
    /// A suggestion that can help the user fix the problem, if one exists.
    fn help(&self) -> Option<Cow<str>> {
        None
    }
}
