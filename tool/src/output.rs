//! Status output.

pub mod amend;
