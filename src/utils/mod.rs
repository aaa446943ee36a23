//! The `utils` module collects the pieces shared by every other module of
//! `popbridge`: the error taxonomy and the logging setup.

pub mod error;
pub mod logging;

#[cfg(test)]
mod tests;
