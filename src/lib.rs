#![allow(clippy::collapsible_if)]

pub mod config;
pub mod diagnostics;
pub mod error;
pub mod imports;
pub mod language;
pub mod project;
pub mod unmarshalmap;

#[cfg(test)]
mod tests;
