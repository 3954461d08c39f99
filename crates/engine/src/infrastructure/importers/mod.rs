//! Rule-data importers.
//!
//! This module provides importers for loading race, class, background and feat
//! definitions from external sources like 5etools.

mod fivetools;
mod fivetools_types;

pub use crate::infrastructure::ports::ImportError;
pub use fivetools::{clean_formatting, FiveToolsImporter};
pub use fivetools_types::{
    FiveToolsBackgroundFile, FiveToolsClassFile, FiveToolsFeatFile, FiveToolsIndex,
    FiveToolsRaceFile,
};
