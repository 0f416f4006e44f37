//! Tests for template engine

use super::*;
use crate::template::error::Phase;
use helpers::*;

mod errors;
mod helpers;
mod parser;
