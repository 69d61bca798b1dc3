//! Closed color palette shared by links, buttons and colored spans.
//!
//! A [`Color`] is an index into a fixed palette. On the live tree it is carried
//! as a single `cN` class token; on the wire it is a plain integer.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::live::ClassSet;

/// Number of palette entries. Valid indices are `0..PALETTE_SIZE`.
pub const PALETTE_SIZE: u8 = 11;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u64", into = "u8")]
pub struct Color(u8);

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("color index {0} is outside the palette (0..{PALETTE_SIZE})")]
pub struct InvalidColor(pub u64);

impl Color {
    pub fn new(index: u8) -> Option<Self> {
        (index < PALETTE_SIZE).then_some(Self(index))
    }

    pub fn index(self) -> u8 {
        self.0
    }

    pub fn all() -> impl Iterator<Item = Color> {
        (0..PALETTE_SIZE).map(Color)
    }

    /// The marker token carried by live nodes, e.g. `c3`.
    pub fn class_token(self) -> String {
        format!("c{}", self.0)
    }

    /// Reads the palette index from a class set.
    ///
    /// Tokens are checked in palette order and the first hit wins. `None` means
    /// no color is assigned, which is distinct from index 0.
    pub fn from_classes(classes: &ClassSet) -> Option<Self> {
        Color::all().find(|color| classes.contains(&color.class_token()))
    }

    /// Writes this color's marker token into a class set.
    pub fn apply_to(self, classes: &mut ClassSet) {
        classes.insert(self.class_token());
    }
}

impl TryFrom<u64> for Color {
    type Error = InvalidColor;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        u8::try_from(value)
            .ok()
            .and_then(Color::new)
            .ok_or(InvalidColor(value))
    }
}

impl From<Color> for u8 {
    fn from(color: Color) -> Self {
        color.0
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "c{}", self.0)
    }
}
