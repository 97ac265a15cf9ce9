//! Stimulus data model: labels, sides, position maps, and the trial pool.
//!
//! Every trial presents one [`StimulusItem`] (a nonword token backed by an
//! opaque display asset) and a two-option prompt whose layout is a
//! [`PositionMap`]. The pool is fixed for the whole session and items are
//! immutable once loaded.

use std::path::PathBuf;
use std::str::FromStr;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::corpus::PoolError;

// ---------------------------------------------------------------------------
// Labels and sides
// ---------------------------------------------------------------------------

/// Condition label attached to a stimulus item.
///
/// Exactly two mutually exclusive labels exist; a response is correct when
/// the participant picks the side currently holding the item's label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Label {
    /// The "self" condition (the participant themselves).
    #[serde(rename = "self")]
    Self_,
    /// The "other" condition (another person).
    #[serde(rename = "other")]
    Other,
}

impl Label {
    /// The one other label.
    pub fn opposite(self) -> Self {
        match self {
            Self::Self_ => Self::Other,
            Self::Other => Self::Self_,
        }
    }
}

impl std::fmt::Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Self_ => write!(f, "self"),
            Self::Other => write!(f, "other"),
        }
    }
}

impl FromStr for Label {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "self" => Ok(Self::Self_),
            "other" => Ok(Self::Other),
            other => Err(format!("unknown label `{other}`")),
        }
    }
}

/// Physical response side in the two-option layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub fn opposite(self) -> Self {
        match self {
            Self::Left => Self::Right,
            Self::Right => Self::Left,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Left => write!(f, "left"),
            Self::Right => write!(f, "right"),
        }
    }
}

impl FromStr for Side {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "left" => Ok(Self::Left),
            "right" => Ok(Self::Right),
            other => Err(format!("unknown side `{other}`")),
        }
    }
}

// ---------------------------------------------------------------------------
// Position map
// ---------------------------------------------------------------------------

/// Assignment of the two labels to the two sides for one trial.
///
/// A bijection by construction: storing only the left label makes it
/// impossible for a label to appear on both sides or for a side to be
/// unlabeled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionMap {
    left: Label,
}

impl PositionMap {
    /// Fixed layout with `left` on the left and its opposite on the right.
    pub fn new(left: Label) -> Self {
        Self { left }
    }

    /// Draw a fresh layout with one fair boolean.
    ///
    /// Draws are independent per trial; nothing balances left/right counts
    /// across a session. That matches the observed protocol and keeps the
    /// layout unpredictable to the participant.
    pub fn draw<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let left = if rng.random_bool(0.5) {
            Label::Self_
        } else {
            Label::Other
        };
        Self { left }
    }

    /// Which side holds `label`.
    pub fn side_of(&self, label: Label) -> Side {
        if label == self.left {
            Side::Left
        } else {
            Side::Right
        }
    }

    /// Which label the given side holds.
    pub fn label_on(&self, side: Side) -> Label {
        match side {
            Side::Left => self.left,
            Side::Right => self.left.opposite(),
        }
    }
}

// ---------------------------------------------------------------------------
// Stimulus items
// ---------------------------------------------------------------------------

/// Counterbalancing group derived from a nonword's third letter.
///
/// The stimulus generator renders the middle letter either upright (`U`) or
/// vertically flipped (`N`); pools are balanced across both groups so the
/// mid-letter shape never predicts the condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MidLetter {
    U,
    N,
}

impl MidLetter {
    /// Classify a nonword token by its third letter. Returns `None` for
    /// tokens shorter than three letters or with any other mid letter.
    pub fn of(nonword: &str) -> Option<Self> {
        match nonword.chars().nth(2).map(|c| c.to_ascii_uppercase()) {
            Some('U') => Some(Self::U),
            Some('N') => Some(Self::N),
            _ => None,
        }
    }
}

impl std::fmt::Display for MidLetter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::U => write!(f, "U"),
            Self::N => write!(f, "N"),
        }
    }
}

/// One stimulus-label association to be mastered. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StimulusItem {
    /// Nonword token, unique within the pool (e.g. `"REUJZ"`).
    pub id: String,
    /// Ground-truth condition label.
    pub label: Label,
    /// Opaque reference to the display asset. The scheduler never opens it;
    /// the presentation layer decides what to do with it.
    pub asset: PathBuf,
}

impl StimulusItem {
    pub fn new(id: impl Into<String>, label: Label, asset: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            label,
            asset: asset.into(),
        }
    }

    /// Counterbalancing group of this item's nonword, if classifiable.
    pub fn mid_letter(&self) -> Option<MidLetter> {
        MidLetter::of(&self.id)
    }
}

// ---------------------------------------------------------------------------
// Trial pool
// ---------------------------------------------------------------------------

/// The fixed set of stimulus-label pairs for one session.
#[derive(Debug, Clone)]
pub struct TrialPool {
    items: Vec<StimulusItem>,
}

impl TrialPool {
    /// Build a pool from explicit items. Fails on an empty set or duplicate
    /// ids — both would break the mastery tracker's bookkeeping.
    pub fn new(items: Vec<StimulusItem>) -> Result<Self, PoolError> {
        if items.is_empty() {
            return Err(PoolError::Empty);
        }
        for (i, item) in items.iter().enumerate() {
            if items[..i].iter().any(|other| other.id == item.id) {
                return Err(PoolError::DuplicateId(item.id.clone()));
            }
        }
        Ok(Self { items })
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[StimulusItem] {
        &self.items
    }

    pub fn get(&self, id: &str) -> Option<&StimulusItem> {
        self.items.iter().find(|item| item.id == id)
    }

    /// Item ids in pool order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(|item| item.id.as_str())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
