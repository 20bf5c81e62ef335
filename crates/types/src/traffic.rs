//! Traffic classes (T-CONTs) and per-class containers.

use serde::{Deserialize, Serialize};
use std::ops::{Index, IndexMut};
use strum::{Display, EnumString, IntoStaticStr};

/// Number of traffic classes.
pub const NUM_CLASSES: usize = 5;

/// Rank assigned to a unit that carries no traffic at all.
pub const EMPTY_RANK: u32 = 999;

/// One of the five fixed upstream traffic classes.
///
/// Declaration order is priority order: `Highest < High < ... < Lowest`, so
/// sorting ascending puts the most urgent class first.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TrafficClass {
    Highest,
    High,
    Medium,
    Low,
    Lowest,
}

impl TrafficClass {
    /// All classes in priority order.
    pub const ALL: [TrafficClass; NUM_CLASSES] = [
        TrafficClass::Highest,
        TrafficClass::High,
        TrafficClass::Medium,
        TrafficClass::Low,
        TrafficClass::Lowest,
    ];

    /// Priority rank, 1 (highest) through 5 (lowest).
    pub fn rank(self) -> u32 {
        self.index() as u32 + 1
    }

    /// Position of this class in [`TrafficClass::ALL`].
    pub fn index(self) -> usize {
        match self {
            TrafficClass::Highest => 0,
            TrafficClass::High => 1,
            TrafficClass::Medium => 2,
            TrafficClass::Low => 3,
            TrafficClass::Lowest => 4,
        }
    }

    /// Short name used in logs and reports.
    pub fn as_str(self) -> &'static str {
        self.into()
    }
}

/// A fixed-size map with one slot per traffic class.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct ClassMap<T>([T; NUM_CLASSES]);

impl<T> ClassMap<T> {
    /// Build from values given in priority order.
    pub fn new(highest: T, high: T, medium: T, low: T, lowest: T) -> Self {
        Self([highest, high, medium, low, lowest])
    }

    /// Build by evaluating `f` for every class in priority order.
    pub fn from_fn(mut f: impl FnMut(TrafficClass) -> T) -> Self {
        Self(TrafficClass::ALL.map(&mut f))
    }

    /// Iterate `(class, value)` pairs in priority order.
    pub fn iter(&self) -> impl Iterator<Item = (TrafficClass, &T)> {
        TrafficClass::ALL.into_iter().zip(self.0.iter())
    }

    /// Iterate mutable `(class, value)` pairs in priority order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (TrafficClass, &mut T)> {
        TrafficClass::ALL.into_iter().zip(self.0.iter_mut())
    }

    /// Iterate values in priority order.
    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.0.iter()
    }

    /// Map every value, keeping the class layout.
    pub fn map<U>(&self, mut f: impl FnMut(TrafficClass, &T) -> U) -> ClassMap<U> {
        ClassMap::from_fn(|class| f(class, &self.0[class.index()]))
    }
}

impl<T: Clone> ClassMap<T> {
    /// A map holding the same value for every class.
    pub fn splat(value: T) -> Self {
        Self::from_fn(|_| value.clone())
    }
}

impl ClassMap<u64> {
    /// Sum over all classes.
    pub fn total(&self) -> u64 {
        self.0.iter().sum()
    }

    /// True when every class holds zero.
    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|v| *v == 0)
    }
}

impl ClassMap<f64> {
    /// Sum over all classes.
    pub fn total(&self) -> f64 {
        self.0.iter().sum()
    }
}

impl<T> Index<TrafficClass> for ClassMap<T> {
    type Output = T;

    fn index(&self, class: TrafficClass) -> &T {
        &self.0[class.index()]
    }
}

impl<T> IndexMut<TrafficClass> for ClassMap<T> {
    fn index_mut(&mut self, class: TrafficClass) -> &mut T {
        &mut self.0[class.index()]
    }
}
