//! Build item types.
//!
//! A build item is an immutable artifact that flows between build steps.
//! Every item type is exactly one of two kinds:
//!
//! - *simple*: at most one producer in a chain, consumers see the single value
//! - *multi*: any number of producers, consumers see every contributed value
//!
//! The kind is part of the type (`BuildItem::Kind`), so the chain builder can
//! reason about cardinality without looking at values.

use std::any::{Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

mod sealed {
    pub trait Sealed {}
}

/// Marker kind for items produced at most once.
#[derive(Debug)]
pub enum Simple {}

/// Marker kind for items contributed to by any number of steps.
#[derive(Debug)]
pub enum Multi {}

impl sealed::Sealed for Simple {}
impl sealed::Sealed for Multi {}

/// The kind of a build item. Only [`Simple`] and [`Multi`] implement this.
pub trait ItemKind: sealed::Sealed + 'static {
    const CARDINALITY: Cardinality;
}

impl ItemKind for Simple {
    const CARDINALITY: Cardinality = Cardinality::Simple;
}

impl ItemKind for Multi {
    const CARDINALITY: Cardinality = Cardinality::Multi;
}

/// Runtime view of an item kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cardinality {
    Simple,
    Multi,
}

impl fmt::Display for Cardinality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cardinality::Simple => write!(f, "simple"),
            Cardinality::Multi => write!(f, "multi"),
        }
    }
}

/// An artifact flowing through a build chain.
///
/// ```
/// use buildchain::{BuildItem, Simple};
///
/// struct FeatureItem {
///     name: String,
/// }
///
/// impl BuildItem for FeatureItem {
///     type Kind = Simple;
/// }
/// ```
pub trait BuildItem: Any + Send + Sync + 'static {
    type Kind: ItemKind;
}

/// A build item with at most one producer.
pub trait SimpleBuildItem: BuildItem<Kind = Simple> {}

impl<T: BuildItem<Kind = Simple>> SimpleBuildItem for T {}

/// A build item collected from every producer.
pub trait MultiBuildItem: BuildItem<Kind = Multi> {}

impl<T: BuildItem<Kind = Multi>> MultiBuildItem for T {}

/// Identity of an item type.
///
/// Two ids are equal when they name the same Rust type; the name and
/// cardinality are carried along for diagnostics and bookkeeping.
#[derive(Clone, Copy)]
pub struct ItemId {
    type_id: TypeId,
    name: &'static str,
    cardinality: Cardinality,
}

impl ItemId {
    /// The id of item type `T`.
    pub fn of<T: BuildItem>() -> Self {
        ItemId {
            type_id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
            cardinality: T::Kind::CARDINALITY,
        }
    }

    /// Full type name of the item.
    pub fn type_name(&self) -> &'static str {
        self.name
    }

    /// Type name without its module path.
    pub fn short_name(&self) -> &'static str {
        short_type_name(self.name)
    }

    pub fn cardinality(&self) -> Cardinality {
        self.cardinality
    }

    pub fn is_multi(&self) -> bool {
        self.cardinality == Cardinality::Multi
    }
}

impl PartialEq for ItemId {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for ItemId {}

impl Hash for ItemId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
    }
}

impl fmt::Debug for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ItemId({}, {})", self.name, self.cardinality)
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

/// Strip module paths from a type name, keeping generic arguments readable.
///
/// `my::items::Wrapper<other::Inner>` becomes `Wrapper<other::Inner>`.
pub(crate) fn short_type_name(name: &str) -> &str {
    // Generic arguments keep their paths; only the outer type is trimmed.
    let head_end = name.find('<').unwrap_or(name.len());
    match name[..head_end].rfind("::") {
        Some(idx) => &name[idx + 2..],
        None => name,
    }
}

/// A capability contributed by a build step.
///
/// Produced automatically for each capability a step declares with
/// [`BuildStepBuilder::provides_capability`](crate::builder::BuildStepBuilder::provides_capability).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapabilityItem {
    name: String,
}

impl CapabilityItem {
    pub fn new(name: impl Into<String>) -> Self {
        CapabilityItem { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl BuildItem for CapabilityItem {
    type Kind = Multi;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Alpha;
    impl BuildItem for Alpha {
        type Kind = Simple;
    }

    struct Beta;
    impl BuildItem for Beta {
        type Kind = Multi;
    }

    #[test]
    fn test_item_id_cardinality() {
        assert_eq!(ItemId::of::<Alpha>().cardinality(), Cardinality::Simple);
        assert_eq!(ItemId::of::<Beta>().cardinality(), Cardinality::Multi);
        assert!(ItemId::of::<Beta>().is_multi());
    }

    #[test]
    fn test_item_id_equality_is_by_type() {
        assert_eq!(ItemId::of::<Alpha>(), ItemId::of::<Alpha>());
        assert_ne!(ItemId::of::<Alpha>(), ItemId::of::<Beta>());
    }

    #[test]
    fn test_item_id_display_is_short() {
        assert_eq!(ItemId::of::<Alpha>().to_string(), "Alpha");
        assert!(ItemId::of::<Alpha>().type_name().ends_with("::Alpha"));
    }

    #[test]
    fn test_short_type_name() {
        assert_eq!(short_type_name("a::b::C"), "C");
        assert_eq!(short_type_name("C"), "C");
        assert_eq!(short_type_name("a::Wrap<b::C>"), "Wrap<b::C>");
    }
}
