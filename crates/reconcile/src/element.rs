//! Set reconciliation for typed rule elements.
//!
//! The remote API stores sources, destinations, services and applied-to
//! targets as ordered lists. Locally they are sets keyed by a content hash of
//! `(value, type)`, so reordering on the server never shows up as drift and
//! duplicates collapse. Remote-computed metadata (`name`, `is_valid`) rides
//! along but is not part of identity.

use crate::wire::UnknownVariant;
use nsxkit::api::{Element, ElementList};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};

wire_enum! {
    /// Closed set of element types accepted by the firewall.
    pub enum ElementType {
        AllEdges => "ALL_EDGES",
        Application => "Application",
        ApplicationGroup => "ApplicationGroup",
        Datacenter => "Datacenter",
        DistributedFirewall => "DISTRIBUTED_FIREWALL",
        DistributedVirtualPortgroup => "DistributedVirtualPortgroup",
        Edge => "Edge",
        GlobalRoot => "GlobalRoot",
        IpSet => "IPSet",
        Ipv4Address => "Ipv4Address",
        Ipv6Address => "Ipv6Address",
        VirtualWire => "VirtualWire",
        MacSet => "MACSet",
        Network => "Network",
        AllProfileBindings => "ALL_PROFILE_BINDINGS",
        ResourcePool => "ResourcePool",
        SecurityGroup => "SecurityGroup",
        Vnic => "Vnic",
    }
}

/// Failures converting or combining element collections.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ElementError {
    #[error(transparent)]
    UnknownType(#[from] UnknownVariant),

    #[error("{family} and {family}_excluded are mutually exclusive")]
    Exclusive { family: &'static str },
}

/// One member of a set-valued rule attribute.
///
/// Equality and hashing consider only `(value, type)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypedElement {
    pub value: String,
    #[serde(rename = "type")]
    pub element_type: ElementType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_valid: Option<bool>,
}

impl TypedElement {
    pub fn new(element_type: ElementType, value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            element_type,
            name: None,
            is_valid: None,
        }
    }

    /// Content identity of this element.
    #[must_use]
    pub fn key(&self) -> ElementKey {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.value.as_bytes());
        hasher.update(&[0]);
        hasher.update(self.element_type.as_str().as_bytes());
        ElementKey(*hasher.finalize().as_bytes())
    }

    fn to_wire(&self) -> Element {
        Element {
            name: self.name.clone(),
            value: self.value.clone(),
            element_type: self.element_type.as_str().to_string(),
            is_valid: self.is_valid,
        }
    }

    fn from_wire(element: &Element) -> Result<Self, UnknownVariant> {
        Ok(Self {
            value: element.value.clone(),
            element_type: element.element_type.parse()?,
            name: element.name.clone().filter(|n| !n.is_empty()),
            is_valid: element.is_valid,
        })
    }
}

impl PartialEq for TypedElement {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value && self.element_type == other.element_type
    }
}

impl Eq for TypedElement {}

impl Hash for TypedElement {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.value.hash(state);
        self.element_type.hash(state);
    }
}

/// blake3 digest of an element's `(value, type)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementKey([u8; 32]);

/// An unordered set of elements, iterated in content-hash order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<TypedElement>", into = "Vec<TypedElement>")]
pub struct ElementSet {
    members: BTreeMap<ElementKey, TypedElement>,
}

impl ElementSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an element. Returns false if an equal element was already present.
    pub fn insert(&mut self, element: TypedElement) -> bool {
        let key = element.key();
        if self.members.contains_key(&key) {
            return false;
        }
        self.members.insert(key, element);
        true
    }

    #[must_use]
    pub fn contains(&self, element: &TypedElement) -> bool {
        self.members.contains_key(&element.key())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TypedElement> {
        self.members.values()
    }
}

impl FromIterator<TypedElement> for ElementSet {
    fn from_iter<I: IntoIterator<Item = TypedElement>>(iter: I) -> Self {
        let mut set = Self::new();
        for element in iter {
            set.insert(element);
        }
        set
    }
}

impl From<Vec<TypedElement>> for ElementSet {
    fn from(elements: Vec<TypedElement>) -> Self {
        elements.into_iter().collect()
    }
}

impl From<ElementSet> for Vec<TypedElement> {
    fn from(set: ElementSet) -> Self {
        set.members.into_values().collect()
    }
}

/// A set together with its exclusion flag.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ElementCollection {
    pub excluded: bool,
    pub elements: ElementSet,
}

impl ElementCollection {
    #[must_use]
    pub fn included(elements: ElementSet) -> Self {
        Self {
            excluded: false,
            elements,
        }
    }

    #[must_use]
    pub fn excluded(elements: ElementSet) -> Self {
        Self {
            excluded: true,
            elements,
        }
    }

    /// Split back into the `(included, excluded)` attribute pair.
    #[must_use]
    pub fn split(self) -> (Option<ElementSet>, Option<ElementSet>) {
        if self.excluded {
            (None, Some(self.elements))
        } else {
            (Some(self.elements), None)
        }
    }
}

/// Flatten a collection to the wire list, ordered by content hash.
#[must_use]
pub fn to_wire(collection: &ElementCollection) -> ElementList {
    ElementList {
        excluded: collection.excluded,
        elements: collection.elements.iter().map(TypedElement::to_wire).collect(),
    }
}

/// Rebuild a collection from a wire list.
pub fn from_wire(list: &ElementList) -> Result<ElementCollection, ElementError> {
    let elements = list
        .elements
        .iter()
        .map(TypedElement::from_wire)
        .collect::<Result<ElementSet, _>>()?;
    Ok(ElementCollection {
        excluded: list.excluded,
        elements,
    })
}

/// Combine the included and excluded variants of one attribute family.
///
/// Declaring both is an error, even when one of them is empty.
pub fn exclusive(
    family: &'static str,
    included: Option<&ElementSet>,
    excluded: Option<&ElementSet>,
) -> Result<Option<ElementCollection>, ElementError> {
    match (included, excluded) {
        (Some(_), Some(_)) => Err(ElementError::Exclusive { family }),
        (Some(set), None) => Ok(Some(ElementCollection::included(set.clone()))),
        (None, Some(set)) => Ok(Some(ElementCollection::excluded(set.clone()))),
        (None, None) => Ok(None),
    }
}

/// Elements added and removed between two sets, by identity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SetDiff {
    pub added: Vec<TypedElement>,
    pub removed: Vec<TypedElement>,
}

impl SetDiff {
    #[must_use]
    pub fn between(current: &ElementSet, desired: &ElementSet) -> Self {
        Self {
            added: desired.iter().filter(|e| !current.contains(e)).cloned().collect(),
            removed: current.iter().filter(|e| !desired.contains(e)).cloned().collect(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn ip(value: &str) -> TypedElement {
        TypedElement::new(ElementType::Ipv4Address, value)
    }

    fn set(elements: &[TypedElement]) -> ElementSet {
        elements.iter().cloned().collect()
    }

    #[test]
    fn test_identity_ignores_metadata() {
        let mut named = ip("10.0.0.1");
        named.name = Some("web-01".into());
        named.is_valid = Some(true);
        assert_eq!(named, ip("10.0.0.1"));
        assert_eq!(named.key(), ip("10.0.0.1").key());
    }

    #[test]
    fn test_identity_includes_type() {
        let a = TypedElement::new(ElementType::IpSet, "ipset-1");
        let b = TypedElement::new(ElementType::SecurityGroup, "ipset-1");
        assert_ne!(a, b);
        assert_ne!(a.key(), b.key());
    }

    #[test]
    fn test_duplicates_collapse() {
        let mut s = ElementSet::new();
        assert!(s.insert(ip("10.0.0.1")));
        assert!(!s.insert(ip("10.0.0.1")));
        assert_eq!(s.len(), 1);
    }

    #[test]
    fn test_round_trip_preserves_pairs_in_any_order() {
        let elements = vec![
            ip("10.0.0.1"),
            ip("10.0.0.2"),
            TypedElement::new(ElementType::SecurityGroup, "securitygroup-10"),
            TypedElement::new(ElementType::Application, "application-7"),
        ];
        let forward = set(&elements);
        let mut reversed_input = elements.clone();
        reversed_input.reverse();
        let reversed = set(&reversed_input);

        let wire = to_wire(&ElementCollection::included(forward.clone()));
        assert_eq!(wire, to_wire(&ElementCollection::included(reversed)));
        assert_eq!(wire.elements.len(), 4);

        let back = from_wire(&wire).unwrap();
        assert!(!back.excluded);
        assert_eq!(back.elements, forward);

        let pairs: HashSet<(String, ElementType)> = back
            .elements
            .iter()
            .map(|e| (e.value.clone(), e.element_type))
            .collect();
        let expected: HashSet<(String, ElementType)> = elements
            .iter()
            .map(|e| (e.value.clone(), e.element_type))
            .collect();
        assert_eq!(pairs, expected);
    }

    #[test]
    fn test_from_wire_keeps_exclusion_and_metadata() {
        let list = ElementList {
            excluded: true,
            elements: vec![Element {
                name: Some("web".into()),
                value: "ipset-3".into(),
                element_type: "IPSet".into(),
                is_valid: Some(true),
            }],
        };
        let collection = from_wire(&list).unwrap();
        assert!(collection.excluded);
        let element = collection.elements.iter().next().unwrap();
        assert_eq!(element.name.as_deref(), Some("web"));
        assert_eq!(element.element_type, ElementType::IpSet);

        let (included, excluded) = collection.split();
        assert!(included.is_none());
        assert_eq!(excluded.unwrap().len(), 1);
    }

    #[test]
    fn test_unknown_type_rejected() {
        let list = ElementList {
            excluded: false,
            elements: vec![Element {
                name: None,
                value: "x".into(),
                element_type: "Banana".into(),
                is_valid: None,
            }],
        };
        assert!(matches!(from_wire(&list), Err(ElementError::UnknownType(_))));
    }

    #[test]
    fn test_empty_round_trips_to_empty() {
        let wire = to_wire(&ElementCollection::included(ElementSet::new()));
        assert!(wire.elements.is_empty());
        let back = from_wire(&wire).unwrap();
        assert!(back.elements.is_empty());
        assert_eq!(back.split().0, Some(ElementSet::new()));
    }

    #[test]
    fn test_exclusive() {
        let s = set(&[ip("10.0.0.1")]);
        let err = exclusive("source", Some(&s), Some(&ElementSet::new())).unwrap_err();
        assert_eq!(err.to_string(), "source and source_excluded are mutually exclusive");

        let combined = exclusive("source", None, Some(&s)).unwrap().unwrap();
        assert!(combined.excluded);
        assert!(exclusive("source", None, None).unwrap().is_none());
    }

    #[test]
    fn test_set_diff() {
        let current = set(&[ip("10.0.0.1"), ip("10.0.0.2")]);
        let desired = set(&[ip("10.0.0.2"), ip("10.0.0.3")]);
        let diff = SetDiff::between(&current, &desired);
        assert_eq!(diff.added, vec![ip("10.0.0.3")]);
        assert_eq!(diff.removed, vec![ip("10.0.0.1")]);
        assert!(SetDiff::between(&current, &current).is_empty());
    }

    #[test]
    fn test_serializes_as_list() {
        let s = set(&[ip("10.0.0.1")]);
        let json = serde_json::to_value(&s).unwrap();
        assert_eq!(json[0]["type"], "Ipv4Address");
        assert_eq!(json[0]["value"], "10.0.0.1");

        let back: ElementSet = serde_json::from_value(json).unwrap();
        assert_eq!(back, s);
    }
}
