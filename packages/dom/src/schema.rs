//! # Address Schema
//!
//! Decides how each element is addressed and resolves addresses back to
//! nodes.
//!
//! A schema names the root element, the element names that are unique under
//! their parent (*singular* slots such as `connections`), and the element
//! names that repeat and are told apart by a key attribute (*keyed* nodes such
//! as `model[@name="A"]`). Both documents of a project pair carry their own
//! schema; see [`AddressSchema::project`] and
//! [`AddressSchema::project_metadata`].
//!
//! ## Resolution modes
//!
//! - **Read** ([`AddressSchema::locate`]): never touches the tree.
//! - **Write** ([`AddressSchema::locate_for_write`]): appends missing singular
//!   containers on the way down. Keyed nodes are never created.
//!
//! A keyed segment whose key is gone is not an error: the address was taken
//! against an older tree shape. Callers get `None` and decide how to fall back
//! (see [`AddressSchema::fallback`]).

use crate::{AddressError, DomResult, Element, Locator, NodeAddress, Segment};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{trace, warn};

/// Naming rules used to build and resolve [`NodeAddress`]es
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressSchema {
    /// Element name of the document root
    pub root: String,

    /// Attribute that disambiguates keyed siblings
    #[serde(default = "default_key_attribute")]
    pub key_attribute: String,

    /// Element names unique under their parent
    #[serde(default)]
    pub singular: BTreeSet<String>,

    /// Element names that repeat and are selected by key
    #[serde(default)]
    pub keyed: BTreeSet<String>,
}

fn default_key_attribute() -> String {
    "name".to_string()
}

impl AddressSchema {
    pub fn new(root: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            key_attribute: default_key_attribute(),
            singular: BTreeSet::new(),
            keyed: BTreeSet::new(),
        }
    }

    pub fn with_singular<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.singular.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn with_keyed<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keyed.extend(names.into_iter().map(Into::into));
        self
    }

    /// Schema of the primary project document
    pub fn project() -> Self {
        Self::new("vle_project")
            .with_singular([
                "structures",
                "submodels",
                "in",
                "out",
                "connections",
                "classes",
                "dynamics",
                "conditions",
                "experiment",
                "views",
                "observables",
            ])
            .with_keyed(["port", "model", "class", "dynamic", "condition", "observable"])
    }

    /// Schema of the side metadata document paired with a project
    pub fn project_metadata() -> Self {
        Self::new("vle_project_metadata")
            .with_singular(["condPlugins", "outputGUIplugins"])
            .with_keyed(["condPlugin", "outputGUIplugin"])
    }

    /// Load a schema from its JSON description
    pub fn from_json(json: &str) -> DomResult<Self> {
        let schema: AddressSchema = serde_json::from_str(json)?;
        if let Some(name) = schema.singular.intersection(&schema.keyed).next() {
            return Err(AddressError::Schema(format!(
                "<{}> cannot be both singular and keyed",
                name
            )));
        }
        Ok(schema)
    }

    pub fn is_singular(&self, name: &str) -> bool {
        self.singular.contains(name)
    }

    pub fn is_keyed(&self, name: &str) -> bool {
        self.keyed.contains(name)
    }

    /// Address of the root element
    pub fn root_address(&self) -> NodeAddress {
        NodeAddress::from_segments(&[Segment::singular(&self.root)])
    }

    /// Segment naming `node` under its parent
    fn segment_for(&self, node: &Element) -> DomResult<Segment> {
        if self.is_singular(&node.name) {
            return Ok(Segment::singular(&node.name));
        }
        if self.is_keyed(&node.name) {
            let key = node.attr(&self.key_attribute).unwrap_or_default();
            return Ok(Segment::keyed(&node.name, &self.key_attribute, key));
        }
        Err(AddressError::UnknownElement {
            name: node.name.clone(),
        })
    }

    /// Compute the address of the node at `locator`
    ///
    /// Walks from the root down the locator, emitting one segment per node.
    pub fn address_of(&self, root: &Element, locator: &Locator) -> DomResult<NodeAddress> {
        if root.name != self.root {
            return Err(AddressError::RootMismatch {
                expected: self.root.clone(),
                found: root.name.clone(),
            });
        }

        let mut segments = vec![Segment::singular(&self.root)];
        let mut node = root;
        for &index in locator.indices() {
            let child = node
                .children
                .get(index)
                .ok_or_else(|| AddressError::Detached(locator.clone()))?;
            let segment = self.segment_for(child)?;

            if let Segment::Keyed { name, key, .. } = &segment {
                if node.keyed_child_position(name, &self.key_attribute, key) != Some(index) {
                    warn!(
                        element = %name,
                        key = %key,
                        "keyed sibling shadowed by an earlier duplicate"
                    );
                }
            }

            segments.push(segment);
            node = child;
        }

        Ok(NodeAddress::from_segments(&segments))
    }

    /// Resolve an address without modifying the tree
    pub fn locate(&self, root: &Element, address: &NodeAddress) -> Option<Locator> {
        let segments = self.root_checked(root, address)?;

        let mut locator = Locator::root();
        let mut node = root;
        for segment in &segments[1..] {
            let index = self.child_index(node, segment)?;
            locator = locator.child(index);
            node = &node.children[index];
        }
        Some(locator)
    }

    /// Resolve an address, creating missing singular containers on the way
    pub fn locate_for_write(&self, root: &mut Element, address: &NodeAddress) -> Option<Locator> {
        let segments = self.root_checked(root, address)?;

        let mut locator = Locator::root();
        let mut node = root;
        for segment in &segments[1..] {
            let index = match self.child_index(node, segment) {
                Some(index) => index,
                None => match segment {
                    Segment::Singular(name) if self.is_singular(name) => {
                        trace!(container = %name, "creating singular container");
                        node.obtain_child_position(name)
                    }
                    _ => return None,
                },
            };
            locator = locator.child(index);
            node = &mut node.children[index];
        }
        Some(locator)
    }

    /// Whether write-mode resolution would succeed, without touching the tree
    ///
    /// Holds when every keyed segment exists; missing singular containers
    /// are fine as long as nothing keyed hangs below them.
    pub fn resolves_for_write(&self, root: &Element, address: &NodeAddress) -> bool {
        let Some(segments) = self.root_checked(root, address) else {
            return false;
        };

        let mut node = Some(root);
        for segment in &segments[1..] {
            node = match node {
                Some(parent) => match self.child_index(parent, segment) {
                    Some(index) => Some(&parent.children[index]),
                    None if matches!(segment, Segment::Singular(name) if self.is_singular(name)) => {
                        None
                    }
                    None => return false,
                },
                None if matches!(segment, Segment::Singular(name) if self.is_singular(name)) => None,
                None => return false,
            };
        }
        true
    }

    /// Node at `address`, read mode
    pub fn node<'a>(&self, root: &'a Element, address: &NodeAddress) -> Option<&'a Element> {
        let locator = self.locate(root, address)?;
        root.get(&locator)
    }

    /// Node at `address`, write mode
    pub fn node_mut<'a>(
        &self,
        root: &'a mut Element,
        address: &NodeAddress,
    ) -> Option<&'a mut Element> {
        let locator = self.locate_for_write(root, address)?;
        root.get_mut(&locator)
    }

    /// Best-effort locator for an address that no longer resolves
    ///
    /// The parent address must still resolve. The child sitting at the index
    /// recorded when the address was taken is accepted if it has the same
    /// element name.
    pub fn fallback(
        &self,
        root: &Element,
        address: &NodeAddress,
        recorded: &Locator,
    ) -> Option<Locator> {
        let segments = address.segments().ok()?;
        let last = segments.last()?;
        let parent = self.locate(root, &address.parent()?)?;
        let index = recorded.last()?;

        let candidate = root.get(&parent)?.children.get(index)?;
        if candidate.name != last.name() {
            return None;
        }
        Some(parent.child(index))
    }

    fn root_checked(&self, root: &Element, address: &NodeAddress) -> Option<Vec<Segment>> {
        let segments = address.segments().ok()?;
        match segments.first() {
            Some(Segment::Singular(name)) if *name == self.root && root.name == self.root => {
                Some(segments)
            }
            _ => None,
        }
    }

    fn child_index(&self, node: &Element, segment: &Segment) -> Option<usize> {
        match segment {
            Segment::Singular(name) if self.is_singular(name) => node.child_position(name),
            Segment::Keyed {
                name,
                attribute,
                key,
            } if self.is_keyed(name) => node.keyed_child_position(name, attribute, key),
            _ => None,
        }
    }
}
