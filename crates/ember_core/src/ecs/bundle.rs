//! Component bundles: groups of components added to an entity atomically.
//!
//! Two ways to build an entity from a bundle:
//! - The static [`Bundle`] trait, implemented for tuples of components and
//!   `Option<Component>` (an always-present vs. optional field), used from
//!   plain Rust code where the shape is known at compile time.
//! - [`BundleDescriptor`], a data-driven schema of named required/optional
//!   fields (with nested descriptors flattening into the parent) used when
//!   entities are assembled from a runtime data source rather than Rust
//!   struct literals.

use std::collections::{HashMap, HashSet};

use thiserror::Error;

use super::builder::EntityBuilder;
use super::component::{meta_of, Component, ComponentId};

/// A statically-typed group of components added to an entity together.
pub trait Bundle {
    fn add_to(self, builder: EntityBuilder) -> EntityBuilder;
}

impl<T: Component> Bundle for T {
    fn add_to(self, builder: EntityBuilder) -> EntityBuilder {
        builder.with(self)
    }
}

/// `Option<T>` models an optional bundle field: present values are added,
/// `None` is simply skipped.
impl<T: Component> Bundle for Option<T> {
    fn add_to(self, builder: EntityBuilder) -> EntityBuilder {
        match self {
            Some(value) => builder.with(value),
            None => builder,
        }
    }
}

macro_rules! impl_bundle_tuple {
    ($($name:ident),+) => {
        impl<$($name: Bundle),+> Bundle for ($($name,)+) {
            #[allow(non_snake_case)]
            fn add_to(self, builder: EntityBuilder) -> EntityBuilder {
                let ($($name,)+) = self;
                let mut builder = builder;
                $(builder = $name.add_to(builder);)+
                builder
            }
        }
    };
}

impl_bundle_tuple!(A);
impl_bundle_tuple!(A, B);
impl_bundle_tuple!(A, B, C);
impl_bundle_tuple!(A, B, C, D);
impl_bundle_tuple!(A, B, C, D, E);
impl_bundle_tuple!(A, B, C, D, E, F);
impl_bundle_tuple!(A, B, C, D, E, F, G);
impl_bundle_tuple!(A, B, C, D, E, F, G, H);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BundleError {
    #[error("bundle field '{field}' is required but was not supplied")]
    MissingRequired { field: String },

    #[error("bundle field '{field}' supplies a component type already set by another field in the flattened shape")]
    DuplicateComponent { field: String },
}

enum FieldKind {
    Component { id: ComponentId, required: bool },
    Nested(BundleDescriptor),
}

struct Field {
    name: &'static str,
    kind: FieldKind,
}

/// Data-driven bundle schema: a list of named fields, each either a
/// required/optional component slot or a nested descriptor that flattens
/// into this one when built.
#[derive(Default)]
pub struct BundleDescriptor {
    fields: Vec<Field>,
}

impl BundleDescriptor {
    pub fn new() -> Self {
        Self { fields: Vec::new() }
    }

    pub fn required_field(mut self, name: &'static str, component: ComponentId) -> Self {
        self.fields.push(Field { name, kind: FieldKind::Component { id: component, required: true } });
        self
    }

    pub fn optional_field(mut self, name: &'static str, component: ComponentId) -> Self {
        self.fields.push(Field { name, kind: FieldKind::Component { id: component, required: false } });
        self
    }

    /// Flattens another descriptor's fields into this one under `name` for
    /// error reporting; its required fields are still required.
    pub fn nested(mut self, name: &'static str, inner: BundleDescriptor) -> Self {
        self.fields.push(Field { name, kind: FieldKind::Nested(inner) });
        self
    }

    /// Build an `EntityBuilder` from a map of field name -> raw component
    /// bytes. Recurses into nested descriptors, flattening their fields
    /// into the same value map (nested field names are looked up by the
    /// nested descriptor's own field names, not prefixed).
    pub fn build(&self, values: &HashMap<&str, Vec<u8>>) -> Result<EntityBuilder, BundleError> {
        let mut builder = EntityBuilder::new();
        let mut seen = HashSet::new();
        self.build_into(values, &mut builder, &mut seen)?;
        Ok(builder)
    }

    /// `seen` tracks every component id already placed into `builder` by
    /// this call tree, so the same component type supplied by two fields -
    /// including across a nested descriptor's flattened fields - is
    /// rejected instead of the second value silently overwriting the
    /// first.
    fn build_into(&self, values: &HashMap<&str, Vec<u8>>, builder: &mut EntityBuilder, seen: &mut HashSet<ComponentId>) -> Result<(), BundleError> {
        for field in &self.fields {
            match &field.kind {
                FieldKind::Component { id, required } => match values.get(field.name) {
                    Some(bytes) => {
                        if !seen.insert(*id) {
                            return Err(BundleError::DuplicateComponent { field: field.name.to_string() });
                        }
                        let meta = meta_of(*id).expect("bundle references unregistered component");
                        *builder = std::mem::take(builder).with_raw(*id, bytes.clone(), meta.size);
                    }
                    None => {
                        if *required {
                            return Err(BundleError::MissingRequired { field: field.name.to_string() });
                        }
                    }
                },
                FieldKind::Nested(inner) => {
                    inner.build_into(values, builder, seen)?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::define_component;

    #[derive(Clone, Copy)]
    struct Position {
        #[allow(dead_code)]
        x: f32,
        #[allow(dead_code)]
        y: f32,
    }
    define_component!(Position, "ember_core::bundle::tests::Position");

    #[derive(Clone, Copy)]
    struct Velocity {
        #[allow(dead_code)]
        dx: f32,
        #[allow(dead_code)]
        dy: f32,
    }
    define_component!(Velocity, "ember_core::bundle::tests::Velocity");

    #[test]
    fn static_tuple_bundle_adds_all_components() {
        let builder = (Position { x: 0.0, y: 0.0 }, Velocity { dx: 1.0, dy: 0.0 }).add_to(EntityBuilder::new());
        let comps = builder.into_components();
        assert_eq!(comps.len(), 2);
    }

    #[test]
    fn optional_field_skipped_when_none() {
        let builder = (Position { x: 0.0, y: 0.0 }, None::<Velocity>).add_to(EntityBuilder::new());
        assert_eq!(builder.into_components().len(), 1);
    }

    #[test]
    fn descriptor_reports_missing_required_field() {
        let descriptor = BundleDescriptor::new()
            .required_field("position", Position::id())
            .optional_field("velocity", Velocity::id());
        let values: HashMap<&str, Vec<u8>> = HashMap::new();
        let err = descriptor.build(&values).unwrap_err();
        assert_eq!(err, BundleError::MissingRequired { field: "position".to_string() });
    }

    #[test]
    fn descriptor_rejects_two_fields_mapping_to_the_same_component() {
        let descriptor = BundleDescriptor::new().required_field("position", Position::id()).required_field("position_again", Position::id());
        let mut values: HashMap<&str, Vec<u8>> = HashMap::new();
        values.insert("position", vec![0u8; std::mem::size_of::<Position>()]);
        values.insert("position_again", vec![0u8; std::mem::size_of::<Position>()]);
        let err = descriptor.build(&values).unwrap_err();
        assert_eq!(err, BundleError::DuplicateComponent { field: "position_again".to_string() });
    }

    #[test]
    fn nested_descriptor_duplicate_against_parent_field_is_rejected() {
        let nested = BundleDescriptor::new().required_field("position", Position::id());
        let descriptor = BundleDescriptor::new().required_field("position", Position::id()).nested("inner", nested);
        let mut values: HashMap<&str, Vec<u8>> = HashMap::new();
        values.insert("position", vec![0u8; std::mem::size_of::<Position>()]);
        let err = descriptor.build(&values).unwrap_err();
        assert_eq!(err, BundleError::DuplicateComponent { field: "position".to_string() });
    }
}
