//! Tree traversal.
//!
//! Implement the `visit_*` hooks you care about; each default forwards to
//! the matching `walk_*` function, which descends into children. Override a
//! hook and skip the `walk_*` call to prune a subtree.

use crate::cst::{Include, Item, Object, Property, SiiFile};

pub trait Visitor {
    fn visit_file(&mut self, file: &SiiFile) {
        walk_file(self, file);
    }

    fn visit_item(&mut self, item: &Item) {
        walk_item(self, item);
    }

    fn visit_object(&mut self, object: &Object) {
        walk_object(self, object);
    }

    fn visit_property(&mut self, _property: &Property) {}

    fn visit_include(&mut self, _include: &Include) {}
}

pub fn walk_file<V: Visitor + ?Sized>(visitor: &mut V, file: &SiiFile) {
    for item in &file.items {
        visitor.visit_item(item);
    }
}

pub fn walk_item<V: Visitor + ?Sized>(visitor: &mut V, item: &Item) {
    match item {
        Item::Include(include) => visitor.visit_include(include),
        Item::Object(object) => visitor.visit_object(object),
        Item::Property(property) => visitor.visit_property(property),
    }
}

pub fn walk_object<V: Visitor + ?Sized>(visitor: &mut V, object: &Object) {
    for item in &object.body {
        visitor.visit_item(item);
    }
}
