//! Arena of class nodes built from one or more parsed documents.
//!
//! Class names are scoped to their enclosing class and compared without
//! regard to ASCII case. Parents are linked once, after every unit has been
//! added; nothing changes after [`ClassTree::build`] returns.

use crate::{
    document::{ClassDef, Document, Item, Op, Property},
    error::{LoadError, ResolveError},
    value::Value,
};
use std::{
    collections::{HashSet, VecDeque},
    fmt,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClassId(usize);

impl fmt::Display for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug)]
pub struct ClassNode {
    pub name: String,
    /// Enclosing class, `None` at the top level.
    pub scope: Option<ClassId>,
    pub parent_name: Option<String>,
    /// Linked parent; stays `None` when `parent_name` matched nothing.
    pub parent: Option<ClassId>,
    pub properties: Vec<Property>,
    pub members: Vec<ClassId>,
    pub deletes: Vec<String>,
    /// Unit of the latest full definition, `None` while only forward
    /// declared.
    pub defined_in: Option<usize>,
    pub line: usize,
}

impl ClassNode {
    pub fn is_forward_declaration(&self) -> bool {
        self.defined_in.is_none()
    }

    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties
            .iter()
            .find(|property| property.name.eq_ignore_ascii_case(name))
    }

    fn is_deleted(&self, name: &str) -> bool {
        self.deletes.iter().any(|deleted| deleted.eq_ignore_ascii_case(name))
    }
}

#[derive(Debug, Default)]
pub struct ClassTree {
    nodes: Vec<ClassNode>,
    roots: Vec<ClassId>,
    units: Vec<String>,
}

impl ClassTree {
    /// Loads units in order. A later unit patches classes an earlier one
    /// defined; a class defined twice by the same unit is an error.
    pub fn build<'a>(
        units: impl IntoIterator<Item = (&'a str, &'a Document)>,
    ) -> Result<Self, LoadError> {
        let mut tree = Self::default();
        for (unit_name, document) in units {
            let unit = tree.units.len();
            tree.units.push(unit_name.to_owned());
            tree.add_items(None, &document.items, unit)?;
        }
        tree.link();
        Ok(tree)
    }

    pub fn node(&self, id: ClassId) -> &ClassNode {
        &self.nodes[id.0]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn units(&self) -> &[String] {
        &self.units
    }

    /// Top-level classes (`CfgPatches`, `CfgVehicles`, ...).
    pub fn groups(&self) -> &[ClassId] {
        &self.roots
    }

    /// Every class in declaration order.
    pub fn ids(&self) -> impl Iterator<Item = ClassId> + '_ {
        (0..self.nodes.len()).map(ClassId)
    }

    pub fn path(&self, id: ClassId) -> String {
        let mut segments = vec![self.node(id).name.as_str()];
        let mut scope = self.node(id).scope;
        while let Some(outer) = scope {
            segments.push(&self.node(outer).name);
            scope = self.node(outer).scope;
        }
        segments.reverse();
        segments.join("/")
    }

    /// Walks a `/` or `>>` separated path from the top level. Each step may
    /// name an own or an inherited member class.
    pub fn find(&self, path: &str) -> Option<ClassId> {
        let mut segments = path
            .split('/')
            .flat_map(|segment| segment.split(">>"))
            .map(str::trim)
            .filter(|segment| !segment.is_empty());
        let first = segments.next()?;
        let mut current = self.own_member(None, first, None)?;
        for segment in segments {
            current = self.member(current, segment)?;
        }
        Some(current)
    }

    /// First class with this name anywhere, in declaration order. Defined
    /// classes win over forward declarations.
    pub fn find_by_name(&self, name: &str) -> Option<ClassId> {
        let mut named =
            self.ids().filter(|&id| self.node(id).name.eq_ignore_ascii_case(name));
        let first = named.next()?;
        if !self.node(first).is_forward_declaration() {
            return Some(first);
        }
        named
            .find(|&id| !self.node(id).is_forward_declaration())
            .or(Some(first))
    }

    pub fn lookup(&self, query: &str) -> Result<ClassId, ResolveError> {
        let single_segment = !query.contains('/') && !query.contains(">>");
        self.find(query)
            .or_else(|| single_segment.then(|| self.find_by_name(query.trim())).flatten())
            .ok_or_else(|| ResolveError::UnknownClass {
                name: query.to_owned(),
                referenced_by: None,
            })
    }

    /// Member class `name` of `id`, declared on it or inherited.
    pub fn member(&self, id: ClassId, name: &str) -> Option<ClassId> {
        self.own_member(Some(id), name, None)
            .or_else(|| self.inherited_member(id, name, None))
    }

    /// Effective member classes: own ones first, then inherited ones not
    /// shadowed or deleted, nearest ancestor first.
    pub fn members(&self, id: ClassId) -> Vec<ClassId> {
        let mut members: Vec<ClassId> = self
            .node(id)
            .members
            .iter()
            .map(|&member| self.declared(member))
            .collect();
        let mut deleted: Vec<&str> =
            self.node(id).deletes.iter().map(String::as_str).collect();
        let mut visited = HashSet::from([id]);
        let mut current = self.node(id).parent;
        while let Some(ancestor) = current {
            if !visited.insert(ancestor) {
                break;
            }
            for &member in &self.node(ancestor).members {
                let name = &self.node(member).name;
                let taken = members
                    .iter()
                    .any(|&m| self.node(m).name.eq_ignore_ascii_case(name));
                let gone = deleted.iter().any(|d| d.eq_ignore_ascii_case(name));
                if !taken && !gone {
                    members.push(member);
                }
            }
            deleted.extend(self.node(ancestor).deletes.iter().map(String::as_str));
            current = self.node(ancestor).parent;
        }
        members
    }

    /// Every broken parent reference and every inheritance cycle.
    pub fn check(&self) -> Vec<ResolveError> {
        let mut problems = Vec::new();
        for id in self.ids() {
            let node = self.node(id);
            if let (Some(name), None) = (&node.parent_name, node.parent) {
                problems.push(ResolveError::UnknownClass {
                    name: name.clone(),
                    referenced_by: Some(self.path(id)),
                });
            }
        }

        let mut reported = HashSet::new();
        for id in self.ids() {
            let mut chain = vec![id];
            let mut current = self.node(id).parent;
            while let Some(next) = current {
                if let Some(start) = chain.iter().position(|&seen| seen == next) {
                    let cycle = &chain[start..];
                    let key = cycle.iter().min().copied();
                    if reported.insert(key) {
                        let mut paths: Vec<_> =
                            cycle.iter().map(|&c| self.path(c)).collect();
                        paths.push(self.path(next));
                        problems.push(ResolveError::CyclicInheritance(paths));
                    }
                    break;
                }
                chain.push(next);
                current = self.node(next).parent;
            }
        }
        problems
    }

    fn members_of(&self, scope: Option<ClassId>) -> &[ClassId] {
        match scope {
            Some(id) => &self.node(id).members,
            None => &self.roots,
        }
    }

    fn own_member(
        &self,
        scope: Option<ClassId>,
        name: &str,
        exclude: Option<ClassId>,
    ) -> Option<ClassId> {
        self.members_of(scope).iter().copied().find(|&member| {
            Some(member) != exclude
                && self.node(member).name.eq_ignore_ascii_case(name)
        })
    }

    fn inherited_member(
        &self,
        id: ClassId,
        name: &str,
        exclude: Option<ClassId>,
    ) -> Option<ClassId> {
        if self.node(id).is_deleted(name) {
            return None;
        }
        let mut visited = HashSet::from([id]);
        let mut current = self.node(id).parent;
        while let Some(ancestor) = current {
            if !visited.insert(ancestor) {
                return None;
            }
            if let Some(found) = self.own_member(Some(ancestor), name, exclude) {
                return Some(found);
            }
            if self.node(ancestor).is_deleted(name) {
                return None;
            }
            current = self.node(ancestor).parent;
        }
        None
    }

    fn add_items(
        &mut self,
        scope: Option<ClassId>,
        items: &[Item],
        unit: usize,
    ) -> Result<(), LoadError> {
        for item in items {
            match item {
                Item::Class(class) => self.add_class(scope, class, unit)?,
                Item::Property(property) => {
                    // Top-level properties have no class to live on.
                    if let Some(id) = scope {
                        self.add_property(id, property);
                    }
                }
                Item::Delete(name) => {
                    if let Some(id) = scope {
                        let node = &mut self.nodes[id.0];
                        if !node.is_deleted(name) {
                            node.deletes.push(name.clone());
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn add_class(
        &mut self,
        scope: Option<ClassId>,
        class: &ClassDef,
        unit: usize,
    ) -> Result<(), LoadError> {
        let id = match self.own_member(scope, &class.name, None) {
            None => {
                let id = ClassId(self.nodes.len());
                self.nodes.push(ClassNode {
                    name: class.name.clone(),
                    scope,
                    parent_name: class.parent.clone(),
                    parent: None,
                    properties: Vec::new(),
                    members: Vec::new(),
                    deletes: Vec::new(),
                    defined_in: class.body.as_ref().map(|_| unit),
                    line: class.line,
                });
                match scope {
                    Some(outer) => self.nodes[outer.0].members.push(id),
                    None => self.roots.push(id),
                }
                id
            }
            Some(id) => {
                if class.body.is_some() && self.node(id).defined_in == Some(unit) {
                    return Err(LoadError::DuplicateClass {
                        class: self.path(id),
                        unit: self.units[unit].clone(),
                        first: self.node(id).line,
                        second: class.line,
                    });
                }
                let node = &mut self.nodes[id.0];
                if class.body.is_none() {
                    if node.is_forward_declaration() && node.parent_name.is_none() {
                        node.parent_name = class.parent.clone();
                    }
                    return Ok(());
                }
                if node.is_forward_declaration() || class.parent.is_some() {
                    node.parent_name = class.parent.clone();
                }
                node.defined_in = Some(unit);
                node.line = class.line;
                id
            }
        };
        match &class.body {
            Some(body) => self.add_items(Some(id), body, unit),
            None => Ok(()),
        }
    }

    fn add_property(&mut self, id: ClassId, property: &Property) {
        let node = &mut self.nodes[id.0];
        match node
            .properties
            .iter_mut()
            .find(|own| own.name.eq_ignore_ascii_case(&property.name))
        {
            Some(own) => {
                if let (Op::Append, Value::Array(more), Value::Array(items)) =
                    (property.op, &property.value, &mut own.value)
                {
                    items.extend(more.iter().cloned());
                } else {
                    *own = property.clone();
                }
            }
            None => node.properties.push(property.clone()),
        }
    }

    // Outer scopes link first so that a scope's own parent chain is known
    // when its members look through inherited classes.
    fn link(&mut self) {
        let mut queue: VecDeque<ClassId> = self.roots.iter().copied().collect();
        while let Some(id) = queue.pop_front() {
            let node = self.node(id);
            let parent = match (&node.parent_name, node.scope) {
                (Some(name), _) => self.find_parent(id, name),
                // `class X;` inside a derived class names the inherited `X`.
                (None, Some(scope)) if node.is_forward_declaration() => {
                    self.inherited_member(scope, &node.name, Some(id))
                }
                _ => None,
            };
            let node = &mut self.nodes[id.0];
            if node.parent_name.is_none() && parent.is_some() {
                node.parent_name = Some(node.name.clone());
            }
            node.parent = parent;
            queue.extend(self.node(id).members.iter().copied());
        }
    }

    /// The class a forward declaration re-declaring an inherited member
    /// stands for; any other class stands for itself.
    fn declared(&self, id: ClassId) -> ClassId {
        let mut current = id;
        let mut visited = HashSet::from([id]);
        while let Some(parent) = self.node(current).parent {
            let node = self.node(current);
            if !node.is_forward_declaration()
                || !self.node(parent).name.eq_ignore_ascii_case(&node.name)
                || !visited.insert(parent)
            {
                break;
            }
            current = parent;
        }
        current
    }

    fn find_parent(&self, id: ClassId, name: &str) -> Option<ClassId> {
        let mut scope = self.node(id).scope;
        loop {
            if let Some(found) = self.own_member(scope, name, Some(id)) {
                return Some(found);
            }
            let outer = scope?;
            if let Some(found) = self.inherited_member(outer, name, Some(id)) {
                return Some(found);
            }
            scope = self.node(outer).scope;
        }
    }
}
