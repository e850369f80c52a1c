use crate::{
    document::Op,
    error::ResolveError,
    tree::{ClassId, ClassTree},
    value::Value,
};
use serde::{ser::Serializer, Serialize};

/// Effective view of one class after walking its parent chain.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedClass {
    pub name: String,
    pub path: String,
    pub parent: Option<String>,
    /// Nearest ancestor first.
    pub ancestors: Vec<String>,
    #[serde(serialize_with = "ordered_map")]
    pub properties: Vec<(String, Value)>,
    pub classes: Vec<String>,
}

fn ordered_map<S: Serializer>(
    properties: &[(String, Value)],
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_map(properties.iter().map(|(key, value)| (key, value)))
}

pub struct Resolver<'a> {
    pub tree: &'a ClassTree,
}

impl<'a> Resolver<'a> {
    pub fn new(tree: &'a ClassTree) -> Self {
        Self { tree }
    }

    /// Parent chain of `id`, nearest first, not including `id` itself.
    pub fn ancestors(&self, id: ClassId) -> Result<Vec<ClassId>, ResolveError> {
        let mut chain = vec![id];
        let mut current = id;
        loop {
            let node = self.tree.node(current);
            let Some(name) = &node.parent_name else {
                break;
            };
            let parent =
                node.parent.ok_or_else(|| ResolveError::UnknownClass {
                    name: name.clone(),
                    referenced_by: Some(self.tree.path(current)),
                })?;
            if let Some(start) = chain.iter().position(|&seen| seen == parent) {
                let mut cycle: Vec<_> = chain[start..]
                    .iter()
                    .map(|&class| self.tree.path(class))
                    .collect();
                cycle.push(self.tree.path(parent));
                return Err(ResolveError::CyclicInheritance(cycle));
            }
            chain.push(parent);
            current = parent;
        }
        chain.remove(0);
        Ok(chain)
    }

    pub fn resolve(&self, id: ClassId) -> Result<ResolvedClass, ResolveError> {
        let ancestors = self.ancestors(id)?;
        let mut properties: Vec<(String, Value)> = Vec::new();
        for &class in ancestors.iter().rev().chain(std::iter::once(&id)) {
            for property in &self.tree.node(class).properties {
                let existing = properties
                    .iter_mut()
                    .find(|(key, _)| key.eq_ignore_ascii_case(&property.name));
                match existing {
                    Some((_, value)) => {
                        *value = apply(value, property.op, &property.value)
                    }
                    None => properties
                        .push((property.name.clone(), property.value.clone())),
                }
            }
        }

        let node = self.tree.node(id);
        Ok(ResolvedClass {
            name: node.name.clone(),
            path: self.tree.path(id),
            parent: node.parent_name.clone(),
            ancestors: ancestors
                .iter()
                .map(|&class| self.tree.node(class).name.clone())
                .collect(),
            properties,
            classes: self
                .tree
                .members(id)
                .into_iter()
                .map(|class| self.tree.node(class).name.clone())
                .collect(),
        })
    }

    /// Value of one property, `None` when no class in the chain defines it.
    pub fn resolve_property(
        &self,
        id: ClassId,
        name: &str,
    ) -> Result<Option<Value>, ResolveError> {
        let ancestors = self.ancestors(id)?;
        let mut appended = Vec::new();
        for class in std::iter::once(id).chain(ancestors) {
            let Some(property) = self.tree.node(class).property(name) else {
                continue;
            };
            match (property.op, &property.value) {
                (Op::Append, Value::Array(items)) => appended.push(items),
                _ => {
                    return Ok(Some(
                        appended.iter().rev().fold(property.value.clone(), |base, more| {
                            apply(&base, Op::Append, &Value::Array(more.to_vec()))
                        }),
                    ))
                }
            }
        }
        if appended.is_empty() {
            return Ok(None);
        }
        Ok(Some(Value::Array(
            appended.iter().rev().flat_map(|items| items.iter().cloned()).collect(),
        )))
    }

    pub fn resolve_query(
        &self,
        query: &str,
    ) -> Result<ResolvedClass, ResolveError> {
        self.resolve(self.tree.lookup(query)?)
    }
}

/// `+=` onto an inherited array concatenates; anything else replaces.
fn apply(inherited: &Value, op: Op, own: &Value) -> Value {
    match (op, inherited, own) {
        (Op::Append, Value::Array(base), Value::Array(more)) => {
            Value::Array(base.iter().chain(more).cloned().collect())
        }
        _ => own.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse;

    fn tree(source: &str) -> ClassTree {
        let doc = parse::document(source).unwrap();
        ClassTree::build([("test.cpp", &doc)]).unwrap()
    }

    fn mirrorform() -> ClassTree {
        tree(include_str!("../fixtures/mirrorform.cpp"))
    }

    fn get<'a>(class: &'a ResolvedClass, name: &str) -> Option<&'a Value> {
        class
            .properties
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value)
    }

    #[test]
    fn test_local_property_wins() {
        let tree = mirrorform();
        let resolver = Resolver::new(&tree);
        let id = tree.lookup("TC_B_Mirror_1").unwrap();
        assert_eq!(
            resolver.resolve_property(id, "displayName").unwrap(),
            Some(Value::from("Mirrorform"))
        );
        assert_eq!(
            resolver.resolve_property(id, "scope").unwrap(),
            Some(Value::Number(2.0))
        );
    }

    #[test]
    fn test_inherited_property_comes_from_ancestor() {
        let tree = mirrorform();
        let resolver = Resolver::new(&tree);
        let id = tree.lookup("TC_B_Mirror_1").unwrap();
        assert_eq!(
            resolver.resolve_property(id, "model").unwrap(),
            Some(Value::from(r"\tc\mirrorform\uniform\mirror.p3d"))
        );
        assert_eq!(resolver.resolve_property(id, "armor").unwrap(), None);
    }

    #[test]
    fn test_undefined_property_matches_parent() {
        let tree = mirrorform();
        let resolver = Resolver::new(&tree);
        for id in tree.ids() {
            let Some(parent) = tree.node(id).parent else {
                continue;
            };
            let own = &tree.node(id).properties;
            for key in ["author", "model", "scope", "uniformClass", "mass"] {
                if own.iter().any(|p| p.name.eq_ignore_ascii_case(key)) {
                    continue;
                }
                assert_eq!(
                    resolver.resolve_property(id, key).unwrap(),
                    resolver.resolve_property(parent, key).unwrap(),
                    "{} / {key}",
                    tree.path(id)
                );
            }
        }
    }

    #[test]
    fn test_resolve_whole_class() {
        let tree = mirrorform();
        let resolved = Resolver::new(&tree).resolve_query("TC_B_Mirror_1").unwrap();
        assert_eq!(resolved.path, "CfgVehicles/TC_B_Mirror_1");
        assert_eq!(resolved.ancestors, ["TC_B_Mirror_Base", "B_Soldier_base_F"]);
        let keys: Vec<_> =
            resolved.properties.iter().map(|(key, _)| key.as_str()).collect();
        assert_eq!(
            keys,
            [
                "author",
                "scope",
                "displayName",
                "model",
                "uniformClass",
                "hiddenSelections",
                "hiddenSelectionsTextures",
            ]
        );
        assert_eq!(get(&resolved, "uniformclass"), Some(&Value::from("TC_U_Mirror_1")));
        assert_eq!(get(&resolved, "author"), Some(&Value::from("Tyen")));
    }

    #[test]
    fn test_nested_class_inherits_members() {
        let tree = mirrorform();
        let resolved = Resolver::new(&tree)
            .resolve_query("CfgWeapons/TC_U_Mirror_1")
            .unwrap();
        assert_eq!(resolved.classes, ["ItemInfo"]);
        assert_eq!(get(&resolved, "model"), Some(&Value::from(r"\tc\mirrorform\uniform\mirror.p3d")));
    }

    #[test]
    fn test_redeclared_member_keeps_inherited_properties() {
        let tree = tree(
            r#"class CfgVehicles {
                class LandVehicle { class NewTurret { gunnerAction = "g"; }; };
                class Tank: LandVehicle {
                    class NewTurret;
                    class Turrets { class MainTurret: NewTurret {}; };
                };
            };"#,
        );
        let resolver = Resolver::new(&tree);
        let main = tree.find("CfgVehicles/Tank/Turrets/MainTurret").unwrap();
        assert_eq!(
            resolver.resolve_property(main, "gunnerAction").unwrap(),
            Some(Value::from("g"))
        );
        let resolved = resolver.resolve(main).unwrap();
        assert_eq!(resolved.ancestors, ["NewTurret", "NewTurret"]);
        assert_eq!(get(&resolved, "gunnerAction"), Some(&Value::from("g")));
    }

    #[test]
    fn test_unknown_parent_fails() {
        let tree = tree("class Cfg { class Child: Missing { x = 1; }; };");
        let id = tree.find("Cfg/Child").unwrap();
        assert_eq!(
            Resolver::new(&tree).resolve(id),
            Err(ResolveError::UnknownClass {
                name: "Missing".to_owned(),
                referenced_by: Some("Cfg/Child".to_owned()),
            })
        );
    }

    #[test]
    fn test_unknown_query_fails() {
        let tree = mirrorform();
        assert!(matches!(
            Resolver::new(&tree).resolve_query("NoSuchClass"),
            Err(ResolveError::UnknownClass { referenced_by: None, .. })
        ));
    }

    #[test]
    fn test_cycle_fails() {
        let tree = tree("class A: C {}; class B: A {}; class C: B {};");
        let id = tree.find("B").unwrap();
        assert_eq!(
            Resolver::new(&tree).resolve_property(id, "x"),
            Err(ResolveError::CyclicInheritance(vec![
                "B".to_owned(),
                "A".to_owned(),
                "C".to_owned(),
                "B".to_owned(),
            ]))
        );
    }

    #[test]
    fn test_append_concatenates_inherited_array() {
        let tree = tree(
            r#"class Base { tags[] = {"a"}; };
               class Mid: Base { tags[] += {"b"}; };
               class Leaf: Mid { tags[] += {"c"}; };
               class Fresh { tags[] += {"d"}; };"#,
        );
        let resolver = Resolver::new(&tree);
        let expected =
            Value::Array(vec![Value::from("a"), Value::from("b"), Value::from("c")]);
        let leaf = tree.find("Leaf").unwrap();
        assert_eq!(resolver.resolve_property(leaf, "tags").unwrap(), Some(expected.clone()));
        assert_eq!(get(&resolver.resolve(leaf).unwrap(), "tags"), Some(&expected));

        let fresh = tree.find("Fresh").unwrap();
        assert_eq!(
            resolver.resolve_property(fresh, "tags").unwrap(),
            Some(Value::Array(vec![Value::from("d")]))
        );
    }

    #[test]
    fn test_json_keeps_property_order() {
        let tree = tree("class A { z = 1; a = \"x\"; };");
        let resolved = Resolver::new(&tree).resolve_query("A").unwrap();
        let json = serde_json::to_string(&resolved).unwrap();
        assert!(json.contains(r#""properties":{"z":1.0,"a":"x"}"#), "{json}");
    }
}
