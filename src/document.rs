use crate::value::Value;

/// One parsed file.
#[derive(Debug, Default)]
pub struct Document {
    pub items: Vec<Item>,
}

#[derive(Debug, Clone)]
pub enum Item {
    Class(ClassDef),
    Delete(String),
    Property(Property),
}

#[derive(Debug, Clone)]
pub struct ClassDef {
    pub name: String,
    pub parent: Option<String>,
    /// `None` for a forward declaration (`class Name;`).
    pub body: Option<Vec<Item>>,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub name: String,
    pub op: Op,
    pub value: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Assign,
    Append,
}
