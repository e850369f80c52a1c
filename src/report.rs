use crate::{
    error::ResolveError,
    resolve::ResolvedClass,
    tree::ClassTree,
    value::Value,
};
use serde::Serialize;
use std::io::{self, Write};

#[derive(Debug, Serialize)]
struct GroupSummary<'a> {
    name: &'a str,
    classes: usize,
}

#[derive(Debug, Serialize)]
struct ClassSummary<'a> {
    path: String,
    parent: Option<&'a str>,
    external: bool,
    line: usize,
}

pub fn groups(tree: &ClassTree, json: bool, out: &mut impl Write) -> io::Result<()> {
    let groups: Vec<_> = tree
        .groups()
        .iter()
        .map(|&id| GroupSummary {
            name: &tree.node(id).name,
            classes: tree.node(id).members.len(),
        })
        .collect();
    if json {
        serde_json::to_writer_pretty(&mut *out, &groups)?;
        return writeln!(out);
    }
    for group in groups {
        writeln!(out, "{:<24} {}", group.name, group.classes)?;
    }
    Ok(())
}

pub fn classes(
    tree: &ClassTree,
    group: Option<&str>,
    json: bool,
    out: &mut impl Write,
) -> io::Result<()> {
    let classes: Vec<_> = tree
        .ids()
        .map(|id| (id, tree.path(id)))
        .filter(|(_, path)| match group {
            Some(group) => path
                .split('/')
                .next()
                .is_some_and(|top| top.eq_ignore_ascii_case(group)),
            None => true,
        })
        .map(|(id, path)| {
            let node = tree.node(id);
            ClassSummary {
                path,
                parent: node.parent_name.as_deref(),
                external: node.is_forward_declaration(),
                line: node.line,
            }
        })
        .collect();
    if json {
        serde_json::to_writer_pretty(&mut *out, &classes)?;
        return writeln!(out);
    }
    for class in classes {
        write!(out, "{}", class.path)?;
        if let Some(parent) = class.parent {
            write!(out, ": {parent}")?;
        }
        if class.external {
            write!(out, " (external)")?;
        }
        writeln!(out)?;
    }
    Ok(())
}

/// Prints the class back in definition syntax with every inherited
/// property spelled out.
pub fn resolved(
    class: &ResolvedClass,
    json: bool,
    out: &mut impl Write,
) -> io::Result<()> {
    if json {
        serde_json::to_writer_pretty(&mut *out, class)?;
        return writeln!(out);
    }
    let mut chain = vec![class.path.as_str()];
    chain.extend(class.ancestors.iter().map(String::as_str));
    writeln!(out, "// {}", chain.join(" <- "))?;
    match &class.parent {
        Some(parent) => writeln!(out, "class {}: {parent}", class.name)?,
        None => writeln!(out, "class {}", class.name)?,
    }
    writeln!(out, "{{")?;
    for (name, value) in &class.properties {
        let brackets = if matches!(value, Value::Array(_)) { "[]" } else { "" };
        writeln!(out, "\t{name}{brackets} = {value};")?;
    }
    for member in &class.classes {
        writeln!(out, "\tclass {member};")?;
    }
    writeln!(out, "}};")
}

pub fn property(
    name: &str,
    value: Option<&Value>,
    json: bool,
    out: &mut impl Write,
) -> io::Result<()> {
    if json {
        serde_json::to_writer_pretty(&mut *out, &value)?;
        return writeln!(out);
    }
    match value {
        Some(value) => writeln!(out, "{value}"),
        None => writeln!(out, "// {name} is not defined"),
    }
}

pub fn problems(
    problems: &[ResolveError],
    json: bool,
    out: &mut impl Write,
) -> io::Result<()> {
    if json {
        let messages: Vec<_> = problems.iter().map(ToString::to_string).collect();
        serde_json::to_writer_pretty(&mut *out, &messages)?;
        return writeln!(out);
    }
    for problem in problems {
        writeln!(out, "{problem}")?;
    }
    Ok(())
}
