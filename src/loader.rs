use crate::{
    document::Document,
    error::LoadError,
    parse,
    settings::Settings,
    tree::ClassTree,
};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Reads a file as UTF-8, falling back to Latin-1 for older configs. A
/// leading byte-order mark is dropped.
pub fn read_source(path: &Path) -> Result<String, LoadError> {
    let bytes = std::fs::read(path).map_err(|source| LoadError::Io {
        path: path.to_owned(),
        source,
    })?;
    Ok(match String::from_utf8(bytes) {
        Ok(text) => match text.strip_prefix('\u{feff}') {
            Some(rest) => rest.to_owned(),
            None => text,
        },
        Err(error) => {
            debug!("{} is not UTF-8, reading as Latin-1", path.display());
            error.into_bytes().into_iter().map(char::from).collect()
        }
    })
}

/// Config files under `dir` named `file_name` (any case), sorted.
pub fn scan(dir: &Path, file_name: &str) -> Result<Vec<PathBuf>, LoadError> {
    let mut found = Vec::new();
    let mut pending = vec![dir.to_owned()];
    while let Some(dir) = pending.pop() {
        let io_error = |source| LoadError::Io {
            path: dir.clone(),
            source,
        };
        for entry in std::fs::read_dir(&dir).map_err(io_error)? {
            let path = entry.map_err(io_error)?.path();
            if path.is_dir() {
                pending.push(path);
            } else if path
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.eq_ignore_ascii_case(file_name))
            {
                found.push(path);
            }
        }
    }
    found.sort();
    Ok(found)
}

/// Expands directories into the config files they contain.
pub fn collect(
    paths: &[PathBuf],
    file_name: &str,
) -> Result<Vec<PathBuf>, LoadError> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            let found = scan(path, file_name)?;
            if found.is_empty() {
                warn!("no {file_name} under {}", path.display());
            }
            files.extend(found);
        } else {
            files.push(path.clone());
        }
    }
    Ok(files)
}

pub fn parse_file(path: &Path) -> Result<Document, LoadError> {
    let source = read_source(path)?;
    let document = parse::document(&source).map_err(|source| {
        LoadError::Parse {
            path: path.to_owned(),
            source,
        }
    })?;
    debug!(
        "parsed {} ({} top-level items)",
        path.display(),
        document.items.len()
    );
    Ok(document)
}

/// Parses every file as one unit and builds the class tree. With
/// `settings.strict`, the first unresolved parent or cycle fails the load.
pub fn load(
    paths: &[PathBuf],
    settings: &Settings,
) -> Result<ClassTree, LoadError> {
    let files = collect(paths, &settings.config_file_name)?;
    let units = files
        .iter()
        .map(|path| -> Result<_, LoadError> {
            Ok((path.display().to_string(), parse_file(path)?))
        })
        .collect::<Result<Vec<_>, _>>()?;
    let tree = ClassTree::build(
        units.iter().map(|(name, document)| (name.as_str(), document)),
    )?;

    if tree.is_empty() {
        warn!("no classes found in {} files", tree.units().len());
    }
    let problems = tree.check();
    if settings.strict {
        if let Some(problem) = problems.into_iter().next() {
            return Err(problem.into());
        }
    } else {
        for problem in &problems {
            warn!("{problem}");
        }
    }
    info!(
        "loaded {} classes in {} groups from {} files",
        tree.len(),
        tree.groups().len(),
        tree.units().len()
    );
    Ok(tree)
}
