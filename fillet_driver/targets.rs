use crate::generators::read_path_list;

use fillet::{Result, WriteTarget};

use std::fs;
use std::path::{Path, PathBuf};

/// Expands a path into targets: `-` is stdout, a directory stands for the files inside it.
pub fn expand(path: &Path, recursive: bool) -> Result<Vec<WriteTarget>> {
    if path == Path::new("-") {
        return Ok(vec![WriteTarget::Stdout]);
    }
    if !path.is_dir() {
        return Ok(vec![WriteTarget::Path(path.to_path_buf())]);
    }
    let mut files = Vec::new();
    collect_files(path, recursive, &mut files)?;
    files.sort();
    Ok(files.into_iter().map(WriteTarget::Path).collect())
}

fn collect_files(dir: &Path, recursive: bool, files: &mut Vec<PathBuf>) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            if recursive {
                collect_files(&path, recursive, files)?;
            }
        } else if path.is_file() {
            files.push(path);
        }
    }
    Ok(())
}

/// Targets of a list file, or of the positional path if there is no list.
pub fn resolve(
    path: Option<&str>,
    filelist: Option<&str>,
    recursive: bool,
) -> Result<Vec<WriteTarget>> {
    let mut targets = Vec::new();
    match (filelist, path) {
        (Some(list), _) => {
            for p in read_path_list(Path::new(list))? {
                targets.extend(expand(&p, recursive)?);
            }
        }
        (None, Some(path)) => targets.extend(expand(Path::new(path), recursive)?),
        (None, None) => {}
    }
    Ok(targets)
}
