//! Category taxonomy derived from the folder hierarchy.
//!
//! The synthetic root and its direct children (the default containers such as
//! "Bookmarks Bar") never appear in a category path; the folders inside the
//! containers form the first level. Traversal is iterative so deep
//! hierarchies cannot exhaust the stack.

use markfold_shared::{CategoryTree, FolderId, FolderNode, FolderPathEntry, PATH_SEPARATOR};

/// Build the nested category tree from the folder forest returned by
/// [`FolderStore::get_tree`](markfold_shared::FolderStore::get_tree).
///
/// Folders with an empty title are skipped together with their subtree, and
/// leaf bookmarks are never traversed. Same-titled sibling folders merge.
pub fn build_taxonomy(roots: &[FolderNode]) -> CategoryTree {
    let mut tree = CategoryTree::new();
    let mut stack: Vec<(&FolderNode, Vec<&str>)> = Vec::new();

    for container in containers(roots) {
        for child in container.children.iter().rev() {
            stack.push((child, Vec::new()));
        }
    }

    while let Some((node, parents)) = stack.pop() {
        if !is_category(node) {
            continue;
        }

        let mut level = &mut tree;
        for title in &parents {
            level = level.entry(title);
        }
        level.entry(&node.title);

        let mut path = parents;
        path.push(&node.title);
        for child in node.children.iter().rev() {
            stack.push((child, path.clone()));
        }
    }

    tree
}

/// Every category folder with its slash path, in tree (pre-)order.
pub fn flatten_folders(roots: &[FolderNode]) -> Vec<FolderPathEntry> {
    let mut entries = Vec::new();
    let mut stack: Vec<(&FolderNode, String)> = Vec::new();

    for container in containers(roots) {
        for child in container.children.iter().rev() {
            stack.push((child, String::new()));
        }
    }

    while let Some((node, prefix)) = stack.pop() {
        if !is_category(node) {
            continue;
        }

        let path = if prefix.is_empty() {
            node.title.clone()
        } else {
            format!("{prefix}{PATH_SEPARATOR}{}", node.title)
        };
        for child in node.children.iter().rev() {
            stack.push((child, path.clone()));
        }
        entries.push(FolderPathEntry {
            id: node.id.clone(),
            path,
        });
    }

    entries
}

/// Whether `segments` already names a folder chain below the folder `root_id`.
///
/// Each segment follows the first folder child with that title, the same
/// choice path resolution makes, so `true` means resolving creates nothing.
/// An empty path is the root itself.
pub fn folder_path_exists<S: AsRef<str>>(
    roots: &[FolderNode],
    root_id: &FolderId,
    segments: &[S],
) -> bool {
    let Some(mut current) = find_folder(roots, root_id) else {
        return false;
    };
    for segment in segments {
        let next = current
            .children
            .iter()
            .find(|c| c.is_folder() && c.title == segment.as_ref());
        match next {
            Some(child) => current = child,
            None => return false,
        }
    }
    true
}

fn find_folder<'a>(roots: &'a [FolderNode], id: &FolderId) -> Option<&'a FolderNode> {
    let mut stack: Vec<&FolderNode> = roots.iter().collect();
    while let Some(node) = stack.pop() {
        if node.is_folder() && &node.id == id {
            return Some(node);
        }
        stack.extend(node.children.iter());
    }
    None
}

/// Top-level containers: folder children of each synthetic root.
fn containers(roots: &[FolderNode]) -> impl Iterator<Item = &FolderNode> {
    roots
        .iter()
        .flat_map(|root| root.children.iter())
        .filter(|c| c.is_folder())
}

fn is_category(node: &FolderNode) -> bool {
    node.is_folder() && !node.title.is_empty()
}
