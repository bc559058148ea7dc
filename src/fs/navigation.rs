use crate::fs::directory::DirectoryEntry;
use crate::fs::fat_constants::ROOT_CLUSTER;

/// LIFO of directory clusters visited on the way down from the root.
/// The root itself (cluster 0) is never stored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClusterStack {
    clusters: Vec<u32>,
}

impl ClusterStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, cluster: u32) {
        self.clusters.push(cluster);
    }

    /// Top of the stack, or the root sentinel when empty.
    pub fn pop(&mut self) -> u32 {
        self.clusters.pop().unwrap_or(ROOT_CLUSTER)
    }

    pub fn peek(&self) -> Option<u32> {
        self.clusters.last().copied()
    }

    pub fn clear(&mut self) {
        self.clusters.clear();
    }

    pub fn depth(&self) -> usize {
        self.clusters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }
}

/// What `Navigator::open` did with an entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Opened {
    /// Moved into a subdirectory (or stayed, for `.`).
    Entered(u32),
    /// Moved to the parent.
    Left(u32),
    /// The entry is a file; the caller should stream it.
    File(DirectoryEntry),
}

/// Browser position: the current directory cluster, the clusters above it,
/// and the matching path components.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Navigator {
    current: u32,
    stack: ClusterStack,
    path: Vec<String>,
}

impl Default for Navigator {
    fn default() -> Self {
        Self::new()
    }
}

impl Navigator {
    pub fn new() -> Self {
        Navigator { current: ROOT_CLUSTER, stack: ClusterStack::new(), path: Vec::new() }
    }

    pub fn current(&self) -> u32 {
        self.current
    }

    pub fn at_root(&self) -> bool {
        self.current == ROOT_CLUSTER
    }

    pub fn stack(&self) -> &ClusterStack {
        &self.stack
    }

    /// `/` at the root, `/DIR/SUB` below it.
    pub fn path(&self) -> String {
        if self.path.is_empty() {
            return String::from("/");
        }
        let mut s = String::new();
        for part in &self.path {
            s.push('/');
            s.push_str(part);
        }
        s
    }

    pub fn open(&mut self, entry: &DirectoryEntry) -> Opened {
        if !entry.is_dir() {
            return Opened::File(entry.clone());
        }
        if entry.is_dot() {
            return if entry.name == ".." { Opened::Left(self.back()) } else { Opened::Entered(self.current) };
        }
        if self.current != ROOT_CLUSTER {
            self.stack.push(self.current);
        }
        self.path.push(entry.name.clone());
        // a directory entry pointing at cluster 0 refers to the root
        self.current = entry.first_cluster;
        if self.current == ROOT_CLUSTER {
            self.stack.clear();
            self.path.clear();
        }
        Opened::Entered(self.current)
    }

    /// Go to the parent directory; stays at the root when already there.
    pub fn back(&mut self) -> u32 {
        if self.at_root() {
            self.stack.clear();
            self.path.clear();
            return ROOT_CLUSTER;
        }
        self.current = self.stack.pop();
        self.path.pop();
        self.current
    }

    pub fn reset_to_root(&mut self) {
        self.stack.clear();
        self.path.clear();
        self.current = ROOT_CLUSTER;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::datetime::{FatDate, FatDateTime};
    use crate::fs::directory::{display_name, to_short_name, Attributes};

    fn dir(name: &str, cluster: u32) -> DirectoryEntry {
        let short_name = to_short_name(name).unwrap();
        DirectoryEntry {
            name: display_name(&short_name),
            short_name,
            attributes: Attributes::DIRECTORY,
            file_size: 0,
            first_cluster: cluster,
            created: FatDateTime::default(),
            accessed: FatDate::default(),
            modified: FatDateTime::default(),
        }
    }

    #[test]
    fn push_then_pop() {
        let mut stack = ClusterStack::new();
        stack.push(5);
        stack.push(9);
        assert_eq!(stack.peek(), Some(9));
        assert_eq!(stack.pop(), 9);
        assert_eq!(stack.pop(), 5);
        assert_eq!(stack.pop(), ROOT_CLUSTER);
        assert!(stack.is_empty());
    }

    #[test]
    fn enter_and_back() {
        let mut nav = Navigator::new();
        assert_eq!(nav.path(), "/");
        assert_eq!(nav.open(&dir("DOCS", 5)), Opened::Entered(5));
        assert_eq!(nav.open(&dir("NOTES", 8)), Opened::Entered(8));
        assert_eq!(nav.path(), "/DOCS/NOTES");
        // the root is implied, only DOCS is stacked
        assert_eq!(nav.stack().depth(), 1);
        assert_eq!(nav.stack().peek(), Some(5));

        assert_eq!(nav.back(), 5);
        assert_eq!(nav.path(), "/DOCS");
        assert_eq!(nav.back(), ROOT_CLUSTER);
        assert!(nav.at_root());
        assert!(nav.stack().is_empty());
        assert_eq!(nav.back(), ROOT_CLUSTER);
        assert_eq!(nav.path(), "/");
    }

    #[test]
    fn dot_entries() {
        let mut nav = Navigator::new();
        nav.open(&dir("DOCS", 5));
        assert_eq!(nav.open(&dir(".", 5)), Opened::Entered(5));
        assert_eq!(nav.path(), "/DOCS");
        assert_eq!(nav.open(&dir("..", 0)), Opened::Left(ROOT_CLUSTER));
        assert_eq!(nav, Navigator::new());
    }

    #[test]
    fn reset_clears_stack() {
        let mut nav = Navigator::new();
        nav.open(&dir("A", 3));
        nav.open(&dir("B", 4));
        nav.reset_to_root();
        assert_eq!(nav.current(), ROOT_CLUSTER);
        assert!(nav.stack().is_empty());
        assert_eq!(nav.path(), "/");
    }

    #[test]
    fn files_do_not_move() {
        let mut nav = Navigator::new();
        let mut file = dir("README.TXT", 2);
        file.attributes = Attributes::ARCHIVE;
        assert_eq!(nav.open(&file), Opened::File(file.clone()));
        assert!(nav.at_root());
    }
}
