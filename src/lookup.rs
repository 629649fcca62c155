//! Cross-reference resolution for `.BR name (section)` pairs.

use std::path::Path;

/// Answers whether a sibling page `name.section` exists next to the page
/// being converted.
pub trait PageLookup {
    fn page_exists(&self, dir: &Path, name: &[u8], section: &[u8]) -> bool;
}

/// Looks for `dir/name.section` on the filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsLookup;

impl PageLookup for FsLookup {
    fn page_exists(&self, dir: &Path, name: &[u8], section: &[u8]) -> bool {
        if name.is_empty() || name.contains(&b'/') {
            return false;
        }
        let file_name = format!(
            "{}.{}",
            String::from_utf8_lossy(name),
            String::from_utf8_lossy(section)
        );
        dir.join(file_name).exists()
    }
}
