use glob::Pattern;
use std::path::Path;

/// Size in bytes of the EvilQuest/ThiefQuest sample. Used to tell the
/// samples apart from everything else when they are mixed with other files.
pub const SAMPLE_FILE_SIZE: u64 = 172_792;

/// Exact-size fingerprint test.
///
/// Only regular files qualify; symlinks are never followed.
pub fn is_candidate(is_regular_file: bool, len: u64, candidate_size: u64) -> bool {
    is_regular_file && len == candidate_size
}

pub fn should_ignore(path: &Path, ignore_patterns: &[String]) -> bool {
    if ignore_patterns.is_empty() {
        return false;
    }

    let normalized_path = path.to_string_lossy().replace('\\', "/");
    ignore_patterns.iter().any(|pattern| {
        if let Ok(p) = Pattern::new(pattern) {
            p.matches(&normalized_path)
        } else {
            false
        }
    })
}
