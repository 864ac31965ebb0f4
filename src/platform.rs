//! Platform queries used to size thread stacks.

/// Returns the system page size in bytes.
#[cfg(unix)]
pub fn page_size() -> usize {
    let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if size > 0 { size as usize } else { 4096 }
}

/// Returns the system page size in bytes.
#[cfg(not(unix))]
pub fn page_size() -> usize {
    4096
}

/// Returns the smallest stack size a thread may be created with.
#[cfg(unix)]
pub fn min_stack_size() -> usize {
    let size = unsafe { libc::sysconf(libc::_SC_THREAD_STACK_MIN) };
    if size > 0 { size as usize } else { 16 * 1024 }
}

/// Returns the smallest stack size a thread may be created with.
#[cfg(not(unix))]
pub fn min_stack_size() -> usize {
    16 * 1024
}

/// Clamps a caller-supplied stack-size hint to something the platform
/// can actually honor. A hint of zero means "use the runtime default"
/// and is passed through unchanged.
pub fn clamp_stack_size(hint: usize) -> usize {
    if hint == 0 {
        0
    } else {
        hint.max(page_size()).max(min_stack_size())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes_are_sane() {
        assert!(page_size() >= 1024);
        assert!(min_stack_size() >= 1024);
    }

    #[test]
    fn clamp_behaviour() {
        assert_eq!(clamp_stack_size(0), 0);
        let clamped = clamp_stack_size(1);
        assert!(clamped >= page_size());
        assert!(clamped >= min_stack_size());
        let big = 64 * 1024 * 1024;
        assert_eq!(clamp_stack_size(big), big);
    }
}
