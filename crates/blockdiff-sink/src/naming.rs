//! Block entry naming

/// Maps a block index to its entry name inside a sink
pub type NameStrategy = Box<dyn Fn(u64) -> String + Send + Sync>;

/// `{prefix}{index:0width}{suffix}`, e.g. `0000000007.block`
pub fn padded_names(prefix: &str, width: usize, suffix: &str) -> NameStrategy {
    let prefix = prefix.to_string();
    let suffix = suffix.to_string();
    Box::new(move |index| format!("{prefix}{index:0width$}{suffix}"))
}
