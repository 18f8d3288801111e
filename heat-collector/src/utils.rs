pub fn chunked<T: Clone>(v: &[T], size: usize) -> Vec<Vec<T>> {
    v.chunks(size).map(|c| c.to_vec()).collect()
}

pub fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Heat stack identifier in the `{stack_name}/{stack_id}` form its API
/// expects in resource paths.
pub fn stack_identifier(stack_name: &str, stack_id: &str) -> String {
    format!("{stack_name}/{stack_id}")
}
