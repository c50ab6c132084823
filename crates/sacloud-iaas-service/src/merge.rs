//! Partial updates over typed optional fields

/// Overwrite `target` when `value` is set
pub fn patch<T>(target: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *target = value;
    }
}
