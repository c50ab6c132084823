use std::fmt;

/// How disruptive an update is
///
/// Ordered: `None < Simple < NeedShutdown`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum UpdateLevel {
    /// Nothing to change
    #[default]
    None,
    /// Can be applied while the instance is running
    Simple,
    /// The instance has to be powered down first
    NeedShutdown,
}

impl UpdateLevel {
    pub fn is_none(&self) -> bool {
        matches!(self, UpdateLevel::None)
    }
}

impl fmt::Display for UpdateLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            UpdateLevel::None => "none",
            UpdateLevel::Simple => "simple",
            UpdateLevel::NeedShutdown => "need-shutdown",
        };
        write!(f, "{}", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordering() {
        assert!(UpdateLevel::None < UpdateLevel::Simple);
        assert!(UpdateLevel::Simple < UpdateLevel::NeedShutdown);
        assert_eq!(
            [UpdateLevel::Simple, UpdateLevel::NeedShutdown, UpdateLevel::None]
                .into_iter()
                .max(),
            Some(UpdateLevel::NeedShutdown)
        );
    }
}
