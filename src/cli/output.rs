//! CLI output: error mapping from domain errors to the CLI surface.

use crate::error::ApiError;

pub fn map_error(e: &ApiError) -> String {
    format!("error: {}", e)
}

/// 2 for problems with the request, 1 for failures inside the engine or store.
pub fn exit_code(e: &ApiError) -> i32 {
    match e {
        ApiError::InvalidConfiguration(_)
        | ApiError::UnknownFeature(_)
        | ApiError::UnknownAssociation(_)
        | ApiError::InvalidArgument(_)
        | ApiError::UnresolvedDependencies(_)
        | ApiError::ConfigError(_) => 2,
        ApiError::InvariantViolation(_)
        | ApiError::InconsistentTree(_)
        | ApiError::UnsupportedOperation(_)
        | ApiError::StorageError(_) => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(exit_code(&ApiError::InvalidArgument("x".into())), 2);
        assert_eq!(exit_code(&ApiError::InconsistentTree("x".into())), 1);
        assert!(map_error(&ApiError::UnknownFeature("Z".into())).starts_with("error: "));
    }
}
