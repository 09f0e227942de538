/// Router Module Index
///
/// Splits the API into route groups by the gates they sit behind. Each group is
/// wrapped in its own `gates::Pipeline` in `create_router`, so access control is
/// declared once per group instead of inside handlers.

/// Routes with no gate.
pub mod public;

/// Routes behind the token verifier only.
pub mod authenticated;

/// Routes behind the token verifier and the admin role gate, plus the maintenance
/// routes that additionally require the operator secret.
pub mod admin;
