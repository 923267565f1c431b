use axum::Router;

/// A business module that contributes HTTP routes.
///
/// Each module prefixes its own paths (e.g. `/mdm/v1`); the server binary
/// merges the routers and logs modules by `name`.
pub trait ServiceModule: Send + Sync {
    fn name(&self) -> &str;

    fn routes(&self) -> Router;
}
