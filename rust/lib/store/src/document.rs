use openerp_core::ServiceError;
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Trait implemented by every master-data model.
///
/// Records are stored whole as JSON under `mdm:{COLLECTION}:{key}`. Hooks
/// have no-op defaults.
pub trait Document: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Collection name. Doubles as the URL segment and permission module.
    const COLLECTION: &'static str;

    /// JSON name of the key field.
    const KEY_FIELD: &'static str = "code";

    /// Code series used to fill an empty key on create.
    const SEQUENCE: Option<&'static str> = None;

    /// JSON fields whose non-empty values must be unique in the collection.
    const UNIQUE: &'static [&'static str] = &[];

    fn key_value(&self) -> &str;

    fn set_key(&mut self, key: String);

    /// Normalise a new record before validation (trim, upper-case, defaults).
    fn before_create(&mut self) {}

    /// Normalise an updated record before validation.
    fn before_update(&mut self) {}

    /// Copy fields only the service may change from the `stored` record.
    /// Runs on client `update` and `patch`, not on `modify`.
    fn keep_managed(&mut self, _stored: &Self) {}

    /// Reject records that must not be stored. Runs after the key is assigned.
    fn validate(&self) -> Result<(), ServiceError> {
        Ok(())
    }
}

/// Source of business codes for documents created without a key.
pub trait CodeIssuer: Send + Sync {
    /// Next formatted code of `series`. Each call consumes one number.
    fn next_code(&self, series: &str) -> Result<String, ServiceError>;
}

/// `Validation` error unless `value` is non-blank.
pub fn require_field(field: &str, value: &str) -> Result<(), ServiceError> {
    if value.trim().is_empty() {
        Err(ServiceError::Validation(format!("{} is required", field)))
    } else {
        Ok(())
    }
}
