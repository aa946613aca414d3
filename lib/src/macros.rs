/// Implements Display for a type by serializing it with serde_json, falling
/// back to Debug formatting when serialization fails.
#[macro_export]
macro_rules! impl_display_using_json {
    ($type:ty) => {
        impl std::fmt::Display for $type {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match serde_json::to_string(self) {
                    Ok(s) => write!(f, "{}", s),
                    Err(_) => write!(f, "{:?}", self),
                }
            }
        }
    };
}
