//! Helper macros for logger implementations

/// Implement the leveled `Logger` methods by forwarding each one to an
/// inherent `write(&self, Severity, &str, &Fields)` method.
macro_rules! impl_leveled_logger {
    ($ty:ty) => {
        impl $crate::logging::Logger for $ty {
            fn debug(&self, message: &str, fields: &$crate::logging::Fields) {
                self.write($crate::logging::Severity::Debug, message, fields)
            }

            fn info(&self, message: &str, fields: &$crate::logging::Fields) {
                self.write($crate::logging::Severity::Info, message, fields)
            }

            fn notice(&self, message: &str, fields: &$crate::logging::Fields) {
                self.write($crate::logging::Severity::Notice, message, fields)
            }

            fn warning(&self, message: &str, fields: &$crate::logging::Fields) {
                self.write($crate::logging::Severity::Warning, message, fields)
            }

            fn error(&self, message: &str, fields: &$crate::logging::Fields) {
                self.write($crate::logging::Severity::Error, message, fields)
            }

            fn critical(&self, message: &str, fields: &$crate::logging::Fields) {
                self.write($crate::logging::Severity::Critical, message, fields)
            }
        }
    };
}

/// Build a `Fields` map from `key => value` pairs
#[macro_export]
macro_rules! fields {
    () => {
        $crate::logging::Fields::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut fields = $crate::logging::Fields::new();
        $(
            fields.insert(($key).to_string(), $crate::__serde_json::Value::from($value));
        )+
        fields
    }};
}
