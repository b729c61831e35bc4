//! Helper macro for generating domain port error enums.
//!
//! Ports declare their failure modes as small thiserror enums with
//! `impl Into` constructors so adapters can build them from `&str` or
//! `String` without ceremony.

macro_rules! define_port_error {
    (
        $(#[$outer:meta])*
        pub enum $name:ident {
            $(
                $(#[$variant_meta:meta])*
                $variant:ident { $($field:ident : $ty:ty),* $(,)? } => $message:expr
            ),* $(,)?
        }
    ) => {
        $(#[$outer])*
        #[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
        pub enum $name {
            $(
                $(#[$variant_meta])*
                #[error($message)]
                $variant { $($field : $ty),* },
            )*
        }

        ::paste::paste! {
            impl $name {
                $(
                    #[doc = concat!("Construct [`Self::", stringify!($variant), "`].")]
                    pub fn [<$variant:snake>]($($field: impl Into<$ty>),*) -> Self {
                        Self::$variant { $($field: $field.into()),* }
                    }
                )*
            }
        }
    };
}

pub(crate) use define_port_error;

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.
    define_port_error! {
        pub enum ExamplePortError {
            Unavailable { message: String } => "unavailable: {message}",
            Conflict { message: String, version: u64 } => "conflict at v{version}: {message}",
        }
    }

    #[test]
    fn constructors_accept_str_for_string_fields() {
        let err = ExamplePortError::unavailable("down");
        assert_eq!(err.to_string(), "unavailable: down");
    }

    #[test]
    fn constructors_support_mixed_fields() {
        let err = ExamplePortError::conflict("stale write", 7_u64);
        assert_eq!(err.to_string(), "conflict at v7: stale write");
    }
}
