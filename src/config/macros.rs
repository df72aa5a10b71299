/// `config_struct!`: configuration sections with embedded defaults
///
/// Each field is declared once with its type and default value. The macro
/// generates the public struct, a `Default` impl using those values, and
/// serde derives with `#[serde(default)]` so a TOML file only needs to
/// mention the fields it overrides.
///
/// # Example
/// ```
/// kubepulse::config_struct! {
///     pub struct ExampleSection {
///         interval_secs: u64 = 5,
///         enabled: bool = true,
///     }
/// }
///
/// assert_eq!(ExampleSection::default().interval_secs, 5);
/// ```
#[macro_export]
macro_rules! config_struct {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $(
                $(#[$field_meta:meta])*
                $field_name:ident: $field_type:ty = $default_value:expr
            ),*
            $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
        #[serde(default)]
        $vis struct $name {
            $(
                $(#[$field_meta])*
                pub $field_name: $field_type,
            )*
        }

        impl Default for $name {
            fn default() -> Self {
                Self {
                    $( $field_name: $default_value, )*
                }
            }
        }
    };
}
