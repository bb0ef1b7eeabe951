pub mod devicetype;
pub mod dimensions;
pub mod nobidreasons;

/// Declares a block of named wire constants with their human
/// descriptions and generates a reverse description lookup
#[macro_export]
macro_rules! spec_list {
    ($($(#[$meta:meta])* $name:ident = $code:literal => $desc:literal,)+) => {
        $(
            $(#[$meta])*
            pub const $name: u32 = $code;
        )+

        pub fn description(code: u32) -> Option<&'static str> {
            match code {
                $($code => Some($desc),)+
                _ => None,
            }
        }
    };
}
