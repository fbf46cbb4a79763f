//! Entry point declarations.
//!
//! Every entry point a plugin offers is exported as a `static`
//! [`EntryPointDecl`] under the symbol returned by [`symbol_name`] for the
//! entry point name its configuration uses. The host reads the declaration,
//! checks it against its [`Contract`](crate::Contract), and only then calls
//! the constructor.
//!
//! A panic cannot unwind across the boundary between a plugin library and its
//! host: each side links its own copy of `std`. Constructors generated by
//! [`export_entry_point!`] therefore catch panics on the plugin side and hand
//! the host an `Err` carrying the panic message.

use std::any::Any;

/// No-argument constructor for a plugin instance.
///
/// On success the value is a `Box<C::Object>` for the declared contract `C`,
/// erased so the declaration does not depend on the contract type. A
/// constructor that panicked returns the panic message instead.
pub type Constructor = fn() -> Result<Box<dyn Any + Send>, String>;

/// Exported description of one plugin entry point.
#[derive(Debug, Clone, Copy)]
pub struct EntryPointDecl {
    /// [`ABI_VERSION`](crate::ABI_VERSION) the plugin was built against.
    pub abi_version: u32,

    /// [`Contract::NAME`](crate::Contract::NAME) of the implemented contract.
    pub contract: &'static str,

    /// Name of the implementing type, used in diagnostics.
    pub type_name: &'static str,

    /// Constructor; `None` for declarations that cannot be instantiated.
    pub constructor: Option<Constructor>,
}

impl EntryPointDecl {
    /// Check whether this declaration was built for the given contract and ABI.
    pub fn satisfies<C: crate::Contract>(&self) -> bool {
        self.abi_version == crate::ABI_VERSION && self.contract == C::NAME
    }
}

/// Map an entry point name to the symbol its declaration is exported under.
///
/// Every character that is not ASCII alphanumeric or `_` becomes `_`, so
/// `greeter.English` is looked up as `greeter_English`.
pub fn symbol_name(entry_point: &str) -> String {
    entry_point
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Render a panic payload as a message.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Export an entry point declaration from a plugin crate.
///
/// `$symbol` must equal [`symbol_name`] of the entry point name used in the
/// plugin configuration. `$ctor` is evaluated on every instantiation and must
/// produce a value coercible to the contract's object type. A panic raised
/// while evaluating it is caught inside the plugin.
///
/// ```ignore
/// export_entry_point!(greeter_English, GreeterContract, EnglishGreeter);
/// ```
#[macro_export]
macro_rules! export_entry_point {
    ($symbol:ident, $contract:ty, $ctor:expr) => {
        #[no_mangle]
        #[allow(non_upper_case_globals)]
        pub static $symbol: $crate::EntryPointDecl = $crate::EntryPointDecl {
            abi_version: $crate::ABI_VERSION,
            contract: <$contract as $crate::Contract>::NAME,
            type_name: ::core::concat!(::core::module_path!(), "::", ::core::stringify!($symbol)),
            constructor: ::core::option::Option::Some({
                fn construct() -> ::core::result::Result<
                    ::std::boxed::Box<dyn ::core::any::Any + ::core::marker::Send>,
                    ::std::string::String,
                > {
                    ::std::panic::catch_unwind(::std::panic::AssertUnwindSafe(|| {
                        let object: ::std::boxed::Box<<$contract as $crate::Contract>::Object> =
                            ::std::boxed::Box::new($ctor);
                        let erased: ::std::boxed::Box<dyn ::core::any::Any + ::core::marker::Send> =
                            ::std::boxed::Box::new(object);
                        erased
                    }))
                    .map_err(|payload| $crate::decl::panic_message(payload.as_ref()))
                }
                construct
            }),
        };
    };
}
