//! Capability contracts.
//!
//! A host describes the interface it expects from every plugin as a
//! [`Contract`]: a marker type naming the trait object plugins are boxed as,
//! plus a stable name that plugin declarations are checked against before
//! anything is constructed.

/// A capability contract required by a host.
///
/// ```ignore
/// pub trait Greeter: Send {
///     fn greet(&self, name: &str) -> String;
/// }
///
/// pub struct GreeterContract;
///
/// impl Contract for GreeterContract {
///     type Object = dyn Greeter;
///     const NAME: &'static str = "sample.Greeter";
/// }
/// ```
pub trait Contract: 'static {
    /// The trait object every plugin instance is handed out as.
    type Object: ?Sized + Send + 'static;

    /// Stable contract name recorded in every entry point declaration.
    const NAME: &'static str;
}
