use std::{any::TypeId, borrow::Cow};

use crate::types::{Instance, TypeInfo};

/// Smart pointers an address looks through
const POINTERS: &[&str] = &[
    "alloc::sync::Arc<",
    "alloc::rc::Rc<",
    "alloc::boxed::Box<",
    "core::pin::Pin<",
];

/// Type names of the boxed error, with and without the std facade
const ERROR_TYPES: &[&str] = &["dyn core::error::Error", "dyn std::error::Error"];

/// Canonical identity of a type, used as registry key and graph node
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address(Cow<'static, str>);

impl Address {
    /// Synthetic node every dependency-free entry hangs off
    pub const ROOT: Address = Address(Cow::Borrowed("ROOT"));
    /// Reserved address of the error type
    pub const ERROR: Address = Address(Cow::Borrowed("ERROR"));

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Address of a function or closure used as a module
    ///
    /// Closures share their enclosing path as a name, so they are told apart by type id.
    pub fn of_function<F: 'static>() -> Address {
        let name = std::any::type_name::<F>();
        if name.contains("{{closure}}") {
            Address(Cow::Owned(format!("{name}#{:?}", TypeId::of::<F>())))
        } else {
            Address(Cow::Borrowed(name))
        }
    }

    #[cfg(test)]
    pub(crate) fn named(name: &'static str) -> Address {
        Address(Cow::Borrowed(name))
    }

    pub fn is_root(&self) -> bool {
        *self == Address::ROOT
    }

    pub fn is_error(&self) -> bool {
        *self == Address::ERROR
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Outcome of resolving a type to its [Address]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolved {
    Address(Address),
    /// The error type, which is never stored
    Error,
    /// A kind without a stable identity
    Unsupported(Address),
}

impl Resolved {
    pub fn of<T: 'static + ?Sized>() -> Resolved {
        resolve(&TypeInfo::of::<T>(), None)
    }

    /// Returns the address only if it can be used as a registry key
    pub fn ok(self) -> Option<Address> {
        match self {
            Resolved::Address(address) => Some(address),
            Resolved::Error | Resolved::Unsupported(_) => None,
        }
    }

    /// The address, falling back to the sentinel for the error type
    pub fn address(&self) -> &Address {
        match self {
            Resolved::Address(address) | Resolved::Unsupported(address) => address,
            Resolved::Error => &Address::ERROR,
        }
    }
}

/// Maps a declared type to its address
///
/// References and smart pointers resolve to the type they point at.
/// An erased declaration resolves through the concrete type of `value` when one is given.
pub fn resolve(info: &TypeInfo, value: Option<&Instance>) -> Resolved {
    if info.is_erased() {
        return match value {
            Some(value) if !value.info.is_erased() => resolve(&value.info, None),
            _ => Resolved::Unsupported(Address(Cow::Borrowed(info.type_name))),
        };
    }

    let name = strip_pointers(info.type_name);
    if ERROR_TYPES.iter().any(|error| name.starts_with(error)) {
        return Resolved::Error;
    }

    let address = Address(Cow::Borrowed(name));
    if is_supported(name) {
        Resolved::Address(address)
    } else {
        Resolved::Unsupported(address)
    }
}

fn strip_pointers(mut name: &'static str) -> &'static str {
    loop {
        name = name.trim();
        if let Some(rest) = name.strip_prefix("&mut ") {
            name = rest;
            continue;
        }
        if let Some(rest) = name.strip_prefix('&') {
            name = rest;
            continue;
        }

        let inner = POINTERS
            .iter()
            .find_map(|pointer| name.strip_prefix(pointer))
            .and_then(|rest| rest.strip_suffix('>'));
        match inner {
            Some(inner) => name = inner,
            None => return name,
        }
    }
}

fn is_supported(name: &str) -> bool {
    !(name.is_empty()
        || name == "!"
        || name.starts_with('(') // unit and tuples
        || name.starts_with('[')
        || name.starts_with('*')
        || name.starts_with("fn(")
        || name.starts_with("unsafe ")
        || name.starts_with("extern ")
        || name.starts_with("dyn core::any::Any")
        || name.contains("{{closure}}"))
}

#[cfg(test)]
mod tests {
    use std::{rc::Rc, sync::Arc};

    use super::*;
    use crate::types::DynError;

    struct Database;
    trait Store {}

    #[test]
    fn pointers_resolve_to_the_underlying_type() {
        let plain = Resolved::of::<Database>();
        assert!(matches!(plain, Resolved::Address(_)));
        assert_eq!(Resolved::of::<Arc<Database>>(), plain);
        assert_eq!(Resolved::of::<Box<Database>>(), plain);
        assert_eq!(Resolved::of::<Rc<Database>>(), plain);
        assert_eq!(Resolved::of::<&Database>(), plain);
        assert_eq!(Resolved::of::<Arc<Box<Database>>>(), plain);
    }

    #[test]
    fn interfaces_have_their_own_address() {
        let store = Resolved::of::<Arc<dyn Store + Send + Sync>>();
        assert!(matches!(store, Resolved::Address(_)));
        assert_ne!(store, Resolved::of::<Database>());
    }

    #[test]
    fn error_type_maps_to_the_sentinel() {
        let resolved = Resolved::of::<DynError>();
        assert_eq!(resolved, Resolved::Error);
        assert!(resolved.address().is_error());
        assert_eq!(resolved.ok(), None);
    }

    #[test]
    fn anonymous_kinds_are_unsupported() {
        assert!(matches!(Resolved::of::<()>(), Resolved::Unsupported(_)));
        assert!(matches!(Resolved::of::<(u8, u16)>(), Resolved::Unsupported(_)));
        assert!(matches!(Resolved::of::<[u8]>(), Resolved::Unsupported(_)));
        assert!(matches!(Resolved::of::<*const u8>(), Resolved::Unsupported(_)));
        assert!(matches!(Resolved::of::<fn() -> u8>(), Resolved::Unsupported(_)));
    }

    #[test]
    fn erased_declaration_resolves_through_the_value() {
        let value = Instance::new(Arc::new(Database));
        assert_eq!(
            resolve(&TypeInfo::erased(), Some(&value)),
            Resolved::of::<Database>()
        );
        assert!(matches!(
            resolve(&TypeInfo::erased(), None),
            Resolved::Unsupported(_)
        ));
    }

    #[test]
    fn closures_get_distinct_addresses() {
        fn address_of<F: 'static>(_: &F) -> Address {
            Address::of_function::<F>()
        }
        let first = || 1;
        let second = || 2;
        assert_ne!(address_of(&first), address_of(&second));
        assert_eq!(address_of(&first), address_of(&first));
    }
}
