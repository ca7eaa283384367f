use core::fmt::{Debug, Display};
use downcast_rs::{impl_downcast, DowncastSync};

/// Trait that allows the host to return a custom error from a host
/// function or hook.
///
/// Implementors are carried inside [`RuntimeError::Host`] and can be
/// recovered by downcasting once execution has unwound.
///
/// [`RuntimeError::Host`]: crate::RuntimeError::Host
pub trait HostError: 'static + Display + Debug + DowncastSync {}
impl_downcast!(HostError);
