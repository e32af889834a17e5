//!
//! Publishable Channels
//!
//! A Publishable is anything that can be told "flush your pending data now".
//! Channels don't publish on the thread that produced their data.  Instead
//! they flag themselves as dirty with a coordinator and the coordinator's
//! worker calls `publish` on them some time later.
//!

/// The capability to push pending data out to some transport.
///
/// `publish` is called from the coordinator's worker while the coordinator's
/// registry is locked, so:
///
/// * it must not block indefinitely, every other dirty channel waits on it,
/// * it must not call back into the coordinator that invoked it (register,
///   deregister or request a publish), the registry lock is not reentrant,
/// * it must be a no-op when nothing is pending because several requests can
///   collapse into one call (or a call can find the data already drained).
///
/// Failures are the implementor's business.  Nobody is listening for them
/// once `publish` has been called.
pub trait Publishable: Send + Sync {
    /// Publish all of the data pending in the channel.
    fn publish(&self);
}

/// The identity of a Publishable.
///
/// Publishables are compared by address rather than by value so two
/// channels holding identical data are still two registry entries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PublisherId(usize);

impl PublisherId {
    /// The identity of the value behind `publisher`.
    ///
    /// Note: for a value living inside an `Arc` this is the same identity as
    /// the one computed from the `Arc` itself, so a channel can refer to
    /// itself with `PublisherId::of(self)`.
    pub fn of<P: ?Sized>(publisher: &P) -> Self {
        Self(publisher as *const P as *const () as usize)
    }

    /// The raw address this identity was taken from
    pub fn addr(&self) -> usize {
        self.0
    }
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;

    use std::sync::Arc;

    struct Channel {
        _value: u8,
    }

    impl Publishable for Channel {
        fn publish(&self) {}
    }

    #[test]
    fn test_identity_is_by_address() {
        let a = Arc::new(Channel { _value: 1 });
        let b = Arc::new(Channel { _value: 1 });

        assert_ne!(PublisherId::of(&*a), PublisherId::of(&*b));
        assert_eq!(PublisherId::of(&*a), PublisherId::of(&*a.clone()));
    }

    #[test]
    fn test_identity_survives_trait_object_coercion() {
        let channel = Arc::new(Channel { _value: 7 });
        let publishable: Arc<dyn Publishable> = channel.clone();

        assert_eq!(PublisherId::of(&*channel), PublisherId::of(&*publishable));
        assert_eq!(
            PublisherId::of(&*channel).addr(),
            Arc::as_ptr(&channel) as *const () as usize
        );
    }
}
