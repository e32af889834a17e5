//!
//! Sinks
//!
//! A sink is the transport-facing end of a channel.  Channels buffer data
//! written by producers and hand it to their sink from the coordinator's
//! worker, a sink is never called from the thread that wrote the data.
//! Subscribers read whatever a sink delivered on the other side.
//!

/// The sending half of a transport binding.
///
/// A channel owns its sink and calls [`Publisher::publish`] once per
/// buffered sample during a drain pass.  An error rejects that one sample
/// only, the channel logs it and moves on to the next sample.
pub trait Publisher {
    /// The sample type the sink accepts
    type Data;
    /// Why a sample was rejected
    type Error;

    /// Send one sample to the transport.
    ///
    /// Note: this runs on the coordinator's worker while the registry is
    /// locked, so it must not block for long.
    fn publish(&mut self, data: Self::Data) -> Result<(), Self::Error>;
}

/// The receiving half of a transport binding
pub trait Subscriber {
    /// The value the subscriber exposes, usually the latest sample received
    type Target;

    /// Pull in everything delivered since the last call and return the
    /// current value
    fn get(&mut self) -> &Self::Target;
}
