//! Connection management: accepted-stream types, wire framing, and the
//! per-connection session engine.

pub mod framed;
pub mod session;
pub mod stream;

pub use framed::FramedStream;
pub use session::Session;
pub use stream::Pop3Stream;
