pub mod artifact;
pub mod backend;
pub mod codec;
pub mod spec;
pub mod tensor;

pub use artifact::*;
pub use backend::*;
pub use codec::{CodecError, WireTensor};
pub use spec::*;
pub use tensor::*;
