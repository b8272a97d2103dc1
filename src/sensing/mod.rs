pub mod buffer;
pub mod decimator;

pub use buffer::SampleBuffer;
pub use decimator::Decimator;
