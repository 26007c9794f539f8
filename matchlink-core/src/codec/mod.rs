pub mod error;
pub mod preview;
pub mod reader;
pub mod writer;

pub use error::CodecError;
pub use preview::preview;
pub use reader::BinaryReader;
pub use writer::BinaryWriter;
