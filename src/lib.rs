pub mod chunk;
pub mod framed;
pub mod object;
pub mod reader;
pub mod status;
pub mod varint;
pub mod writer;

pub use chunk::decoder::ChunkDecoder;
pub use chunk::encoder::ChunkEncoder;
pub use chunk::filter::FieldFilter;
pub use chunk::{Chunk, ChunkHeader, ChunkType, Compression};
pub use framed::{FramedSnappyOptions, FramedSnappyWriter};
pub use reader::BytesReader;
pub use status::{Status, StatusKind};
pub use writer::buffered::{BufferedWriter, FileWriter, Sink};
pub use writer::dest::{Borrowed, Dest, Owned};
pub use writer::limiting::LimitingWriter;
pub use writer::vec::VecWriter;
pub use writer::{FlushScope, Position, Writer};
