pub mod ws;

pub use ws::call_stream;
