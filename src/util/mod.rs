pub mod base36;
pub mod bit_vector;
pub mod paged_bytes;
pub mod string_order;

pub use bit_vector::BitVector;
pub use paged_bytes::PagedBytes;
pub use string_order::compare_utf8_as_utf16;
