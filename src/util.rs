mod bit_list;
mod offset_vec;

pub use bit_list::*;
pub use offset_vec::*;
