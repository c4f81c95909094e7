mod annotations;
mod attribute;
mod binary_format;
mod class;
mod code;
mod constants;
mod constants_pool;
mod field;
mod local_variables;
mod method;
mod version;

pub use annotations::*;
pub use attribute::*;
pub use binary_format::*;
pub use class::*;
pub use code::*;
pub use constants::*;
pub use constants_pool::*;
pub use field::*;
pub use local_variables::*;
pub use method::*;
pub use version::*;
