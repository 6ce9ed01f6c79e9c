pub mod core;
pub mod fields;
pub mod value;

pub use self::core::Document;
pub use fields::Fields;
pub use value::{DATE_FORMAT, Number, Value, ValueKind, is_date_string};
