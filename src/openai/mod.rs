mod core;
pub use self::core::{Message, ResponseFormat, Role, completion, completion_content};
