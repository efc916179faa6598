// Re-export all model types
pub use self::booking::*;
pub use self::enums::*;
pub use self::errors::*;
pub use self::event::*;
pub use self::response::*;
pub use self::validation::*;

mod booking;
mod enums;
mod errors;
mod event;
mod response;
mod validation;
