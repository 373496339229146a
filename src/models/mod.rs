mod cart;
mod order;
mod product;
mod settings;
mod user;

pub use cart::*;
pub use order::*;
pub use product::*;
pub use settings::*;
pub use user::*;
