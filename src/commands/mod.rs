mod serve;

pub use serve::{ServeArgs, serve};
