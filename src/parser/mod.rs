pub(crate) mod bp;
pub(crate) mod cc;
mod tk;
mod op;
mod fp;

pub use fp::FileParser;
pub(crate) use tk::Tokenizer;
pub(crate) use op::ObjParser;
