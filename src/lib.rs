pub mod expression;
pub mod initialization;
pub mod io;
pub mod mesh;
pub mod problem;
