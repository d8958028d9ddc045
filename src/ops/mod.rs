pub mod check;
pub mod clean;
pub mod merge;
pub mod template_ops;
pub mod tree_ops;
