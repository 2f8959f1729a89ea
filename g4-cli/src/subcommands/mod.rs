pub(crate) mod check;
pub(crate) mod lens;
pub(crate) mod refs;
pub(crate) mod symbols;
