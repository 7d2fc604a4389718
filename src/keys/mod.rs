pub mod emitter;
pub mod mapping;
