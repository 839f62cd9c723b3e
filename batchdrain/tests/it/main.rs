#[cfg(feature = "in_memory")]
mod in_memory;
