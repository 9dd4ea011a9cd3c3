mod normalize;

pub use normalize::{components, normalize_resource_path, PathError, MAX_PATH_CHARS};
