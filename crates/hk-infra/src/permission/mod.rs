mod fixed;

pub use fixed::FixedHealthPermission;
