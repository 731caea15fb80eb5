pub mod origin;

pub use origin::OriginPolicy;
