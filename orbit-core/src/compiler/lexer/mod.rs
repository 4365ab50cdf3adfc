pub mod token_kind;

pub use token_kind::OrbitTokenKind;
