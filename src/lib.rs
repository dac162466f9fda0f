pub mod value;
pub mod canonical;
pub mod error;
pub mod determinizer;

pub use value::{Number, ParseError, StructuredValue};
pub use canonical::{canonicalize, to_canonical_string};
pub use error::DeterminizeError;
pub use determinizer::{determinize, DeterminizeOptions, DeterminizeReport, Determinizer};
